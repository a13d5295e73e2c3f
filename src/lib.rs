//! # nbtext
//!
//! Bidirectional conversion between notebooks and plain-text documents:
//! scripts, Markdown and R Markdown.
//!
//! ## What is a text notebook?
//!
//! A notebook is a list of code, markdown and raw cells with metadata. A
//! text notebook is the same content written in a format that editors,
//! linters and version control understand. Cell boundaries are written as
//! comment markers, fenced code blocks or blank lines, depending on the
//! dialect, and read back to the same cells.
//!
//! ## Supported formats
//!
//! - **light** (default for scripts): blank lines separate cells, markdown
//!   is commented text, `# +`/`# -` mark cells that need it
//! - **percent** and **hydrogen**: `# %%` starts every cell
//! - **nomarker**: light without any marker
//! - **markdown** (`.md`) and **rmarkdown** (`.Rmd`): fenced code blocks
//! - **spin** (`.R`): knitr's `#'` markdown and `#+` chunk options
//! - **sphinx** (`.py`): sphinx-gallery scripts
//!
//! Scripts are supported for every language in
//! [`languages::SCRIPT_EXTENSIONS`].
//!
//! ## Quick Start
//!
//! ```rust
//! use nbtext::{reads, writes, Format};
//!
//! let text = "# A title\n\nx = 1\n";
//! let notebook = reads(text, &"py:light".parse::<Format>().unwrap()).unwrap();
//! assert_eq!(notebook.cells.len(), 2);
//!
//! let percent = writes(&notebook, &"py:percent".parse::<Format>().unwrap()).unwrap();
//! assert_eq!(percent, "# %% [markdown]\n# A title\n\n# %%\nx = 1\n");
//!
//! let markdown = writes(&notebook, &"md".parse::<Format>().unwrap()).unwrap();
//! assert_eq!(markdown, "A title\n\n```python\nx = 1\n```\n");
//! ```
//!
//! ### Building notebooks
//!
//! ```rust
//! use nbtext::{metadata, writes, Cell, Format, Notebook};
//!
//! let notebook = Notebook::new(vec![
//!     Cell::code("plot(x)").with_metadata(metadata!({"tags": ["remove_input"]})),
//! ]);
//! let text = writes(&notebook, &Format::new(".Rmd")).unwrap();
//! assert_eq!(text, "```{python echo=FALSE}\nplot(x)\n```\n");
//! ```
//!
//! ### Detecting the format
//!
//! ```rust
//! use nbtext::detect_format;
//!
//! let fmt = detect_format("# %%\nimport os\n", ".py");
//! assert_eq!(fmt.to_string(), "py:percent");
//! ```
//!
//! ## Round trips
//!
//! Reading the text written for a notebook gives back the same cells, and
//! writing a notebook read from text gives back the same text. Formatting
//! details that differ from the defaults, like an unusual number of blank
//! lines between two cells, are kept in [`CellLayout`] rather than in the
//! cell metadata.
//!
//! Cell options that cannot be parsed are kept verbatim under the
//! `incorrectly_encoded_metadata` key, and written back unchanged.
//!
//! ## Logging
//!
//! The crate logs with [`tracing`]: a summary of every conversion at the
//! debug level, each cell read at the trace level, and dropped metadata
//! keys as warnings. No subscriber is installed.
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - No I/O: conversions work on strings
//! - Errors are returned as [`Error`], never raised as panics

pub mod cell_metadata;
pub mod chunk_options;
pub mod convert;
pub mod de;
pub mod error;
pub mod formats;
pub mod header;
pub mod languages;
pub mod macros;
pub mod magics;
pub mod map;
pub mod metadata_filter;
pub mod notebook;
pub mod options;
pub mod pep8;
pub mod readers;
pub mod ser;
pub mod stringparser;
pub mod value;
pub mod writers;

pub use convert::{cell_to_lines, detect_format, read_cell, reads, writes};
pub use error::{Error, Imbalance, Result};
pub use map::Metadata;
pub use notebook::{Cell, CellLayout, CellType, Notebook};
pub use options::{Format, FormatOptions};
pub use value::{Number, Value};

/// Converts a text document from one format to another.
///
/// The source format is detected when `from` has no format name.
///
/// # Examples
///
/// ```rust
/// use nbtext::{convert, Format};
///
/// let text = convert("# %%\nx = 1\n\n# %%\ny = 2\n", &Format::new(".py"), &"md".parse::<Format>().unwrap())
///     .unwrap();
/// assert_eq!(text, "```python\nx = 1\n```\n\n```python\ny = 2\n```\n");
/// ```
///
/// # Errors
///
/// Returns an error if the text cannot be read in the source format, or
/// the notebook cannot be written in the target format.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn convert(text: &str, from: &Format, to: &Format) -> Result<String> {
    let notebook = reads(text, from)?;
    writes(&notebook, to)
}

/// Reads a notebook, with the format given in the short form
/// `"ext:format_name"`.
///
/// # Examples
///
/// ```rust
/// use nbtext::from_str;
///
/// let notebook = from_str("#' Some text\nx <- 1\n", "R:spin").unwrap();
/// assert_eq!(notebook.cells[0].source, "Some text");
/// ```
///
/// # Errors
///
/// Returns an error if the format string is invalid or the text cannot be
/// read in that format.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str(text: &str, fmt: &str) -> Result<Notebook> {
    reads(text, &fmt.parse()?)
}

/// Writes a notebook, with the format given in the short form
/// `"ext:format_name"`.
///
/// # Examples
///
/// ```rust
/// use nbtext::{to_string, Cell, Notebook};
///
/// let notebook = Notebook::new(vec![Cell::code("1 + 1")]);
/// assert_eq!(to_string(&notebook, "py:percent").unwrap(), "# %%\n1 + 1\n");
/// ```
///
/// # Errors
///
/// Returns an error if the format string is invalid or the notebook cannot
/// be written in that format.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string(notebook: &Notebook, fmt: &str) -> Result<String> {
    writes(notebook, &fmt.parse()?)
}
