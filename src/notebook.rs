//! The in-memory notebook: an ordered list of typed cells plus metadata.
//!
//! The container layer (JSON `.ipynb` files, outputs, execution counts) is
//! not modelled here; [`Notebook`] and [`Cell`] are plain serde types that a
//! caller can embed in its own representation.
//!
//! Text-formatting details that only exist to make a text round trip
//! byte-stable (blank line counts, custom markers) live in [`CellLayout`],
//! never in the cell metadata, and are skipped by serde.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::{Cell, CellType, Notebook};
//!
//! let nb = Notebook::new(vec![Cell::markdown("# Title"), Cell::code("x = 1")]);
//! assert_eq!(nb.cells[1].cell_type, CellType::Code);
//! ```

use crate::{Metadata, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl CellType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Raw => "raw",
        }
    }

    /// Parses the cell type names used on marker lines (`markdown`, `md`, `raw`, `code`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<CellType> {
        match name {
            "code" => Some(CellType::Code),
            "markdown" | "md" => Some(CellType::Markdown),
            "raw" => Some(CellType::Raw),
            _ => None,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text-only formatting hints recorded by the readers.
///
/// These are re-derived by the writers whenever absent; they are only kept
/// when the text deviates from what the writer would produce by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellLayout {
    /// Blank lines between this cell and the next one.
    pub lines_to_next_cell: Option<usize>,
    /// Blank lines between the cell content and its explicit end marker.
    pub lines_to_end_of_cell_marker: Option<usize>,
    /// A non-default marker, e.g. `'''` for a markdown cell in a script.
    pub cell_marker: Option<String>,
}

impl CellLayout {
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == CellLayout::default()
    }
}

/// A notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Language of a code cell written in another language than the notebook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip)]
    pub layout: CellLayout,
}

impl Cell {
    /// Creates a cell of the given type with empty metadata.
    #[must_use]
    pub fn new(cell_type: CellType, source: impl Into<String>) -> Self {
        Cell {
            cell_type,
            source: source.into(),
            metadata: Metadata::new(),
            language: None,
            layout: CellLayout::default(),
        }
    }

    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Cell::new(CellType::Code, source)
    }

    #[must_use]
    pub fn markdown(source: impl Into<String>) -> Self {
        Cell::new(CellType::Markdown, source)
    }

    #[must_use]
    pub fn raw(source: impl Into<String>) -> Self {
        Cell::new(CellType::Raw, source)
    }

    /// Replaces the cell metadata. Non-object values give empty metadata.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::{metadata, Cell};
    ///
    /// let cell = Cell::code("1 + 1").with_metadata(metadata!({"tags": ["parameters"]}));
    /// assert!(cell.metadata.contains_key("tags"));
    /// ```
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = match metadata {
            Value::Object(map) => map,
            _ => Metadata::new(),
        };
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: CellLayout) -> Self {
        self.layout = layout;
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_code(&self) -> bool {
        matches!(self.cell_type, CellType::Code)
    }

    /// Source lines, as the readers and writers see them.
    ///
    /// An empty source is one empty line, and a trailing newline adds an
    /// empty last line.
    #[must_use]
    pub fn source_lines(&self) -> Vec<String> {
        if self.source.is_empty() {
            return vec![String::new()];
        }
        self.source.split('\n').map(str::to_string).collect()
    }
}

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub metadata: Metadata,
    pub cells: Vec<Cell>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
}

const fn default_nbformat() -> u32 {
    4
}

const fn default_nbformat_minor() -> u32 {
    5
}

impl Notebook {
    #[must_use]
    pub fn new(cells: Vec<Cell>) -> Self {
        Notebook {
            metadata: Metadata::new(),
            cells,
            nbformat: default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    /// Returns the `jupytext` section of the notebook metadata, if any.
    #[must_use]
    pub fn jupytext_metadata(&self) -> Option<&Metadata> {
        self.metadata.get("jupytext").and_then(Value::as_object)
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Notebook::new(Vec::new())
    }
}
