//! Whole-document conversion.
//!
//! [`reads`] peels the header off the text, then calls the dialect reader
//! until every line is consumed. [`writes`] is the inverse: it writes the
//! header, lets each cell writer produce its lines, and joins the cells
//! from the last one to the first so that the blank lines between two
//! cells can depend on the cell that follows.
//!
//! ## Usage
//!
//! ```rust
//! use nbtext::{reads, writes, Format};
//!
//! let fmt: Format = "py:light".parse().unwrap();
//! let text = "# This is a markdown cell\n\na = 1\n";
//!
//! let notebook = reads(text, &fmt).unwrap();
//! assert_eq!(notebook.cells.len(), 2);
//! assert_eq!(notebook.cells[0].source, "This is a markdown cell");
//! assert_eq!(writes(&notebook, &fmt).unwrap(), text);
//! ```

use crate::formats::{
    check_file_version, format_name_for_ext, get_format_implementation, guess_format, last_extension,
    read_metadata, Dialect,
};
use crate::header::{encoding_and_executable, header_to_metadata_and_cell, metadata_and_cell_to_header};
use crate::languages::{default_language_from_metadata_and_ext, set_main_and_cell_language};
use crate::metadata_filter::update_metadata_filters;
use crate::pep8::pep8_lines_between_cells;
use crate::readers::new_reader;
use crate::writers::new_writer;
use crate::{Cell, CellType, Error, Format, Metadata, Notebook, Result, Value};
use std::iter;
use tracing::{debug, trace, warn};

/// Where the `.ipynb` container lives; never read or written here.
const NOTEBOOK_EXTENSION: &str = ".ipynb";

/// Returns the format of a text document: the format recorded in its
/// header, or else the format guessed from its content.
///
/// # Examples
///
/// ```rust
/// use nbtext::detect_format;
///
/// assert_eq!(detect_format("# %%\nx = 1\n", ".py").to_string(), "py:percent");
/// assert_eq!(detect_format("x = 1\n", "py").to_string(), "py:light");
///
/// let fmt = detect_format("# region\nx = 1\n# endregion\n", ".py");
/// assert_eq!(fmt.options.cell_markers.as_deref(), Some("region,endregion"));
/// ```
#[must_use]
pub fn detect_format(text: &str, extension: &str) -> Format {
    let ext = last_extension(extension);
    let (name, options) = match format_name_for_ext(&read_metadata(text, &ext), &ext, false) {
        Some(name) => (name, Default::default()),
        None => guess_format(text, &ext),
    };
    let mut fmt = Format::new(&ext).with_options(options);
    if !name.is_empty() {
        fmt.format_name = Some(name);
    }
    fmt
}

/// Copies the format options found in the `jupytext` metadata into the
/// format, unless already set, then records the resulting options in the
/// metadata.
fn update_format_with_notebook_options(fmt: &mut Format, metadata: &mut Metadata) {
    if let Some(jupytext) = metadata.get("jupytext").and_then(Value::as_object) {
        fmt.options.merge_from_metadata(jupytext);
    }
    let mut options = Metadata::new();
    fmt.options.write_to_metadata(&mut options);
    if !options.is_empty() {
        let jupytext = metadata.object_entry("jupytext");
        for (name, value) in options {
            jupytext.insert(name, value);
        }
    }
}

fn warn_on_unsupported_keys(unsupported: &[String]) {
    let mut keys: Vec<&str> = unsupported.iter().map(String::as_str).collect();
    keys.sort_unstable();
    keys.dedup();
    if !keys.is_empty() {
        warn!(keys = ?keys, "metadata keys containing a comma cannot be written as text and were dropped");
    }
}

/// Reads a notebook from its text representation.
///
/// The format name recorded in the header of the text wins over the one in
/// `fmt`. When neither is known the format is guessed from the content.
/// Options of `fmt` win over those stored in the header.
///
/// # Errors
///
/// Fails when the extension or the format is not supported, when the
/// header or some chunk options cannot be parsed, and when the document
/// was written with an unreadable version of the format.
///
/// # Examples
///
/// ```rust
/// use nbtext::{reads, CellType, Format};
///
/// let text = "Some text\n\n```python\n1 + 1\n```\n";
/// let notebook = reads(text, &Format::new(".md")).unwrap();
/// assert_eq!(notebook.cells[0].cell_type, CellType::Markdown);
/// assert_eq!(notebook.cells[1].source, "1 + 1");
/// ```
pub fn reads(text: &str, fmt: &Format) -> Result<Notebook> {
    let ext = last_extension(&fmt.extension);
    if ext == NOTEBOOK_EXTENSION {
        return Err(Error::UnsupportedExtension(ext));
    }

    let mut fmt = fmt.clone();
    fmt.extension = ext.clone();
    match format_name_for_ext(&read_metadata(text, &ext), &ext, false).or_else(|| fmt.format_name.clone()) {
        Some(name) => fmt.format_name = Some(name),
        None => {
            let (name, options) = guess_format(text, &ext);
            if fmt.options.cell_markers.is_none() {
                fmt.options.cell_markers = options.cell_markers;
            }
            fmt.format_name = Some(name).filter(|name| !name.is_empty());
        }
    }
    let implementation = get_format_implementation(&ext, fmt.format_name.as_deref())?;
    fmt.format_name = Some(implementation.format_name.to_string());

    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let header = header_to_metadata_and_cell(
        &lines,
        implementation.header_prefix,
        implementation.header_suffix,
        implementation.extension,
        fmt.options.root_level_metadata_as_raw_cell.unwrap_or(true),
    )?;
    let mut metadata = header.metadata;
    check_file_version(&metadata, implementation)?;
    let default_language = default_language_from_metadata_and_ext(&mut metadata, &ext, false);
    update_format_with_notebook_options(&mut fmt, &mut metadata);

    let mut cells = Vec::new();
    cells.extend(header.cell);
    if implementation.dialect == Dialect::Sphinx {
        cells.push(Cell::code("%matplotlib inline"));
    }

    let mut position = header.next.min(lines.len());
    let mut cell_metadata_json = false;
    while position < lines.len() {
        let mut reader = new_reader(&fmt, default_language.as_deref())?;
        let read = reader.read(&lines[position..])?;
        if read.next == 0 {
            return Err(Error::NoProgress {
                dialect: implementation.format_name,
                line: position + 1,
            });
        }
        trace!(
            line = position + 1,
            cell_type = %read.cell.cell_type,
            lines = read.next,
            "read cell"
        );
        cell_metadata_json |= read.cell_metadata_json;
        cells.push(read.cell);
        position += read.next;
    }

    set_main_and_cell_language(&mut metadata, &mut cells, &ext, &fmt.options.custom_cell_magics_list());

    let mut cell_keys: Vec<String> = Vec::new();
    for key in cells.iter().flat_map(|cell| cell.metadata.keys()) {
        if !cell_keys.contains(key) {
            cell_keys.push(key.clone());
        }
    }
    update_metadata_filters(&mut metadata, header.has_jupyter_md, &cell_keys);

    if cell_metadata_json {
        let jupytext = metadata.object_entry("jupytext");
        if !jupytext.contains_key("cell_metadata_json") {
            jupytext.insert("cell_metadata_json".to_string(), Value::Bool(true));
        }
    }

    if implementation.dialect == Dialect::Sphinx {
        cells = drop_empty_cells_between_code_cells(cells);
    }

    let representation = metadata.object_entry("jupytext").object_entry("text_representation");
    representation.insert("extension".to_string(), Value::from(ext.as_str()));
    representation.insert("format_name".to_string(), Value::from(implementation.format_name));

    debug!(format = %fmt, cells = cells.len(), "read notebook");
    Ok(Notebook {
        metadata,
        ..Notebook::new(cells)
    })
}

/// Sphinx-gallery separates consecutive code cells with an empty string,
/// which is not a cell of its own.
fn drop_empty_cells_between_code_cells(cells: Vec<Cell>) -> Vec<Cell> {
    let is_markdown = |cell: Option<&Cell>| cell.map_or(false, |cell| cell.cell_type == CellType::Markdown);
    let count = cells.len();
    let mut kept = Vec::with_capacity(count);
    for (i, cell) in cells.iter().enumerate() {
        let separator = cell.source.is_empty()
            && i > 0
            && i + 1 < count
            && !is_markdown(cells.get(i - 1))
            && !is_markdown(cells.get(i + 1));
        if !separator {
            kept.push(cell.clone());
        }
    }
    kept
}

fn starts_with(text: &[String], prefix: &str) -> bool {
    text.first().map_or(false, |line| line.starts_with(prefix))
}

/// Writes a notebook in the given text format.
///
/// Without a format name, the format recorded for that extension in the
/// notebook metadata is used, and otherwise the default format of the
/// extension.
///
/// # Errors
///
/// Fails when the extension or the format is not supported, or when the
/// notebook metadata cannot be written as YAML.
///
/// # Examples
///
/// ```rust
/// use nbtext::{writes, Cell, Format, Notebook};
///
/// let notebook = Notebook::new(vec![Cell::markdown("A title"), Cell::code("x = 1")]);
/// let text = writes(&notebook, &"py:percent".parse::<Format>().unwrap()).unwrap();
/// assert_eq!(text, "# %% [markdown]\n# A title\n\n# %%\nx = 1\n");
/// ```
pub fn writes(notebook: &Notebook, fmt: &Format) -> Result<String> {
    let ext = last_extension(&fmt.extension);
    if ext == NOTEBOOK_EXTENSION {
        return Err(Error::UnsupportedExtension(ext));
    }

    let mut metadata = notebook.metadata.clone();
    let mut fmt = fmt.clone();
    fmt.extension = ext.clone();
    if fmt.format_name.as_deref().map_or(true, str::is_empty) {
        fmt.format_name = format_name_for_ext(&metadata, &ext, false);
    }
    let implementation = get_format_implementation(&ext, fmt.format_name.as_deref())?;
    fmt.format_name = Some(implementation.format_name.to_string());

    let default_language =
        default_language_from_metadata_and_ext(&mut metadata, &ext, true).unwrap_or_else(|| "python".to_string());
    update_format_with_notebook_options(&mut fmt, &mut metadata);
    if fmt.options.use_runtools.is_none() {
        let uses_runtools = notebook.cells.iter().any(|cell| {
            ["hide_input", "hide_output"]
                .iter()
                .any(|key| cell.metadata.get(key).map_or(false, Value::is_truthy))
        });
        if uses_runtools {
            fmt.options.use_runtools = Some(true);
        }
    }

    let mut header = encoding_and_executable(&notebook.cells, &mut metadata, &ext);
    let mut cells = notebook.cells.clone();
    let mut unsupported = Vec::new();
    let (header_content, header_lines_to_next_cell) =
        metadata_and_cell_to_header(&mut cells, &metadata, implementation, &fmt.options, &mut unsupported)?;
    header.extend(header_content.iter().cloned());

    let sphinx = implementation.dialect == Dialect::Sphinx;
    if sphinx {
        if let Some(cell) = cells.iter_mut().find(|cell| cell.cell_type == CellType::Markdown) {
            cell.layout.cell_marker.get_or_insert_with(|| "\"\"\"".to_string());
        }
    }

    let mut writers = cells
        .iter()
        .map(|cell| new_writer(cell, &default_language, &fmt, &mut unsupported))
        .collect::<Result<Vec<_>>>()?;
    warn_on_unsupported_keys(&unsupported);

    let texts = writers
        .iter_mut()
        .map(|writer| writer.cell_to_text())
        .collect::<Result<Vec<_>>>()?;
    let is_code: Vec<bool> = writers.iter_mut().map(|writer| writer.is_code()).collect();

    let markdown_like = matches!(ext.as_str(), ".md" | ".markdown" | ".Rmd");
    let split_at_heading = fmt.options.split_at_heading.unwrap_or(false);
    let count = writers.len();
    let mut lines: Vec<String> = Vec::new();

    // from the last cell to the first, as blank lines depend on the next cell
    for (i, writer) in writers.iter_mut().enumerate().rev() {
        let mut text = writer.remove_eoc_marker(texts[i].clone(), &lines);
        if i == 0 && sphinx && (text == ["%matplotlib inline"] || text == ["# %matplotlib inline"]) {
            continue;
        }

        let blank_lines = writer
            .lines_to_next_cell()
            .unwrap_or_else(|| pep8_lines_between_cells(&text, &lines, &ext));
        text.extend(iter::repeat(String::new()).take(blank_lines));

        let has_next = i + 1 < count;
        // consecutive text cells need a second blank line to stay apart
        if markdown_like
            && !is_code[i]
            && has_next
            && !is_code[i + 1]
            && !starts_with(&texts[i], "<!-- #")
            && !starts_with(&texts[i + 1], "<!-- #")
            && !(split_at_heading && starts_with(&texts[i + 1], "#"))
        {
            text.push(String::new());
        }
        if sphinx && is_code[i] && has_next && is_code[i + 1] {
            text.push("\"\"".to_string());
        }

        text.extend(lines);
        lines = text;
    }

    let header_blank_lines =
        header_lines_to_next_cell.unwrap_or_else(|| pep8_lines_between_cells(&header_content, &lines, &ext));
    header.extend(iter::repeat(String::new()).take(header_blank_lines));
    header.extend(lines);

    debug!(format = %fmt, cells = count, "wrote notebook");
    Ok(header.join("\n"))
}

/// Reads the first cell of `lines`, and returns it with the number of lines
/// it spans (blank lines after it included).
///
/// # Errors
///
/// Fails when the format is not supported, or when the cell options cannot
/// be parsed.
///
/// # Examples
///
/// ```rust
/// use nbtext::{read_cell, CellType, Format};
///
/// let lines: Vec<String> = ["# %% [markdown]", "# Text", "", "# %%", "x = 1"]
///     .iter()
///     .map(|line| line.to_string())
///     .collect();
/// let (cell, next) = read_cell(&lines, &"py:percent".parse::<Format>().unwrap(), None).unwrap();
/// assert_eq!((cell.cell_type, cell.source.as_str(), next), (CellType::Markdown, "Text", 3));
/// ```
pub fn read_cell(lines: &[String], fmt: &Format, default_language: Option<&str>) -> Result<(Cell, usize)> {
    let read = new_reader(fmt, default_language)?.read(lines)?;
    Ok((read.cell, read.next))
}

/// Writes a single cell, without the blank lines that follow it.
///
/// # Errors
///
/// Fails when the format is not supported.
///
/// # Examples
///
/// ```rust
/// use nbtext::{cell_to_lines, Cell, Format};
///
/// let lines = cell_to_lines(&Cell::code("%matplotlib inline"), &Format::new(".py"), "python").unwrap();
/// assert_eq!(lines, vec!["# %matplotlib inline"]);
/// ```
pub fn cell_to_lines(cell: &Cell, fmt: &Format, default_language: &str) -> Result<Vec<String>> {
    let mut unsupported = Vec::new();
    let mut writer = new_writer(cell, default_language, fmt, &mut unsupported)?;
    warn_on_unsupported_keys(&unsupported);
    writer.cell_to_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use pretty_assertions::assert_eq;

    fn fmt(text: &str) -> Format {
        text.parse().unwrap()
    }

    #[test]
    fn test_read_light_script() {
        let notebook = reads("# This is a markdown cell\n\na = 1\n", &fmt("py:light")).unwrap();
        assert_eq!(notebook.cells, vec![Cell::markdown("This is a markdown cell"), Cell::code("a = 1")]);
    }

    #[test]
    fn test_text_without_header_gets_filters() {
        let notebook = reads("a = 1\n", &fmt("py:light")).unwrap();
        let jupytext = notebook.jupytext_metadata().unwrap();
        assert_eq!(jupytext.get_str("notebook_metadata_filter"), Some("-all"));
        assert_eq!(jupytext.get_str("cell_metadata_filter"), Some("-all"));
    }

    #[test]
    fn test_format_name_from_header_wins() {
        let text = "# ---\n# jupyter:\n#   jupytext:\n#     text_representation:\n#       extension: .py\n#       format_name: percent\n# ---\n\n# %%\nx = 1\n";
        let notebook = reads(text, &fmt("py:light")).unwrap();
        assert_eq!(notebook.cells, vec![Cell::code("x = 1")]);
    }

    #[test]
    fn test_format_is_guessed() {
        let notebook = reads("# %%\nx = 1\n\n# %%\ny = 2\n", &Format::new(".py")).unwrap();
        assert_eq!(notebook.cells.len(), 2);
        assert_eq!(notebook.cells[1].source, "y = 2");
    }

    #[test]
    fn test_guessed_format_is_kept_for_writing() {
        let text = "# %%\nx = 1\n\n# %%\ny = 2\n";
        let notebook = reads(text, &Format::new(".py")).unwrap();
        let representation = notebook
            .jupytext_metadata()
            .and_then(|jupytext| jupytext.get("text_representation"))
            .and_then(Value::as_object)
            .unwrap();
        assert_eq!(representation.get_str("extension"), Some(".py"));
        assert_eq!(representation.get_str("format_name"), Some("percent"));
        assert_eq!(writes(&notebook, &Format::new(".py")).unwrap(), text);
    }

    #[test]
    fn test_spin_script_stays_spin() {
        let notebook = reads("#' Some text\nx <- 1\n", &Format::new(".R")).unwrap();
        let text = writes(&notebook, &Format::new(".R")).unwrap();
        assert!(text.starts_with("#' Some text\n"), "{}", text);

        let back = reads(&text, &Format::new(".R")).unwrap();
        let sources: Vec<&str> = back.cells.iter().map(|cell| cell.source.as_str()).collect();
        assert_eq!(sources, vec!["Some text", "x <- 1"]);
    }

    #[test]
    fn test_ipynb_is_not_a_text_format() {
        assert!(matches!(
            reads("{}", &Format::new(".ipynb")),
            Err(Error::UnsupportedExtension(_))
        ));
        assert!(matches!(
            writes(&Notebook::default(), &Format::new("ipynb")),
            Err(Error::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_unknown_format_name() {
        let err = writes(&Notebook::default(), &fmt("py:rmarkdown")).unwrap_err();
        assert!(matches!(err, Error::UnknownFormat { .. }));
        assert!(err.to_string().contains("percent"));
    }

    #[test]
    fn test_write_with_pep8_spacing() {
        let notebook = Notebook::new(vec![
            Cell::code("import os"),
            Cell::code("def f(x):\n    return x"),
            Cell::code("f(1)"),
        ]);
        assert_eq!(
            writes(&notebook, &fmt("py:percent")).unwrap(),
            "# %%\nimport os\n\n\n# %%\ndef f(x):\n    return x\n\n\n# %%\nf(1)\n"
        );
    }

    #[test]
    fn test_write_consecutive_markdown_cells_in_markdown() {
        let notebook = Notebook::new(vec![Cell::markdown("First"), Cell::markdown("Second")]);
        assert_eq!(writes(&notebook, &fmt("md")).unwrap(), "First\n\n\nSecond\n");
    }

    #[test]
    fn test_split_at_heading() {
        let notebook = Notebook::new(vec![Cell::markdown("Text"), Cell::markdown("# Heading")])
            .with_metadata(metadata!({"jupytext": {"notebook_metadata_filter": "-all"}}));
        let fmt = Format::new(".md").with_options(crate::FormatOptions::new().with_split_at_heading(true));
        assert_eq!(writes(&notebook, &fmt).unwrap(), "Text\n\n# Heading\n");
    }

    #[test]
    fn test_write_header() {
        let notebook = Notebook::new(vec![Cell::code("x = 1")]).with_metadata(metadata!({
            "kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"}
        }));
        assert_eq!(
            writes(&notebook, &fmt("py:percent")).unwrap(),
            "# ---\n# jupyter:\n#   kernelspec:\n#     display_name: Python 3\n#     language: python\n#     name: python3\n# ---\n\n# %%\nx = 1\n"
        );
    }

    #[test]
    fn test_use_runtools_is_detected() {
        let cell = Cell::code("plot(1)").with_metadata(metadata!({"hide_input": true}));
        let notebook = Notebook::new(vec![cell]);
        let text = writes(&notebook, &fmt("Rmd")).unwrap();
        assert_eq!(text, "```{python echo=FALSE}\nplot(1)\n```\n");
    }

    #[test]
    fn test_sphinx_round_trip() {
        let text = "\"\"\"\nA title\n\"\"\"\n\nx = 1\n\n\"\"\ny = 2\n";
        let notebook = reads(text, &fmt("py:sphinx")).unwrap();
        assert_eq!(notebook.cells[0].source, "%matplotlib inline");
        assert_eq!(notebook.cells[1].cell_type, CellType::Markdown);
        assert_eq!(
            notebook.cells.iter().filter(|cell| cell.is_code()).count(),
            3,
            "the empty separator is not a cell"
        );
        assert_eq!(writes(&notebook, &fmt("py:sphinx")).unwrap(), text);
    }

    #[test]
    fn test_sphinx_ending_in_markdown_is_stable() {
        let notebook = Notebook::new(vec![Cell::markdown("# Title")]);
        let text = writes(&notebook, &fmt("py:sphinx")).unwrap();
        assert_eq!(text, "\"\"\"\n# Title\n\"\"\"\n");

        let back = reads(&text, &fmt("py:sphinx")).unwrap();
        assert_eq!(writes(&back, &fmt("py:sphinx")).unwrap(), text);
    }

    #[test]
    fn test_read_and_write_single_cells() {
        let lines = vec!["x = 1".to_string(), String::new(), "y = 2".to_string()];
        let (cell, next) = read_cell(&lines, &fmt("py:light"), Some("python")).unwrap();
        assert_eq!((cell.source.as_str(), next), ("x = 1", 2));
        assert_eq!(cell_to_lines(&cell, &fmt("py:light"), "python").unwrap(), vec!["x = 1"]);
    }

    #[test]
    fn test_drop_empty_cells_between_code_cells() {
        let cells = vec![Cell::code("x = 1"), Cell::code(""), Cell::code("y = 2"), Cell::markdown("")];
        assert_eq!(
            drop_empty_cells_between_code_cells(cells),
            vec![Cell::code("x = 1"), Cell::code("y = 2"), Cell::markdown("")]
        );
    }
}
