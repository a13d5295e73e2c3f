//! Cell readers: one state machine per text dialect.
//!
//! A reader consumes the first cell of the remaining lines of a document
//! and returns it, together with the position of the next cell. Readers are
//! single use: the document driver creates a fresh one for every cell.
//!
//! All dialects share the same protocol, implemented by the provided
//! methods of [`CellReader`]:
//!
//! 1. parse the options of the marker line, if any
//! 2. find where the cell ends, and where the next one starts
//! 3. extract the content, removing one comment layer where needed
//! 4. record the blank lines to the next cell when they differ from the
//!    default
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::readers::new_reader;
//! use nbtext::{CellType, Format};
//!
//! let lines: Vec<String> = ["# A comment", "", "x = 1"].iter().map(|s| s.to_string()).collect();
//! let mut reader = new_reader(&Format::new(".py").with_format_name("light"), None).unwrap();
//! let read = reader.read(&lines).unwrap();
//! assert_eq!(read.cell.cell_type, CellType::Markdown);
//! assert_eq!(read.cell.source, "A comment");
//! assert_eq!(read.next, 2);
//! ```

mod light;
mod markdown;
mod percent;
mod sphinx;
mod spin;

pub use light::LightReader;
pub use markdown::MarkdownReader;
pub use percent::PercentReader;
pub use sphinx::SphinxReader;
pub use spin::SpinReader;

pub(crate) use sphinx::DEFAULT_MARKDOWN_CELL_MARKER;

use crate::cell_metadata::is_active;
use crate::formats::{get_format_implementation, Dialect};
use crate::header::uncomment_line;
use crate::languages::script_language;
use crate::pep8::pep8_lines_between_cells;
use crate::{Cell, CellLayout, CellType, Format, Metadata, Result, Value};
use std::mem;

/// One cell read from the text, and where the next one starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRead {
    pub cell: Cell,
    /// Number of lines consumed.
    pub next: usize,
    /// Were the cell options written as JSON?
    pub cell_metadata_json: bool,
}

/// Scan state shared by all readers.
#[derive(Debug, Clone)]
pub struct ReaderState {
    pub ext: String,
    pub default_language: String,
    /// Comment used to make code inactive.
    pub comment: String,
    pub comment_suffix: String,
    /// Prefix of markdown lines, when it differs from the comment.
    pub markdown_prefix: Option<&'static str>,
    pub comment_magics: bool,
    pub use_runtools: bool,
    pub format_version: Option<String>,
    pub cell_metadata_json: bool,
    /// `None` until an explicit cell start (with options) is found.
    pub metadata: Option<Metadata>,
    pub org_content: Vec<String>,
    pub content: Vec<String>,
    pub explicit_soc: bool,
    pub explicit_eoc: bool,
    pub cell_type: CellType,
    pub language: Option<String>,
    pub lines_to_next_cell: usize,
    pub layout: CellLayout,
}

impl ReaderState {
    /// Creates an empty state for the given format.
    #[must_use]
    pub fn new(fmt: &Format, default_language: Option<&str>, default_comment_magics: bool) -> Self {
        let options = &fmt.options;
        let default_language = default_language
            .filter(|language| !language.is_empty())
            .map(str::to_string)
            .or_else(|| script_language(&fmt.extension).map(|script| script.language.to_string()))
            .unwrap_or_else(|| "python".to_string());
        ReaderState {
            ext: fmt.extension.clone(),
            default_language,
            comment: String::new(),
            comment_suffix: String::new(),
            markdown_prefix: None,
            comment_magics: options.comment_magics.unwrap_or(default_comment_magics),
            use_runtools: options.use_runtools.unwrap_or(false),
            format_version: options.format_version.clone(),
            cell_metadata_json: options.cell_metadata_json.unwrap_or(false),
            metadata: None,
            org_content: Vec::new(),
            content: Vec::new(),
            explicit_soc: false,
            explicit_eoc: false,
            cell_type: CellType::Code,
            language: None,
            lines_to_next_cell: 1,
            layout: CellLayout::default(),
        }
    }

    /// The language of the current cell.
    #[must_use]
    pub fn cell_language(&self) -> &str {
        self.language.as_deref().unwrap_or(&self.default_language)
    }

    /// The cell metadata, created on first access.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.metadata.get_or_insert_with(Metadata::new)
    }

    /// Is the current cell active in the document?
    #[must_use]
    pub fn is_active_here(&self) -> bool {
        self.metadata
            .as_ref()
            .map_or(true, |metadata| is_active(&self.ext, metadata, true))
    }

    /// Pops the `cell_type` option, if any.
    pub fn pop_cell_type(&mut self) -> Option<CellType> {
        self.metadata
            .as_mut()
            .and_then(|metadata| metadata.shift_remove("cell_type"))
            .and_then(|cell_type| cell_type.as_str().and_then(CellType::from_name))
    }

    /// Turns an inactive code cell into a raw cell.
    ///
    /// Returns `false` when the cell stays a code cell.
    pub fn raw_if_inactive_in_notebook(&mut self) -> bool {
        let metadata = self.metadata_mut();
        if is_active(".ipynb", metadata, true) {
            return false;
        }
        if metadata.get("active") == Some(&Value::from("")) {
            metadata.shift_remove("active");
        }
        self.cell_type = CellType::Raw;
        true
    }
}

/// A per-dialect cell reader.
pub trait CellReader {
    fn state(&mut self) -> &mut ReaderState;

    /// Parses the options of the first line, when it is a cell marker.
    fn read_options(&mut self, line: &str) -> Result<()>;

    /// Returns the position of the end of the cell, of the first line of
    /// the next cell, and whether an explicit end marker was found.
    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)>;

    fn uncomment_code_and_magics(&mut self, lines: Vec<String>) -> Vec<String>;

    /// Reads one cell from the start of `lines`.
    fn read(&mut self, lines: &[String]) -> Result<CellRead> {
        if let Some(first) = lines.first() {
            self.read_options(first)?;
        }
        let state = self.state();
        if let Some(language) = state.metadata.as_mut().and_then(|m| m.shift_remove("language")) {
            state.language = language.as_str().map(str::to_string);
        }

        let next = self.find_cell_content(lines)?;

        let state = self.state();
        let mut metadata = state.metadata.take().unwrap_or_default();
        let expected_blank_lines = if state.ext == ".py" {
            let content = if state.org_content.is_empty() {
                vec![String::new()]
            } else {
                state.org_content.clone()
            };
            pep8_lines_between_cells(&content, tail(lines, next), &state.ext)
        } else {
            1
        };
        let mut layout = mem::take(&mut state.layout);
        if state.lines_to_next_cell != expected_blank_lines {
            layout.lines_to_next_cell = Some(state.lines_to_next_cell);
        }
        absorb_layout_keys(&mut metadata, &mut layout);

        let cell = Cell {
            cell_type: state.cell_type,
            source: state.content.join("\n"),
            metadata,
            language: state.language.clone().filter(|language| !language.is_empty()),
            layout,
        };
        Ok(CellRead {
            cell,
            next,
            cell_metadata_json: state.cell_metadata_json,
        })
    }

    /// Sets the content and the blank lines to the next cell, and returns
    /// the position of the next cell.
    fn find_cell_content(&mut self, lines: &[String]) -> Result<usize> {
        let (mut cell_end_marker, mut next_cell_start, explicit_eoc) = self.find_cell_end(lines)?;

        let state = self.state();
        state.explicit_eoc = explicit_eoc;
        let cell_start = if state.metadata.is_none() {
            state.metadata = Some(Metadata::new());
            0
        } else {
            1
        };

        let mut source = slice(lines, cell_start, cell_end_marker);
        state.org_content = source.clone();

        // exactly two blank lines before the end marker (PEP8)?
        if state.ext == ".py" && explicit_eoc {
            let lines_to_end_of_cell_marker = if last_two_lines_blank(&source) {
                source.truncate(source.len() - 2);
                2
            } else {
                0
            };
            let pep8_lines = pep8_lines_between_cells(&source, tail(lines, cell_end_marker), &state.ext);
            if lines_to_end_of_cell_marker != if pep8_lines == 1 { 0 } else { 2 } {
                state.layout.lines_to_end_of_cell_marker = Some(lines_to_end_of_cell_marker);
            }
        }

        state.explicit_soc = cell_start > 0;
        let content = self.extract_content(source);
        let state = self.state();
        state.content = content;

        if state.cell_type == CellType::Code
            && !state.raw_if_inactive_in_notebook()
            && (state.ext == ".md" || state.ext == ".markdown")
            && state.language.as_deref().map_or(true, str::is_empty)
        {
            if matches!(state.format_version.as_deref(), Some("1.0") | Some("1.1")) {
                state.cell_type = CellType::Raw;
            } else {
                // a code block without a language is part of the text
                state.cell_type = CellType::Markdown;
                state.explicit_eoc = false;
                cell_end_marker += 1;
                state.content = slice(lines, 0, cell_end_marker);
            }
        }

        if next_cell_start + 1 < lines.len()
            && is_blank(&lines[next_cell_start])
            && !is_blank(&lines[next_cell_start + 1])
        {
            next_cell_start += 1;
        } else if state.explicit_eoc
            && next_cell_start + 2 < lines.len()
            && is_blank(&lines[next_cell_start])
            && is_blank(&lines[next_cell_start + 1])
            && !is_blank(&lines[next_cell_start + 2])
        {
            next_cell_start += 2;
        }

        state.lines_to_next_cell =
            count_lines_to_next_cell(cell_end_marker, next_cell_start, lines.len(), state.explicit_eoc);
        Ok(next_cell_start)
    }

    /// Removes the comments of inactive cells, or hands over to
    /// [`CellReader::uncomment_code_and_magics`].
    fn extract_content(&mut self, lines: Vec<String>) -> Vec<String> {
        let state = self.state();
        let is_code = state.cell_type == CellType::Code;
        let ext = state.ext.clone();
        let metadata = state.metadata.clone().unwrap_or_default();

        // a cell that is just a multiline string is a markdown cell
        if ext == ".py" && !is_active(&ext, &metadata, is_code) {
            if let Some((content, marker)) = strip_string_marker(&lines.join("\n")) {
                if marker.is_some() {
                    state.layout.cell_marker = marker;
                }
                return content;
            }
        }

        let other_language = state
            .language
            .as_deref()
            .map_or(false, |language| !language.is_empty() && language != state.default_language);
        if !is_active(&ext, &metadata, true) || (!metadata.contains_key("active") && other_language) {
            let comment = if ext == ".r" || ext == ".R" { "#" } else { state.comment.as_str() };
            return uncomment(&lines, comment, "");
        }

        self.uncomment_code_and_magics(lines)
    }
}

/// Creates the reader of the dialect that `fmt` refers to.
///
/// # Errors
///
/// Fails when the format is unknown, or when custom cell markers cannot be
/// turned into patterns.
pub fn new_reader(fmt: &Format, default_language: Option<&str>) -> Result<Box<dyn CellReader>> {
    let implementation = get_format_implementation(&fmt.extension, fmt.format_name.as_deref())?;
    let reader: Box<dyn CellReader> = match implementation.dialect {
        Dialect::Markdown => Box::new(MarkdownReader::markdown(fmt, default_language)),
        Dialect::RMarkdown => Box::new(MarkdownReader::rmarkdown(fmt, default_language)),
        Dialect::Light | Dialect::NoMarker => Box::new(LightReader::new(fmt, default_language)?),
        Dialect::Percent => Box::new(PercentReader::new(fmt, default_language, true)?),
        Dialect::Hydrogen => Box::new(PercentReader::new(fmt, default_language, false)?),
        Dialect::Spin => Box::new(SpinReader::new(fmt, default_language)),
        Dialect::Sphinx => Box::new(SphinxReader::new(fmt, default_language)),
    };
    Ok(reader)
}

/// Moves formatting hints found in the text options into the cell layout.
fn absorb_layout_keys(metadata: &mut Metadata, layout: &mut CellLayout) {
    let as_count = |value: Value| value.as_i64().and_then(|count| usize::try_from(count).ok());
    if let Some(count) = metadata.shift_remove("lines_to_next_cell").and_then(as_count) {
        layout.lines_to_next_cell = Some(count);
    }
    if let Some(count) = metadata.shift_remove("lines_to_end_of_cell_marker").and_then(as_count) {
        layout.lines_to_end_of_cell_marker = Some(count);
    }
    if let Some(Value::String(marker)) = metadata.shift_remove("cell_marker") {
        layout.cell_marker = Some(marker);
    }
    for key in ["endofcell", "skipline", "noskipline"] {
        metadata.shift_remove(key);
    }
}

/// Removes `"""` (or `r"""`, `'''`...) around the content, and returns the
/// marker to remember when it is not the default one.
fn strip_string_marker(text: &str) -> Option<(Vec<String>, Option<String>)> {
    let content = text.trim();
    for prefix in ["", "r", "R"] {
        for triple_quote in ["\"\"\"", "'''"] {
            let mut left = format!("{}{}", prefix, triple_quote);
            let mut right = triple_quote.to_string();
            if !(content.starts_with(&left)
                && content.ends_with(&right)
                && content.len() >= left.len() + right.len())
            {
                continue;
            }
            let mut inner = &content[left.len()..content.len() - right.len()];
            if let Some(rest) = inner.strip_prefix('\n') {
                inner = rest;
                left.push('\n');
            }
            if let Some(rest) = inner.strip_suffix('\n') {
                inner = rest;
                right.insert(0, '\n');
            }

            let marker = if prefix.is_empty() {
                (left.len() == 4 && right.len() == 4).then(|| left[..3].to_string())
            } else if left.len() - 1 == 4 && right.len() == 4 {
                Some(left[..4].to_string())
            } else {
                Some(format!("{},{}", left, right))
            };
            return Some((inner.lines().map(str::to_string).collect(), marker));
        }
    }
    None
}

/// Removes the prefix (and one space), and the suffix, of every line.
#[must_use]
pub fn uncomment(lines: &[String], prefix: &str, suffix: &str) -> Vec<String> {
    lines
        .iter()
        .map(|line| uncomment_line(line, prefix, suffix))
        .collect()
}

#[inline]
pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Lines from `start` on; empty past the end.
pub(crate) fn tail(lines: &[String], start: usize) -> &[String] {
    lines.get(start.min(lines.len())..).unwrap_or_default()
}

/// Lines `start..end`, clamped to the buffer.
pub(crate) fn slice(lines: &[String], start: usize, end: usize) -> Vec<String> {
    let end = end.min(lines.len());
    let start = start.min(end);
    lines[start..end].to_vec()
}

/// Is the paragraph a comment (and not a commented magic)?
pub(crate) fn paragraph_is_fully_commented(lines: &[String], comment: &str, main_language: &str) -> bool {
    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix(comment) {
            if rest.trim_start().starts_with(comment) {
                continue;
            }
            if crate::magics::is_magic(line, main_language, true, false) {
                return false;
            }
            continue;
        }
        return i > 0 && is_blank(line);
    }
    true
}

/// Is the next non-blank line indented?
pub(crate) fn next_code_is_indented(lines: &[String]) -> bool {
    lines
        .iter()
        .find(|line| !is_blank(line))
        .map_or(false, |line| line.starts_with(char::is_whitespace))
}

/// Blank lines between the end of the cell (or its end marker) and the next cell.
pub(crate) fn count_lines_to_next_cell(
    cell_end_marker: usize,
    next_cell_start: usize,
    total: usize,
    explicit_eoc: bool,
) -> usize {
    if cell_end_marker >= total {
        return 1;
    }
    let next_cell_start = next_cell_start.min(total);
    let mut lines_to_next_cell = next_cell_start.saturating_sub(cell_end_marker);
    if explicit_eoc {
        lines_to_next_cell = lines_to_next_cell.saturating_sub(1);
    }
    if next_cell_start >= total {
        lines_to_next_cell += 1;
    }
    lines_to_next_cell
}

/// Are the two last lines blank, and not the third last one?
pub(crate) fn last_two_lines_blank(source: &[String]) -> bool {
    match source {
        [.., third, second, last] => !is_blank(third) && is_blank(second) && is_blank(last),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_uncomment() {
        assert_eq!(uncomment(&lines("# a\n#b\nc"), "#", ""), vec!["a", "b", "c"]);
        assert_eq!(uncomment(&lines("(* a *)"), "(*", "*)"), vec!["a"]);
    }

    #[test]
    fn test_paragraph_is_fully_commented() {
        assert!(paragraph_is_fully_commented(&lines("# a\n# b\n\nx = 1"), "#", "python"));
        assert!(!paragraph_is_fully_commented(&lines("# a\nx = 1"), "#", "python"));
        assert!(!paragraph_is_fully_commented(&lines("# %matplotlib inline"), "#", "python"));
    }

    #[test]
    fn test_next_code_is_indented() {
        assert!(next_code_is_indented(&lines("\n\n    return 1")));
        assert!(!next_code_is_indented(&lines("\nx = 1")));
        assert!(!next_code_is_indented(&[]));
    }

    #[test]
    fn test_count_lines_to_next_cell() {
        assert_eq!(count_lines_to_next_cell(3, 4, 10, false), 1);
        assert_eq!(count_lines_to_next_cell(3, 4, 10, true), 0);
        assert_eq!(count_lines_to_next_cell(3, 4, 4, false), 2);
        assert_eq!(count_lines_to_next_cell(10, 10, 10, false), 1);
        // a next cell start past the end counts as the end
        assert_eq!(count_lines_to_next_cell(2, 4, 3, true), 1);
    }

    #[test]
    fn test_last_two_lines_blank() {
        assert!(last_two_lines_blank(&lines("x\n\n ")));
        assert!(!last_two_lines_blank(&lines("\n\n")));
        assert!(!last_two_lines_blank(&lines("x\ny\n ")));
    }

    #[test]
    fn test_strip_string_marker() {
        let (content, marker) = strip_string_marker("\"\"\"\nText\n\"\"\"").unwrap();
        assert_eq!(content, vec!["Text"]);
        assert_eq!(marker.as_deref(), Some("\"\"\""));

        let (content, marker) = strip_string_marker("r'''\nText\n'''").unwrap();
        assert_eq!(content, vec!["Text"]);
        assert_eq!(marker.as_deref(), Some("r'''"));

        let (_, marker) = strip_string_marker("'''Text'''").unwrap();
        assert_eq!(marker, None);
        assert!(strip_string_marker("# Text").is_none());
    }

    #[test]
    fn test_new_reader_for_every_format() {
        for implementation in crate::formats::FORMATS.iter() {
            let fmt = Format::new(implementation.extension).with_format_name(implementation.format_name);
            assert!(new_reader(&fmt, None).is_ok(), "{}", fmt);
        }
    }
}
