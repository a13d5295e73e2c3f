//! The sphinx-gallery writer.

use super::{CellWriter, WriterState, TRIPLE_QUOTES};
use crate::languages::comment_lines;
use crate::magics::comment_magic;
use crate::readers::DEFAULT_MARKDOWN_CELL_MARKER;
use crate::{Cell, CellType, Format, Result};

/// Writes sphinx-gallery scripts: text cells are comment blocks under a
/// row of `#`, or triple-quoted strings.
#[derive(Debug, Clone)]
pub struct SphinxWriter {
    state: WriterState,
}

impl SphinxWriter {
    #[must_use]
    pub fn new(cell: &Cell, default_language: &str, fmt: &Format, unsupported: &mut Vec<String>) -> Self {
        let mut state = WriterState::new(cell, default_language, fmt, true, true, unsupported);
        state.comment = "#".to_string();
        SphinxWriter { state }
    }
}

impl CellWriter for SphinxWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }

    fn cell_to_text(&mut self) -> Result<Vec<String>> {
        if self.state.cell_type == CellType::Code {
            return self.code_to_text();
        }

        let state = &mut self.state;
        let cell_marker = state
            .cell_marker
            .take()
            .unwrap_or_else(|| DEFAULT_MARKDOWN_CELL_MARKER.to_string());

        if state.source == [String::new()] {
            let empty = if cell_marker == "\"\"" || cell_marker == "''" {
                cell_marker
            } else {
                "\"\"".to_string()
            };
            return Ok(vec![empty]);
        }

        if TRIPLE_QUOTES.contains(&cell_marker.as_str()) {
            let mut lines = Vec::with_capacity(state.source.len() + 2);
            lines.push(cell_marker.clone());
            lines.extend(state.source.iter().cloned());
            lines.push(cell_marker);
            return Ok(lines);
        }

        let marker = if cell_marker.starts_with(&"#".repeat(20)) {
            cell_marker
        } else {
            DEFAULT_MARKDOWN_CELL_MARKER.to_string()
        };
        let mut lines = vec![marker];
        lines.extend(comment_lines(&state.source, &state.comment, &state.comment_suffix));
        Ok(lines)
    }

    fn code_to_text(&mut self) -> Result<Vec<String>> {
        let state = &self.state;
        Ok(comment_magic(&state.source, &state.language, state.comment_magics, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(cell: &Cell) -> Vec<String> {
        let fmt = Format::new(".py").with_format_name("sphinx");
        SphinxWriter::new(cell, "python", &fmt, &mut Vec::new()).cell_to_text().unwrap()
    }

    #[test]
    fn test_write_code() {
        assert_eq!(write(&Cell::code("x = 1")), vec!["x = 1"]);
    }

    #[test]
    fn test_write_markdown_as_comments() {
        assert_eq!(
            write(&Cell::markdown("Some text")),
            vec![DEFAULT_MARKDOWN_CELL_MARKER, "# Some text"]
        );
    }

    #[test]
    fn test_write_markdown_as_string() {
        let mut cell = Cell::markdown("Title\n=====");
        cell.layout.cell_marker = Some("\"\"\"".to_string());
        assert_eq!(write(&cell), vec!["\"\"\"", "Title", "=====", "\"\"\""]);
    }

    #[test]
    fn test_write_empty_markdown() {
        assert_eq!(write(&Cell::markdown("")), vec!["\"\""]);
    }
}
