//! The sphinx-gallery reader.
//!
//! Markdown cells are either triple-quoted strings or blocks of comments
//! that start with a row of twenty or more `#`. Everything else is code.

use super::{count_lines_to_next_cell, is_blank, slice, uncomment, CellReader, ReaderState};
use crate::magics::uncomment_magic;
use crate::stringparser::StringParser;
use crate::{CellType, Format, Metadata, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TWENTY_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#( |)#{19,}\s*$").unwrap());

/// The markdown marker that needs no cell metadata.
pub(crate) const DEFAULT_MARKDOWN_CELL_MARKER: &str =
    "###############################################################################";

/// Returns the marker when the line starts a markdown cell.
fn start_of_new_markdown_cell(line: &str) -> Option<String> {
    if line == "\"\"" || line == "''" {
        return Some(line.to_string());
    }
    for triple_quote in ["\"\"\"", "'''"] {
        if line.starts_with(triple_quote) {
            return Some(triple_quote.to_string());
        }
    }
    TWENTY_HASH.is_match(line).then(|| line.to_string())
}

/// Reads sphinx-gallery Python scripts.
#[derive(Debug, Clone)]
pub struct SphinxReader {
    state: ReaderState,
    markdown_marker: Option<String>,
}

impl SphinxReader {
    #[must_use]
    pub fn new(fmt: &Format, default_language: Option<&str>) -> Self {
        let mut state = ReaderState::new(fmt, default_language.or(Some("python")), true);
        state.ext = ".py".to_string();
        state.comment = "#".to_string();
        SphinxReader {
            state,
            markdown_marker: None,
        }
    }

    fn find_markdown_end(&self, marker: &str, lines: &[String]) -> (usize, usize, bool) {
        // empty cell "" or ''
        if marker.len() <= 2 {
            if lines.len() == 1 || is_blank(&lines[1]) {
                return (0, 2, true);
            }
            return (0, 1, true);
        }

        if marker.len() == 3 {
            for (i, line) in lines.iter().enumerate() {
                if (i > 0 || line.trim() != marker) && line.trim_end().ends_with(marker) {
                    let explicit_end_of_cell_marker = line.trim() == marker;
                    let end_of_cell = if explicit_end_of_cell_marker { i } else { i + 1 };
                    if lines.len() <= i + 1 || is_blank(&lines[i + 1]) {
                        return (end_of_cell, i + 2, explicit_end_of_cell_marker);
                    }
                    return (end_of_cell, i + 1, explicit_end_of_cell_marker);
                }
            }
        } else {
            for (i, line) in lines.iter().enumerate().skip(1) {
                if !line.starts_with('#') {
                    if is_blank(line) {
                        return (i, i + 1, false);
                    }
                    return (i, i, false);
                }
            }
        }
        (lines.len(), lines.len(), false)
    }
}

impl CellReader for SphinxReader {
    fn state(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    fn read_options(&mut self, line: &str) -> Result<()> {
        self.markdown_marker = start_of_new_markdown_cell(line);
        match &self.markdown_marker {
            Some(marker) => {
                self.state.cell_type = CellType::Markdown;
                if marker != DEFAULT_MARKDOWN_CELL_MARKER {
                    self.state.layout.cell_marker = Some(marker.clone());
                }
            }
            None => self.state.cell_type = CellType::Code,
        }
        Ok(())
    }

    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        if let Some(marker) = &self.markdown_marker {
            // the blank line after the closing marker may be past the end of the text
            let (cell_end_marker, next_cell_start, explicit_eoc) = self.find_markdown_end(marker, lines);
            return Ok((cell_end_marker, next_cell_start.min(lines.len()), explicit_eoc));
        }

        let mut parser = StringParser::new(Some("python"));
        for (i, line) in lines.iter().enumerate() {
            if parser.is_quoted() {
                parser = parser.read_line(line);
                continue;
            }
            if start_of_new_markdown_cell(line).is_some() {
                if i > 0 && is_blank(&lines[i - 1]) {
                    return Ok((i - 1, i, false));
                }
                return Ok((i, i, false));
            }
            parser = parser.read_line(line);
        }
        Ok((lines.len(), lines.len(), false))
    }

    fn find_cell_content(&mut self, lines: &[String]) -> Result<usize> {
        let (cell_end_marker, next_cell_start, explicit_eoc) = self.find_cell_end(lines)?;
        let mut lines = lines.to_vec();

        let mut cell_start = 0;
        match self.markdown_marker.as_deref() {
            Some(marker) if marker == "\"\"\"" || marker == "'''" => {
                // remove the triple quotes
                if lines[0].trim() == marker {
                    cell_start = 1;
                } else if let Some(rest) = lines[0].get(3..) {
                    lines[0] = rest.to_string();
                }
                if !explicit_eoc && cell_end_marker > 0 && cell_end_marker <= lines.len() {
                    let last = &lines[cell_end_marker - 1];
                    let end = last.rfind(marker).unwrap_or(last.len());
                    lines[cell_end_marker - 1] = last[..end].to_string();
                }
            }
            Some(marker) if TWENTY_HASH.is_match(marker) => cell_start = 1,
            Some(_) => {}
            None => self.state.metadata = Some(Metadata::new()),
        }

        let mut source = slice(&lines, cell_start, cell_end_marker);
        self.state.org_content = source.clone();

        if self.state.cell_type == CellType::Code && self.state.comment_magics {
            source = uncomment_magic(&source, self.state.cell_language(), true, true);
        }
        let commented_markdown = self.markdown_marker.as_deref().map_or(false, |m| m.starts_with('#'));
        if self.state.cell_type == CellType::Markdown && commented_markdown {
            source = uncomment(&source, "#", "");
        }

        self.state.content = source;
        self.state.lines_to_next_cell =
            count_lines_to_next_cell(cell_end_marker, next_cell_start, lines.len(), explicit_eoc);
        Ok(next_cell_start)
    }

    fn uncomment_code_and_magics(&mut self, lines: Vec<String>) -> Vec<String> {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn sphinx() -> SphinxReader {
        SphinxReader::new(&Format::new(".py").with_format_name("sphinx"), None)
    }

    #[test]
    fn test_read_triple_quoted_markdown() {
        let text = lines("\"\"\"\nTitle\n=====\n\"\"\"\n\nx = 1");
        let read = sphinx().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "Title\n=====");
        assert_eq!(read.cell.layout.cell_marker.as_deref(), Some("\"\"\""));
        assert_eq!(read.next, 5);
    }

    #[test]
    fn test_markdown_at_end_of_file() {
        let text = lines("\"\"\"\n# Title\n\"\"\"");
        let read = sphinx().read(&text).unwrap();
        assert_eq!(read.cell.source, "# Title");
        assert_eq!(read.next, 3);
        assert_eq!(read.cell.layout.lines_to_next_cell, None);
    }

    #[test]
    fn test_read_twenty_hash_markdown() {
        let text = lines(&format!("{}\n# Some text\n\nx = 1", DEFAULT_MARKDOWN_CELL_MARKER));
        let read = sphinx().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "Some text");
        assert_eq!(read.cell.layout.cell_marker, None);
        assert_eq!(read.next, 3);
    }

    #[test]
    fn test_read_code_until_markdown() {
        let text = lines("x = 1\ns = '''\n\"\"\"\n'''\n\n\"\"\"Text\"\"\"");
        let read = sphinx().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Code);
        assert_eq!(read.cell.source, "x = 1\ns = '''\n\"\"\"\n'''");
        assert_eq!(read.next, 5);
    }

    #[test]
    fn test_empty_string_separates_code_cells() {
        let text = lines("\"\"\n\nx = 1");
        let read = sphinx().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "");
        assert_eq!(read.next, 2);
    }
}
