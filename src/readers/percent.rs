//! The percent and hydrogen script readers.
//!
//! Every cell starts with `# %%`, optionally followed by a title, a cell
//! type and metadata: `# %% Title [markdown] key="value"`. The legacy
//! `# In[ ]:` and `# <codecell>` markers are accepted too. A cell runs until
//! the next marker.

use super::light::{light_options_to_metadata, uncomment_script};
use super::{count_lines_to_next_cell, is_blank, last_two_lines_blank, slice, uncomment, CellReader, ReaderState};
use crate::languages::script_language;
use crate::stringparser::StringParser;
use crate::{CellType, Error, Format, Metadata, Result};
use regex::Regex;

/// Reads percent scripts; with `comment_magics` off by default, hydrogen scripts.
#[derive(Debug, Clone)]
pub struct PercentReader {
    state: ReaderState,
    start_code_re: Regex,
    alternative_start_code_re: Regex,
}

impl PercentReader {
    /// Creates a reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedExtension`] when the extension is not a script.
    pub fn new(fmt: &Format, default_language: Option<&str>, default_comment_magics: bool) -> Result<Self> {
        let mut state = ReaderState::new(fmt, default_language, default_comment_magics);
        let script = script_language(&state.ext).ok_or_else(|| Error::UnsupportedExtension(state.ext.clone()))?;
        state.comment = script.comment.to_string();
        state.comment_suffix = script.comment_suffix.to_string();
        state.explicit_soc = true;

        let comment = regex::escape(script.comment);
        Ok(PercentReader {
            state,
            start_code_re: Regex::new(&format!(r"^\s*{}\s*%%(%*)\s(.*)$", comment)).map_err(Error::custom)?,
            alternative_start_code_re: Regex::new(&format!(
                r"^\s*{}\s*(%%|<codecell>|In\[[0-9 ]*\]:?)\s*$",
                comment
            ))
            .map_err(Error::custom)?,
        })
    }

    fn is_cell_start(&self, line: &str) -> bool {
        self.start_code_re.is_match(line) || self.alternative_start_code_re.is_match(line)
    }
}

impl CellReader for PercentReader {
    fn state(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    fn read_options(&mut self, line: &str) -> Result<()> {
        if self.start_code_re.is_match(line) {
            let line = uncomment(&[line.to_string()], &self.state.comment, &self.state.comment_suffix)
                .pop()
                .unwrap_or_default();
            let options = line.find("%%").map_or("", |pos| &line[pos + 2..]);
            let metadata = light_options_to_metadata(&mut self.state, options);
            self.state.metadata = Some(metadata);
        } else {
            self.state.metadata = Some(Metadata::new());
        }
        Ok(())
    }

    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        if let Some(cell_type) = self.state.pop_cell_type() {
            self.state.cell_type = cell_type;
        } else if self.state.raw_if_inactive_in_notebook() {
            if self.state.is_active_here() {
                self.state.comment = String::new();
            }
        } else {
            self.state.cell_type = CellType::Code;
        }

        let mut next_cell = lines.len();
        let mut parser = StringParser::new(Some(self.state.cell_language()));
        for (i, line) in lines.iter().enumerate() {
            if parser.is_quoted() {
                parser = parser.read_line(line);
                continue;
            }
            parser = parser.read_line(line);
            if i > 0 && self.is_cell_start(line) {
                next_cell = i;
                break;
            }
        }

        if last_two_lines_blank(&lines[..next_cell]) {
            return Ok((next_cell - 2, next_cell, false));
        }
        if next_cell > 0 && is_blank(&lines[next_cell - 1]) {
            return Ok((next_cell - 1, next_cell, false));
        }
        Ok((next_cell, next_cell, false))
    }

    fn find_cell_content(&mut self, lines: &[String]) -> Result<usize> {
        let (cell_end_marker, next_cell_start, explicit_eoc) = self.find_cell_end(lines)?;
        let cell_start = match lines.first() {
            Some(first) if self.is_cell_start(first) => 1,
            _ => 0,
        };

        let source = slice(lines, cell_start, cell_end_marker);
        self.state.org_content = source.clone();
        self.state.content = self.extract_content(source);
        self.state.lines_to_next_cell =
            count_lines_to_next_cell(cell_end_marker, next_cell_start, lines.len(), explicit_eoc);
        Ok(next_cell_start)
    }

    fn uncomment_code_and_magics(&mut self, lines: Vec<String>) -> Vec<String> {
        uncomment_script(&mut self.state, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn percent() -> PercentReader {
        PercentReader::new(&Format::new(".py").with_format_name("percent"), None, true).unwrap()
    }

    #[test]
    fn test_read_code_cell() {
        let text = lines("# %%\na = 1\n\n# %%\nb = 2");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Code);
        assert_eq!(read.cell.source, "a = 1");
        assert_eq!(read.next, 3);
        assert!(read.cell.layout.is_default());
    }

    #[test]
    fn test_commented_magic_does_not_start_a_cell() {
        let text = lines("# %%\n# %%magic # this is a commented magic, not a cell\n\n7");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.source, "%%magic # this is a commented magic, not a cell\n\n7");
        assert_eq!(read.next, 4);
    }

    #[test]
    fn test_read_markdown_with_title_and_metadata() {
        let text = lines("# %% Part one [markdown] key=\"value\"\n# Some *text*\n\n# %%\nx");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "Some *text*");
        assert_eq!(read.cell.metadata.get_str("title"), Some("Part one"));
        assert_eq!(read.cell.metadata.get_str("key"), Some("value"));
        assert_eq!(read.next, 3);
    }

    #[test]
    fn test_read_markdown_as_string() {
        let text = lines("# %% [markdown]\n\"\"\"\nSome text\n\"\"\"");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.source, "Some text");
        assert_eq!(read.cell.layout.cell_marker.as_deref(), Some("\"\"\""));
    }

    #[test]
    fn test_inactive_cell_is_raw() {
        let text = lines("# %% active=\"py\"\nprint('only in scripts')");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Raw);
        assert_eq!(read.cell.source, "print('only in scripts')");
        assert_eq!(read.cell.metadata.get("active"), Some(&Value::from("py")));
    }

    #[test]
    fn test_sub_cells_and_legacy_markers() {
        let text = lines("# %%% Sub\nx = 1\n# In[2]:\ny = 2");
        let read = percent().read(&text).unwrap();
        assert_eq!(read.cell.metadata.get("cell_depth"), Some(&Value::from(1)));
        assert_eq!(read.cell.source, "x = 1");
        assert_eq!(read.next, 2);
        let read = percent().read(&text[2..]).unwrap();
        assert_eq!(read.cell.source, "y = 2");
    }

    #[test]
    fn test_hydrogen_keeps_magics() {
        let fmt = Format::new(".py").with_format_name("hydrogen");
        let text = lines("# %%\n# %matplotlib inline");
        let read = PercentReader::new(&fmt, None, false).unwrap().read(&text).unwrap();
        assert_eq!(read.cell.source, "# %matplotlib inline");
    }
}
