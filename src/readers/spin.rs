//! The knitr spin reader, for R scripts.
//!
//! Lines starting with `#'` are markdown, `#+ options` starts a code chunk
//! with R Markdown options, and other code paragraphs are separated by blank
//! lines.

use super::light::uncomment_script;
use super::{is_blank, next_code_is_indented, CellReader, ReaderState};
use crate::chunk_options::rmd_options_to_metadata;
use crate::stringparser::StringParser;
use crate::{CellType, Format, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static START_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\+(.*)\s*$").unwrap());

const MARKDOWN_PREFIX: &str = "#'";

/// Reads R scripts written for knitr spin.
#[derive(Debug, Clone)]
pub struct SpinReader {
    state: ReaderState,
}

impl SpinReader {
    #[must_use]
    pub fn new(fmt: &Format, default_language: Option<&str>) -> Self {
        let mut state = ReaderState::new(fmt, default_language, true);
        state.comment = MARKDOWN_PREFIX.to_string();
        state.markdown_prefix = Some(MARKDOWN_PREFIX);
        SpinReader { state }
    }
}

impl CellReader for SpinReader {
    fn state(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    fn read_options(&mut self, line: &str) -> Result<()> {
        if let Some(captures) = START_CODE.captures(line) {
            let options = format!("r {}", captures.get(1).map_or("", |m| m.as_str()));
            let (language, metadata) = rmd_options_to_metadata(&options, self.state.use_runtools)?;
            self.state.language = Some(language).filter(|language| !language.is_empty());
            self.state.metadata = Some(metadata);
        }
        Ok(())
    }

    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        let starts_with_markdown = lines.first().map_or(false, |line| line.starts_with(MARKDOWN_PREFIX));
        if self.state.metadata.is_none() && starts_with_markdown {
            self.state.cell_type = CellType::Markdown;
            for (i, line) in lines.iter().enumerate() {
                if !line.starts_with(MARKDOWN_PREFIX) {
                    if is_blank(line) {
                        return Ok((i, i + 1, false));
                    }
                    return Ok((i, i, false));
                }
            }
            return Ok((lines.len(), lines.len(), false));
        }

        self.state.cell_type = self.state.pop_cell_type().unwrap_or(CellType::Code);

        let mut parser = StringParser::new(Some(self.state.cell_language()));
        for (i, line) in lines.iter().enumerate() {
            if self.state.metadata.is_some() && i == 0 {
                continue;
            }
            if parser.is_quoted() {
                parser = parser.read_line(line);
                continue;
            }
            parser = parser.read_line(line);

            if START_CODE.is_match(line) || line.starts_with(MARKDOWN_PREFIX) {
                if i > 0 && is_blank(&lines[i - 1]) {
                    if i > 1 && is_blank(&lines[i - 2]) {
                        return Ok((i - 2, i, false));
                    }
                    return Ok((i - 1, i, false));
                }
                return Ok((i, i, false));
            }

            if is_blank(line) && !next_code_is_indented(&lines[i..]) {
                if i > 0 {
                    return Ok((i, i + 1, false));
                }
                if lines.len() > 1 && !is_blank(&lines[1]) {
                    return Ok((1, 1, false));
                }
                return Ok((1, 2, false));
            }
        }
        Ok((lines.len(), lines.len(), false))
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

    fn spin() -> SpinReader {
        SpinReader::new(&Format::new(".R").with_format_name("spin"), None)
    }

    #[test]
    fn test_read_markdown() {
        let text = lines("#' # Title\n#' Some text\n\nx <- 1");
        let read = spin().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "# Title\nSome text");
        assert_eq!(read.next, 3);
    }

    #[test]
    fn test_read_chunk_with_options() {
        let text = lines("#+ echo=FALSE\nplot(1)\n\n#' Text");
        let read = spin().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Code);
        assert_eq!(read.cell.source, "plot(1)");
        assert_eq!(
            read.cell.metadata.get("tags"),
            Some(&Value::Array(vec![Value::from("remove_input")]))
        );
        assert_eq!(read.next, 3);
    }

    #[test]
    fn test_read_code_paragraph() {
        let text = lines("x <- 1\ny <- 2\n\nz <- 3");
        let read = spin().read(&text).unwrap();
        assert_eq!(read.cell.source, "x <- 1\ny <- 2");
        assert_eq!(read.next, 3);
    }
}
