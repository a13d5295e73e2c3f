//! The light script reader.
//!
//! Cells are separated by blank lines, unless they start with an explicit
//! `# +` marker, in which case they end at `# -`. A paragraph that is fully
//! commented is a markdown cell.

use super::{
    is_blank, next_code_is_indented, paragraph_is_fully_commented, uncomment, CellReader, ReaderState,
};
use crate::cell_metadata::{is_json_metadata, script_options_to_metadata};
use crate::languages::script_language;
use crate::magics::{need_explicit_marker, uncomment_magic, unescape_code_start};
use crate::stringparser::StringParser;
use crate::{CellType, Error, Format, Metadata, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;

static GONB_MAGIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^((//\s*)*)(//\s*gonb:%%)").unwrap());

/// Reads light scripts, and nomarker scripts.
#[derive(Debug, Clone)]
pub struct LightReader {
    state: ReaderState,
    start_code_re: Regex,
    end_code_re: Option<Regex>,
    custom_markers: bool,
    ignore_end_marker: bool,
    explicit_end_marker_required: bool,
}

impl LightReader {
    /// Creates a reader; custom `cell_markers` such as `{{{,}}}` replace
    /// `# +` and `# -`.
    ///
    /// # Errors
    ///
    /// Returns an error when the custom markers do not make valid patterns.
    pub fn new(fmt: &Format, default_language: Option<&str>) -> Result<Self> {
        let mut state = ReaderState::new(fmt, default_language, true);
        if state.ext.is_empty() {
            state.ext = ".py".to_string();
        }
        let script = script_language(&state.ext).ok_or_else(|| Error::UnsupportedExtension(state.ext.clone()))?;
        state.comment = script.comment.to_string();
        state.comment_suffix = script.comment_suffix.to_string();
        let comment = regex::escape(script.comment);

        let is_light = fmt.format_name.as_deref().map_or(true, |name| name == "light");
        let markers = fmt
            .options
            .cell_markers
            .as_deref()
            .filter(|markers| is_light && *markers != "+,-")
            .and_then(|markers| markers.split_once(','));

        let (start_code_re, end_code_re) = match markers {
            Some((start, end)) => (
                Regex::new(&format!(r"^{}\s*{}(.*)$", comment, regex::escape(start))).map_err(Error::custom)?,
                Some(Regex::new(&format!(r"^{}\s*{}\s*$", comment, regex::escape(end))).map_err(Error::custom)?),
            ),
            None => (
                Regex::new(&format!(r"^{}\s*\+(.*)$", comment)).map_err(Error::custom)?,
                None,
            ),
        };

        Ok(LightReader {
            state,
            start_code_re,
            custom_markers: end_code_re.is_some(),
            end_code_re,
            ignore_end_marker: true,
            explicit_end_marker_required: false,
        })
    }

    fn is_custom_end(&self, line: &str) -> bool {
        self.custom_markers
            && self
                .end_code_re
                .as_ref()
                .map_or(false, |end_code_re| end_code_re.is_match(line))
    }

    /// Finds the end of a cell that started with a marker, or of a code paragraph.
    fn find_region_end(&mut self, lines: &[String]) -> (usize, usize, bool) {
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

            if self.start_code_re.is_match(line) {
                if self.explicit_end_marker_required {
                    // the options only hold with an end marker before the next start
                    self.state.metadata = None;
                    self.state.language = None;
                }
                if i > 0 && is_blank(&lines[i - 1]) {
                    if i > 1 && is_blank(&lines[i - 2]) {
                        return (i - 2, i, false);
                    }
                    return (i - 1, i, false);
                }
                return (i, i, false);
            }

            match &self.end_code_re {
                Some(end_code_re) if !self.ignore_end_marker => {
                    if end_code_re.is_match(line) {
                        return (i, i + 1, true);
                    }
                }
                _ => {
                    if is_blank(line) && !next_code_is_indented(&lines[i..]) {
                        if i > 0 {
                            return (i, i + 1, false);
                        }
                        if lines.len() > 1 && !is_blank(&lines[1]) {
                            return (1, 1, false);
                        }
                        return (1, 2, false);
                    }
                }
            }
        }
        (lines.len(), lines.len(), false)
    }
}

/// Light and percent options: a title, a `[cell type]` and metadata.
pub(crate) fn light_options_to_metadata(state: &mut ReaderState, options: &str) -> Metadata {
    state.cell_metadata_json = state.cell_metadata_json || is_json_metadata(options);
    script_options_to_metadata(options)
}

/// The part of the script reader that removes comments and escapes.
pub(crate) fn uncomment_script(state: &mut ReaderState, mut lines: Vec<String>) -> Vec<String> {
    let is_code = state.cell_type == CellType::Code;
    let language = state.cell_language().to_string();
    if (is_code || state.comment != "#'") && state.comment_magics {
        if state.is_active_here() {
            lines = uncomment_magic(&lines, &language, true, state.explicit_soc);
            if is_code && !state.explicit_soc && need_explicit_marker(&lines, &language, true) {
                state
                    .metadata_mut()
                    .insert("comment_questions".to_string(), Value::Bool(false));
            }
        } else {
            lines = uncomment(&lines, "#", "");
        }
    }

    if state.default_language == "go" && state.language.is_none() {
        lines = lines
            .iter()
            .map(|line| GONB_MAGIC.replace(line, "${1}%%").into_owned())
            .collect();
    }

    if is_code {
        return unescape_code_start(&lines, &state.ext, &language);
    }
    let prefix = state.markdown_prefix.map_or_else(|| state.comment.clone(), str::to_string);
    uncomment(&lines, &prefix, &state.comment_suffix)
}

impl CellReader for LightReader {
    fn state(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    fn read_options(&mut self, line: &str) -> Result<()> {
        if self.start_code_re.is_match(line) {
            let suffix = self.state.comment_suffix.as_str();
            let mut line = line;
            if !suffix.is_empty() {
                if let Some(rest) = line.strip_suffix(suffix) {
                    line = rest.strip_suffix(' ').unwrap_or(rest);
                }
            }
            let options = self
                .start_code_re
                .captures(line)
                .and_then(|captures| captures.get(1))
                .map_or("", |options| options.as_str())
                .to_string();
            let metadata = light_options_to_metadata(&mut self.state, &options);
            self.state.metadata = Some(metadata);
            self.state.language = None;
            self.ignore_end_marker = false;
            if self.custom_markers {
                self.explicit_end_marker_required = true;
            }
        } else if self.is_custom_end(line) {
            self.state.metadata = None;
            self.state.cell_type = CellType::Code;
        }
        Ok(())
    }

    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        let starts_with_end = lines.first().map_or(false, |line| self.is_custom_end(line));
        if self.state.metadata.is_none()
            && !starts_with_end
            && paragraph_is_fully_commented(lines, &self.state.comment, &self.state.default_language)
        {
            self.state.cell_type = CellType::Markdown;
            let end = lines.iter().position(|line| is_blank(line));
            return Ok(match end {
                Some(i) => (i, i + 1, false),
                None => (lines.len(), lines.len(), false),
            });
        }

        match &mut self.state.metadata {
            None => self.end_code_re = None,
            Some(metadata) if !self.custom_markers => {
                let end_of_cell = match metadata.shift_remove("endofcell") {
                    Some(Value::String(end)) => end,
                    Some(other) => other.to_string(),
                    None => "-".to_string(),
                };
                self.end_code_re = Some(
                    Regex::new(&format!(
                        r"^{} {}\s*$",
                        regex::escape(&self.state.comment),
                        regex::escape(&end_of_cell)
                    ))
                    .map_err(Error::custom)?,
                );
            }
            Some(_) => {}
        }

        Ok(self.find_region_end(lines))
    }

    fn uncomment_code_and_magics(&mut self, lines: Vec<String>) -> Vec<String> {
        uncomment_script(&mut self.state, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn light() -> LightReader {
        LightReader::new(&Format::new(".py").with_format_name("light"), None).unwrap()
    }

    #[test]
    fn test_read_markdown_then_code() {
        let text = lines("# This is a markdown cell\n\na = 1");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "This is a markdown cell");
        assert_eq!(read.next, 2);

        let read = light().read(&text[2..]).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Code);
        assert_eq!(read.cell.source, "a = 1");
        assert_eq!(read.next, 1);
    }

    #[test]
    fn test_read_explicit_cell_with_metadata() {
        let text = lines("# + {\"tags\": [\"parameters\"]}\na = 1\n\nb = 2\n# -\n\nc = 3");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.source, "a = 1\n\nb = 2");
        assert!(read.cell.metadata.contains_key("tags"));
        assert!(read.cell_metadata_json);
        assert_eq!(read.next, 6);
    }

    #[test]
    fn test_read_escalated_end_marker() {
        let text = lines("# + endofcell=\"--\"\n# -\nx = 1\n# --");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.source, "# -\nx = 1");
        assert!(read.cell.metadata.is_empty());
        assert_eq!(read.next, 4);
    }

    #[test]
    fn test_code_paragraph_with_indented_blocks() {
        let text = lines("def f(x):\n\n    return x\n\n\nf(1)");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.source, "def f(x):\n\n    return x");
        assert_eq!(read.next, 5);
    }

    #[test]
    fn test_commented_magic_is_code() {
        let text = lines("# %matplotlib inline");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Code);
        assert_eq!(read.cell.source, "%matplotlib inline");
    }

    #[test]
    fn test_markdown_cell_with_marker() {
        let text = lines("# + [markdown] key=\"value\"\n# Some text\n# -");
        let read = light().read(&text).unwrap();
        assert_eq!(read.cell.cell_type, CellType::Markdown);
        assert_eq!(read.cell.source, "Some text");
        assert_eq!(read.cell.metadata.get_str("key"), Some("value"));
    }

    #[test]
    fn test_vim_folding_markers() {
        let fmt = Format::new(".py")
            .with_format_name("light")
            .with_options(crate::FormatOptions::new().with_cell_markers("{{{,}}}"));
        let text = lines("# {{{ A title\nx = 1\n\ny = 2\n# }}}");
        let read = LightReader::new(&fmt, None).unwrap().read(&text).unwrap();
        assert_eq!(read.cell.source, "x = 1\n\ny = 2");
        assert_eq!(read.cell.metadata.get_str("title"), Some("A title"));
        assert_eq!(read.next, 5);
    }

    #[test]
    fn test_ocaml_comment_suffix() {
        let fmt = Format::new(".ml").with_format_name("light");
        let text = lines("(* + key=\"value\" *)\nlet x = 1");
        let read = LightReader::new(&fmt, None).unwrap().read(&text).unwrap();
        assert_eq!(read.cell.source, "let x = 1");
        assert_eq!(read.cell.metadata.get_str("key"), Some("value"));
    }
}
