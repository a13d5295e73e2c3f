//! The light and nomarker script writers.

use super::{CellWriter, WriterState};
use crate::cell_metadata::{is_active, metadata_to_double_percent_options};
use crate::languages::same_language;
use crate::magics::{comment_magic, escape_code_start, need_explicit_marker};
use crate::pep8::pep8_lines_between_cells;
use crate::readers::{CellReader, LightReader};
use crate::{Cell, CellType, Error, Format, Result, Value};
use regex::Regex;
use tracing::warn;

/// Writes cells as light scripts; without cell markers, as nomarker scripts.
#[derive(Debug, Clone)]
pub struct LightWriter {
    state: WriterState,
    use_cell_markers: bool,
    cell_marker_start: Option<String>,
    cell_marker_end: Option<String>,
}

impl LightWriter {
    #[must_use]
    pub fn new(
        cell: &Cell,
        default_language: &str,
        fmt: &Format,
        use_cell_markers: bool,
        unsupported: &mut Vec<String>,
    ) -> Self {
        let mut state = WriterState::new(cell, default_language, fmt, true, true, unsupported);
        let mut cell_marker_start = None;
        let mut cell_marker_end = None;
        if let Some(cell_markers) = state.fmt.options.cell_markers.clone() {
            match cell_markers.split_once(',') {
                None => {
                    warn!(
                        cell_markers = %cell_markers,
                        "ignored cell markers, as they do not match the expected 'start,end' pattern"
                    );
                    state.fmt.options.cell_markers = None;
                }
                Some((start, end)) if cell_markers != "+,-" => {
                    cell_marker_start = Some(start.to_string());
                    cell_marker_end = Some(end.to_string());
                }
                Some(_) => {}
            }
        }
        LightWriter {
            state,
            use_cell_markers,
            cell_marker_start,
            cell_marker_end,
        }
    }

    /// Does the cell need an explicit start marker to be read back as one cell?
    fn explicit_start_marker(&self, source: &[String]) -> Result<bool> {
        if !self.use_cell_markers {
            return Ok(false);
        }
        if !self.state.metadata.is_empty() {
            return Ok(true);
        }
        let comment = regex::escape(&self.state.comment);
        if let (Some(start), Some(end), Some(first)) = (&self.cell_marker_start, &self.cell_marker_end, source.first())
        {
            let start_code_re =
                Regex::new(&format!(r"^{}\s*{}\s*(.*)$", comment, regex::escape(start))).map_err(Error::custom)?;
            let end_code_re =
                Regex::new(&format!(r"^{}\s*{}\s*$", comment, regex::escape(end))).map_err(Error::custom)?;
            if start_code_re.is_match(first) || end_code_re.is_match(first) {
                return Ok(false);
            }
        }

        if self
            .state
            .source
            .iter()
            .all(|line| line.starts_with(&self.state.comment))
        {
            return Ok(true);
        }
        let read = LightReader::new(&self.state.fmt, None)?.read(source)?;
        Ok(read.next < source.len())
    }
}

/// The shortest end marker (`-`, `--`...) that no line of the source looks like.
fn endofcell_marker(source: &[String], comment: &str) -> String {
    let mut endofcell = "-".to_string();
    loop {
        let taken = source.iter().any(|line| {
            line.strip_prefix(comment)
                .and_then(|rest| rest.strip_prefix(' '))
                .and_then(|rest| rest.strip_prefix(endofcell.as_str()))
                .map_or(false, |rest| rest.trim().is_empty())
        });
        if !taken {
            return endofcell;
        }
        endofcell.push('-');
    }
}

impl CellWriter for LightWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }

    /// Markdown cells with metadata are written as code cells with a
    /// `[markdown]` marker.
    fn is_code(&mut self) -> bool {
        let state = &mut self.state;
        if (state.cell_type == CellType::Markdown && !state.metadata.is_empty()) || state.use_triple_quotes() {
            if is_active(&state.ext, &state.metadata, true) {
                let cell_type = Value::from(state.cell_type.as_str());
                state.metadata.insert("cell_type".to_string(), cell_type);
                state.source = state.markdown_to_text(state.source.clone());
                state.cell_type = CellType::Code;
                state.cell_marker = None;
            }
            return true;
        }
        state.is_code()
    }

    fn code_to_text(&mut self) -> Result<Vec<String>> {
        let state = &mut self.state;
        let active = is_active(
            &state.ext,
            &state.metadata,
            same_language(&state.language, &state.default_language),
        );
        let mut source = escape_code_start(&state.source, &state.ext, &state.language);
        let comment_questions = state
            .metadata
            .shift_remove("comment_questions")
            .and_then(|value| value.as_bool())
            .unwrap_or(true);

        if active {
            source = comment_magic(&source, &state.language, state.comment_magics, comment_questions);
        } else {
            source = state.markdown_to_text(source);
        }

        let needs_marker = active
            && comment_questions
            && need_explicit_marker(&self.state.source, &self.state.language, self.state.comment_magics);
        let mut endofcell = None;
        if needs_marker || self.explicit_start_marker(&source)? {
            let marker = self
                .cell_marker_end
                .clone()
                .unwrap_or_else(|| endofcell_marker(&source, &self.state.comment));
            endofcell = Some(marker);
        }

        let endofcell = match endofcell {
            Some(endofcell) if self.use_cell_markers => endofcell,
            _ => return Ok(source),
        };

        let state = &mut self.state;
        if endofcell != "-" && self.cell_marker_end.is_none() {
            state
                .metadata
                .insert("endofcell".to_string(), Value::from(endofcell.clone()));
        }
        let mut cell_start = vec![
            state.comment.clone(),
            self.cell_marker_start.clone().unwrap_or_else(|| "+".to_string()),
        ];
        let options = metadata_to_double_percent_options(state.metadata.clone(), state.cell_metadata_json);
        if !options.is_empty() {
            cell_start.push(options);
        }

        let mut lines = Vec::with_capacity(source.len() + 2);
        lines.push(cell_start.join(" "));
        lines.extend(source);
        lines.push(format!("{} {}", state.comment, endofcell));
        Ok(lines)
    }

    fn remove_eoc_marker(&mut self, mut text: Vec<String>, next_text: &[String]) -> Vec<String> {
        if self.cell_marker_start.is_some() {
            return text;
        }
        let default_end = format!("{} -", self.state.comment);
        if !self.is_code() || text.last() != Some(&default_end) {
            return text;
        }

        let state = &mut self.state;
        let next_starts_with_marker = next_text
            .first()
            .map_or(true, |line| line.starts_with(&format!("{} +", state.comment)));
        if next_starts_with_marker {
            // the next marker ends this cell
            text.pop();
            if let Some(blank_lines) = state.lines_to_end_of_cell_marker.filter(|&n| n > 0) {
                if state.lines_to_next_cell.map_or(true, |n| blank_lines > n) {
                    state.lines_to_next_cell = Some(blank_lines);
                }
            }
            return text;
        }

        let end_marker = text.pop().unwrap_or(default_end);
        let blank_lines = state.lines_to_end_of_cell_marker.unwrap_or_else(|| {
            // two blank lines when PEP8 requires them
            if pep8_lines_between_cells(&text, next_text, &state.ext) < 2 {
                0
            } else {
                2
            }
        });
        text.extend(std::iter::repeat(String::new()).take(blank_lines));
        text.push(end_marker);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use pretty_assertions::assert_eq;

    fn write(cell: &Cell) -> Vec<String> {
        let fmt = Format::new(".py").with_format_name("light");
        LightWriter::new(cell, "python", &fmt, true, &mut Vec::new())
            .cell_to_text()
            .unwrap()
    }

    #[test]
    fn test_write_code_and_markdown() {
        assert_eq!(write(&Cell::code("a = 1")), vec!["a = 1"]);
        assert_eq!(write(&Cell::markdown("This is a markdown cell")), vec!["# This is a markdown cell"]);
    }

    #[test]
    fn test_code_with_blank_line_needs_markers() {
        assert_eq!(write(&Cell::code("a = 1\n\nb = 2")), vec!["# +", "a = 1", "", "b = 2", "# -"]);
    }

    #[test]
    fn test_end_marker_escalation() {
        let cell = Cell::code("# -\n\nx = 1");
        assert_eq!(
            write(&cell),
            vec!["# + endofcell=\"--\"", "# -", "", "x = 1", "# --"]
        );
    }

    #[test]
    fn test_commented_code_needs_markers() {
        assert_eq!(write(&Cell::code("# x = 1")), vec!["# +", "# x = 1", "# -"]);
    }

    #[test]
    fn test_metadata_on_marker_line() {
        let cell = Cell::code("a = 1").with_metadata(metadata!({"tags": ["parameters"]}));
        assert_eq!(write(&cell), vec!["# + tags=[\"parameters\"]", "a = 1", "# -"]);
    }

    #[test]
    fn test_markdown_with_metadata() {
        let cell = Cell::markdown("Text").with_metadata(metadata!({"key": "value"}));
        assert_eq!(write(&cell), vec!["# + [markdown] key=\"value\"", "# Text", "# -"]);
    }

    #[test]
    fn test_magic_is_commented() {
        assert_eq!(write(&Cell::code("%matplotlib inline")), vec!["# %matplotlib inline"]);
    }

    #[test]
    fn test_nomarker_never_writes_markers() {
        let fmt = Format::new(".py").with_format_name("nomarker");
        let lines = LightWriter::new(&Cell::code("a = 1\n\nb = 2"), "python", &fmt, false, &mut Vec::new())
            .cell_to_text()
            .unwrap();
        assert_eq!(lines, vec!["a = 1", "", "b = 2"]);
    }

    #[test]
    fn test_remove_eoc_marker_before_next_marker() {
        let fmt = Format::new(".py").with_format_name("light");
        let mut writer = LightWriter::new(&Cell::code("a = 1\n\nb = 2"), "python", &fmt, true, &mut Vec::new());
        let text = writer.cell_to_text().unwrap();
        let next = vec!["# +".to_string(), "c = 3".to_string()];
        assert_eq!(writer.remove_eoc_marker(text.clone(), &next), vec!["# +", "a = 1", "", "b = 2"]);
        assert_eq!(writer.remove_eoc_marker(text.clone(), &["c = 3".to_string()]), text);
    }

    #[test]
    fn test_endofcell_marker() {
        let source = vec!["# -".to_string(), "# --".to_string()];
        assert_eq!(endofcell_marker(&source, "#"), "---");
        assert_eq!(endofcell_marker(&["x".to_string()], "#"), "-");
    }
}
