//! The percent and hydrogen script writers.

use super::{CellWriter, WriterState};
use crate::cell_metadata::{is_active, metadata_to_double_percent_options};
use crate::languages::{comment_lines, same_language};
use crate::magics::comment_magic;
use crate::{Cell, CellType, Format, Result, Value};

/// Writes `# %%` cells. Hydrogen scripts keep their magics uncommented, and
/// their cell magics in the cell.
#[derive(Debug, Clone)]
pub struct PercentWriter {
    state: WriterState,
}

impl PercentWriter {
    /// `default_comment_magics` is off for hydrogen scripts, which also keep
    /// `%%lang` cell magics in the source.
    #[must_use]
    pub fn new(
        cell: &Cell,
        default_language: &str,
        fmt: &Format,
        default_comment_magics: bool,
        unsupported: &mut Vec<String>,
    ) -> Self {
        let state = WriterState::new(
            cell,
            default_language,
            fmt,
            default_comment_magics,
            default_comment_magics,
            unsupported,
        );
        PercentWriter { state }
    }
}

impl CellWriter for PercentWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }

    fn cell_to_text(&mut self) -> Result<Vec<String>> {
        let state = &mut self.state;
        state.escape_go_magics();

        let active = is_active(
            &state.ext,
            &state.metadata,
            same_language(&state.language, &state.default_language),
        );
        if state.cell_type == CellType::Raw && state.metadata.get("active") == Some(&Value::from("")) {
            state.metadata.shift_remove("active");
        }

        let is_code = state.is_code();
        if !is_code {
            let cell_type = Value::from(state.cell_type.as_str());
            state.metadata.insert("cell_type".to_string(), cell_type);
        }

        let options = metadata_to_double_percent_options(state.metadata.clone(), state.cell_metadata_json);
        let mut indent = "";
        if is_code && active {
            if let Some(first_line) = state.source.first().filter(|line| !line.trim().is_empty()) {
                indent = &first_line[..first_line.len() - first_line.trim_start().len()];
            }
        }
        let marker = if options.is_empty() || options.starts_with('%') {
            format!("%%{}", options)
        } else {
            format!("%% {}", options)
        };
        let mut lines = comment_lines(
            &[marker],
            &format!("{}{}", indent, state.comment),
            &state.comment_suffix,
        );

        if is_code && active {
            let source = self.code_to_text()?;
            if source != [String::new()] {
                lines.extend(source);
            }
            return Ok(lines);
        }
        lines.extend(self.state.markdown_to_text(self.state.source.clone()));
        Ok(lines)
    }

    fn code_to_text(&mut self) -> Result<Vec<String>> {
        let state = &self.state;
        Ok(comment_magic(&state.source, &state.language, state.comment_magics, true))
    }
}
