//! The Markdown and R Markdown writers.

use super::{three_backticks_or_more, CellWriter, WriterState};
use crate::cell_metadata::{is_active, metadata_to_text};
use crate::chunk_options::metadata_to_rmd_options;
use crate::magics::comment_magic;
use crate::readers::{CellReader, MarkdownReader};
use crate::{Cell, CellType, Format, Metadata, Result, Value};

/// Writes cells as fenced code blocks and plain Markdown text.
#[derive(Debug, Clone)]
pub struct MarkdownWriter {
    state: WriterState,
    rmarkdown: bool,
}

impl MarkdownWriter {
    #[must_use]
    pub fn markdown(cell: &Cell, default_language: &str, fmt: &Format, unsupported: &mut Vec<String>) -> Self {
        let mut state = WriterState::new(cell, default_language, fmt, false, true, unsupported);
        state.comment = String::new();
        MarkdownWriter {
            state,
            rmarkdown: false,
        }
    }

    #[must_use]
    pub fn rmarkdown(cell: &Cell, default_language: &str, fmt: &Format, unsupported: &mut Vec<String>) -> Self {
        let mut state = WriterState::new(cell, default_language, fmt, true, true, unsupported);
        state.ext = ".Rmd".to_string();
        state.comment = String::new();
        MarkdownWriter { state, rmarkdown: true }
    }

    /// Would the bare text be read back as a single cell of the same type?
    fn reads_back_as_one_cell(&self) -> Result<bool> {
        let fmt = &self.state.fmt;
        let read = if self.rmarkdown {
            MarkdownReader::rmarkdown(fmt, None).read(&self.state.source)?
        } else {
            MarkdownReader::markdown(fmt, None).read(&self.state.source)?
        };
        Ok(read.next >= self.state.source.len() && read.cell.cell_type == self.state.cell_type)
    }

    /// Protects a markdown or raw cell with HTML comments.
    fn html_comment(&self, metadata: &Metadata, code: &str) -> Vec<String> {
        let region_start = if metadata.is_empty() {
            format!("<!-- #{} -->", code)
        } else {
            format!(
                "<!-- #{} {} -->",
                code,
                metadata_to_text(None, metadata, self.state.cell_metadata_json)
            )
        };
        let mut lines = Vec::with_capacity(self.state.source.len() + 2);
        lines.push(region_start);
        lines.extend(self.state.source.iter().cloned());
        lines.push(format!("<!-- #end{} -->", code));
        lines
    }

    fn fenced_code_to_text(&mut self) -> Vec<String> {
        let state = &mut self.state;
        let source = comment_magic(&state.source, &state.language, state.comment_magics, true);

        if state.metadata.get("active") == Some(&Value::from("")) {
            state.metadata.shift_remove("active");
        }
        if let Some(Value::String(language)) = state.metadata.shift_remove("language") {
            state.language = language;
        }
        if state.cell_type == CellType::Raw && !is_active(&state.ext, &state.metadata, false) {
            let metadata = state.metadata.clone();
            return self.html_comment(&metadata, "raw");
        }

        let options = metadata_to_text(Some(&state.language), &state.metadata, false);
        let delimiter = three_backticks_or_more(&state.source);
        let mut lines = Vec::with_capacity(source.len() + 2);
        lines.push(format!("{}{}", delimiter, options));
        lines.extend(source);
        lines.push(delimiter);
        lines
    }

    fn chunk_to_text(&mut self) -> Vec<String> {
        let state = &mut self.state;
        let active = is_active(&state.ext, &state.metadata, true);
        let source = if active {
            comment_magic(&state.source, &state.language, state.comment_magics, true)
        } else {
            state.source.clone()
        };
        if !active {
            state.metadata.insert("eval".to_string(), Value::Bool(false));
        }
        let options = metadata_to_rmd_options(Some(&state.language), &state.metadata, state.use_runtools);

        let mut lines = Vec::with_capacity(source.len() + 2);
        lines.push(format!("```{{{}}}", options));
        lines.extend(source);
        lines.push("```".to_string());
        lines
    }
}

impl CellWriter for MarkdownWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }

    fn cell_to_text(&mut self) -> Result<Vec<String>> {
        if self.state.cell_type != CellType::Markdown {
            return self.code_to_text();
        }
        let protect = !self.state.metadata.is_empty() || !self.reads_back_as_one_cell()?;
        if !protect {
            return Ok(self.state.source.clone());
        }
        let region_name = match self.state.metadata.shift_remove("region_name") {
            Some(Value::String(name)) => name,
            _ => "region".to_string(),
        };
        let metadata = self.state.metadata.clone();
        Ok(self.html_comment(&metadata, &region_name))
    }

    fn code_to_text(&mut self) -> Result<Vec<String>> {
        Ok(if self.rmarkdown {
            self.chunk_to_text()
        } else {
            self.fenced_code_to_text()
        })
    }
}
