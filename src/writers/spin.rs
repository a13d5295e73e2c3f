//! The knitr spin writer.

use super::{CellWriter, WriterState};
use crate::cell_metadata::is_active;
use crate::chunk_options::metadata_to_rmd_options;
use crate::magics::{comment_magic, escape_code_start};
use crate::{Cell, Format, Result, Value};

/// Writes R scripts for knitr spin: `#'` markdown, `#+` chunk options.
#[derive(Debug, Clone)]
pub struct SpinWriter {
    state: WriterState,
}

impl SpinWriter {
    #[must_use]
    pub fn new(cell: &Cell, default_language: &str, fmt: &Format, unsupported: &mut Vec<String>) -> Self {
        let mut state = WriterState::new(cell, default_language, fmt, true, true, unsupported);
        state.comment = "#'".to_string();
        SpinWriter { state }
    }
}

impl CellWriter for SpinWriter {
    fn state(&mut self) -> &mut WriterState {
        &mut self.state
    }

    fn code_to_text(&mut self) -> Result<Vec<String>> {
        let state = &mut self.state;
        let active = is_active(&state.ext, &state.metadata, true);
        let mut source = escape_code_start(&state.source, &state.ext, &state.language);

        if active {
            source = comment_magic(&source, &state.language, state.comment_magics, true);
        } else {
            source = source
                .into_iter()
                .map(|line| if line.is_empty() { "#".to_string() } else { format!("# {}", line) })
                .collect();
            state.metadata.insert("eval".to_string(), Value::Bool(false));
        }

        let options = metadata_to_rmd_options(None, &state.metadata, state.use_runtools);
        let mut lines = Vec::with_capacity(source.len() + 1);
        if !options.is_empty() {
            lines.push(format!("#+ {}", options));
        }
        lines.extend(source);
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;
    use pretty_assertions::assert_eq;

    fn write(cell: &Cell) -> Vec<String> {
        let fmt = Format::new(".R").with_format_name("spin");
        SpinWriter::new(cell, "R", &fmt, &mut Vec::new()).cell_to_text().unwrap()
    }

    #[test]
    fn test_write_markdown() {
        assert_eq!(write(&Cell::markdown("# Title\n\nText")), vec!["#' # Title", "#'", "#' Text"]);
    }

    #[test]
    fn test_write_code_with_options() {
        let cell = Cell::code("plot(1)").with_metadata(metadata!({"tags": ["remove_input"]}));
        assert_eq!(write(&cell), vec!["#+ echo=FALSE", "plot(1)"]);
    }

    #[test]
    fn test_write_inactive_cell() {
        let cell = Cell::code("x <- 1").with_metadata(metadata!({"active": "ipynb"}));
        assert_eq!(write(&cell), vec!["#+ active=\"ipynb\", eval=FALSE", "# x <- 1"]);
    }
}
