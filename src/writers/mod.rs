//! Cell writers: the inverse of [`crate::readers`].
//!
//! A writer turns one cell into the lines of its text representation. The
//! document driver writes all the cells first, then concatenates them from
//! the last to the first, so that each writer can look at the text of the
//! next cell to drop a redundant end marker and choose the blank lines in
//! between.
//!
//! Writers never guess whether a marker is needed: when the light and
//! Markdown writers consider leaving a cell unmarked, they ask their own
//! reader whether the bare text would be read back as the same cell.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::writers::new_writer;
//! use nbtext::{Cell, Format};
//!
//! let fmt = Format::new(".py").with_format_name("percent");
//! let mut unsupported = Vec::new();
//! let mut writer = new_writer(&Cell::markdown("Some text"), "python", &fmt, &mut unsupported).unwrap();
//! assert_eq!(writer.cell_to_text().unwrap(), vec!["# %% [markdown]", "# Some text"]);
//! ```

mod light;
mod markdown;
mod percent;
mod sphinx;
mod spin;

pub use light::LightWriter;
pub use markdown::MarkdownWriter;
pub use percent::PercentWriter;
pub use sphinx::SphinxWriter;
pub use spin::SpinWriter;

use crate::cell_metadata::{has_active_tag, is_active, IGNORE_CELL_METADATA, JUPYTEXT_CELL_METADATA};
use crate::formats::{get_format_implementation, Dialect};
use crate::languages::{cell_language, comment_lines, script_language};
use crate::magics::comment_magic;
use crate::metadata_filter::{filter_metadata, MetadataFilter};
use crate::{Cell, CellType, Format, Metadata, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// Cell metadata that is never written, as a filter expression.
static IGNORED_CELL_METADATA: Lazy<String> = Lazy::new(|| {
    IGNORE_CELL_METADATA
        .iter()
        .chain(JUPYTEXT_CELL_METADATA)
        .map(|key| format!("-{}", key))
        .collect::<Vec<_>>()
        .join(",")
});

static GO_DOUBLE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^((?://\s*)*)(%%\s*$|%%\s+-.*$)").unwrap());

const TRIPLE_QUOTES: [&str; 2] = ["\"\"\"", "'''"];

/// What every writer knows about the cell it writes.
#[derive(Debug, Clone)]
pub struct WriterState {
    pub fmt: Format,
    pub ext: String,
    pub cell_type: CellType,
    pub source: Vec<String>,
    /// The marker recorded by the reader, e.g. `"""` for a markdown string.
    pub cell_marker: Option<String>,
    /// The filtered cell metadata, plus the options the writer adds.
    pub metadata: Metadata,
    pub language: String,
    pub default_language: String,
    pub comment: String,
    pub comment_suffix: String,
    pub comment_magics: bool,
    pub cell_metadata_json: bool,
    pub use_runtools: bool,
    pub lines_to_next_cell: Option<usize>,
    pub lines_to_end_of_cell_marker: Option<usize>,
}

impl WriterState {
    /// Prepares a cell for writing.
    ///
    /// Keys that cannot be written are dropped from the metadata and added
    /// to `unsupported`. With `parse_cell_language`, a leading cell magic
    /// like `%%bash` sets the cell language.
    pub fn new(
        cell: &Cell,
        default_language: &str,
        fmt: &Format,
        default_comment_magics: bool,
        parse_cell_language: bool,
        unsupported: &mut Vec<String>,
    ) -> Self {
        let ext = fmt.extension.clone();
        let mut source = cell.source_lines();
        let user_filter = MetadataFilter::from_option(fmt.options.cell_metadata_filter.as_deref());
        let mut metadata = filter_metadata(&cell.metadata, &user_filter, &IGNORED_CELL_METADATA, unsupported);

        let mut language = None;
        if parse_cell_language {
            let custom_cell_magics = fmt.options.custom_cell_magics_list();
            if let Some((magic_language, magic_args)) =
                cell_language(&mut source, default_language, &custom_cell_magics)
            {
                if !magic_args.is_empty() {
                    metadata.insert("magic_args".to_string(), Value::from(magic_args));
                }
                language = Some(magic_language);
            }
        }
        let language = language.or_else(|| cell.language.clone());
        if let Some(language) = &language {
            if !ext.ends_with(".Rmd") {
                metadata.insert("language".to_string(), Value::from(language.clone()));
            }
        }
        let language = language
            .or_else(|| cell.metadata.get_str("language").map(str::to_string))
            .unwrap_or_else(|| default_language.to_string());

        let (comment, comment_suffix) = script_language(&ext).map_or(("#", ""), |script| {
            (script.comment, script.comment_suffix)
        });

        if cell.cell_type == CellType::Raw && !metadata.contains_key("active") && !has_active_tag(&metadata) {
            metadata.insert("active".to_string(), Value::from(""));
        }

        let options = &fmt.options;
        WriterState {
            fmt: fmt.clone(),
            ext,
            cell_type: cell.cell_type,
            source,
            cell_marker: cell.layout.cell_marker.clone(),
            metadata,
            language,
            default_language: default_language.to_string(),
            comment: comment.to_string(),
            comment_suffix: comment_suffix.to_string(),
            comment_magics: options.comment_magics.unwrap_or(default_comment_magics),
            cell_metadata_json: options.cell_metadata_json.unwrap_or(false),
            use_runtools: options.use_runtools.unwrap_or(false),
            lines_to_next_cell: cell.layout.lines_to_next_cell,
            lines_to_end_of_cell_marker: cell.layout.lines_to_end_of_cell_marker,
        }
    }

    /// Is this cell written as code? Raw cells are, when they have an
    /// `active` entry or tag.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
            || (self.cell_type == CellType::Raw && self.metadata.contains_key("active"))
            || has_active_tag(&self.metadata)
    }

    /// Should this markdown cell be written as a triple-quoted string?
    #[must_use]
    pub fn use_triple_quotes(&self) -> bool {
        let cell_marker = match &self.cell_marker {
            Some(cell_marker) => cell_marker,
            None => return false,
        };
        if TRIPLE_QUOTES.contains(&cell_marker.as_str()) {
            return true;
        }
        match cell_marker.split_once(',') {
            Some((left, right)) => {
                let quote = head(left, 3);
                quote == tail(right, 3) && TRIPLE_QUOTES.contains(&quote)
            }
            None => false,
        }
    }

    /// Escapes the `%%` commands of the Go kernel.
    pub fn escape_go_magics(&mut self) {
        if self.default_language == "go" && self.language == "go" {
            self.source = self
                .source
                .iter()
                .map(|line| GO_DOUBLE_PERCENT.replace(line, "${1}//gonb:${2}").into_owned())
                .collect();
        }
    }

    /// Comments the source of a text cell, or wraps it in quotes when the
    /// cell marker is a string delimiter.
    #[must_use]
    pub fn markdown_to_text(&self, mut source: Vec<String>) -> Vec<String> {
        let cell_markers = self
            .cell_marker
            .clone()
            .or_else(|| self.fmt.options.cell_markers.clone());
        if let Some(cell_markers) = cell_markers.filter(|markers| !markers.is_empty()) {
            let (mut left, right) = match cell_markers.split_once(',') {
                Some((left, right)) => (left.to_string(), right.to_string()),
                None => {
                    let unprefixed = cell_markers
                        .strip_prefix(|c: char| c == 'r' || c == 'R')
                        .unwrap_or(&cell_markers);
                    (format!("{}\n", cell_markers), format!("\n{}", unprefixed))
                }
            };

            let raw_prefix = left.starts_with(|c: char| c == 'r' || c == 'R');
            let quote = tail(&right, 3);
            let matching = head(&left, 3) == quote || (raw_prefix && left.get(1..4) == Some(quote));
            if matching && TRIPLE_QUOTES.contains(&quote) && !source.is_empty() {
                // a backslash needs a raw string
                if !raw_prefix && self.fmt.name() == "percent" && source.iter().any(|line| line.contains('\\')) {
                    left.insert(0, 'r');
                }
                source[0] = format!("{}{}", left, source[0]);
                if let Some(last) = source.last_mut() {
                    last.push_str(&right);
                }
                return source;
            }
        }

        if !self.comment.is_empty()
            && self.comment != "#'"
            && is_active(&self.ext, &self.metadata, true)
            && !matches!(self.fmt.name(), "percent" | "hydrogen")
        {
            source = comment_magic(
                &source,
                &self.language,
                self.comment_magics,
                self.cell_type == CellType::Code,
            );
        }
        comment_lines(&source, &self.comment, &self.comment_suffix)
    }
}

/// A per-dialect cell writer.
pub trait CellWriter {
    fn state(&mut self) -> &mut WriterState;

    /// The text of a cell written as code.
    fn code_to_text(&mut self) -> Result<Vec<String>>;

    fn is_code(&mut self) -> bool {
        self.state().is_code()
    }

    /// The text representation of the cell.
    fn cell_to_text(&mut self) -> Result<Vec<String>> {
        let state = self.state();
        // a marker is needed to write the cell as a string
        if state.cell_type != CellType::Code && state.metadata.is_empty() && state.use_triple_quotes() {
            let cell_type = Value::from(state.cell_type.as_str());
            state.metadata.insert("cell_type".to_string(), cell_type);
        }
        state.escape_go_magics();

        if self.is_code() {
            return self.code_to_text();
        }
        let state = self.state();
        Ok(state.markdown_to_text(state.source.clone()))
    }

    /// Drops the end marker of the cell when the next cell makes it
    /// redundant. `next_text` is the text of the rest of the document.
    fn remove_eoc_marker(&mut self, text: Vec<String>, _next_text: &[String]) -> Vec<String> {
        text
    }

    /// Blank lines after the cell, when they were recorded by the reader.
    fn lines_to_next_cell(&mut self) -> Option<usize> {
        self.state().lines_to_next_cell
    }
}

/// Creates the writer of the dialect that `fmt` refers to.
///
/// # Errors
///
/// Fails when the format is unknown.
pub fn new_writer(
    cell: &Cell,
    default_language: &str,
    fmt: &Format,
    unsupported: &mut Vec<String>,
) -> Result<Box<dyn CellWriter>> {
    let implementation = get_format_implementation(&fmt.extension, fmt.format_name.as_deref())?;
    let writer: Box<dyn CellWriter> = match implementation.dialect {
        Dialect::Markdown => Box::new(MarkdownWriter::markdown(cell, default_language, fmt, unsupported)),
        Dialect::RMarkdown => Box::new(MarkdownWriter::rmarkdown(cell, default_language, fmt, unsupported)),
        Dialect::Light => Box::new(LightWriter::new(cell, default_language, fmt, true, unsupported)),
        Dialect::NoMarker => Box::new(LightWriter::new(cell, default_language, fmt, false, unsupported)),
        Dialect::Percent => Box::new(PercentWriter::new(cell, default_language, fmt, true, unsupported)),
        Dialect::Hydrogen => Box::new(PercentWriter::new(cell, default_language, fmt, false, unsupported)),
        Dialect::Spin => Box::new(SpinWriter::new(cell, default_language, fmt, unsupported)),
        Dialect::Sphinx => Box::new(SphinxWriter::new(cell, default_language, fmt, unsupported)),
    };
    Ok(writer)
}

/// Enough backticks to fence the given lines in Markdown.
///
/// # Examples
///
/// ```rust
/// use nbtext::writers::three_backticks_or_more;
///
/// let lines = vec!["```python".to_string(), "x = 1".to_string(), "```".to_string()];
/// assert_eq!(three_backticks_or_more(&lines), "````");
/// assert_eq!(three_backticks_or_more(&["x = 1".to_string()]), "```");
/// ```
#[must_use]
pub fn three_backticks_or_more(lines: &[String]) -> String {
    let mut delimiter = "```".to_string();
    for line in lines {
        if !line.starts_with(&delimiter) {
            continue;
        }
        let extra = line[delimiter.len()..].chars().take_while(|&c| c == '`').count();
        delimiter.push_str(&"`".repeat(extra + 1));
    }
    delimiter
}

/// The first `n` bytes of `text`, or the whole text.
fn head(text: &str, n: usize) -> &str {
    text.get(..n).unwrap_or(text)
}

/// The last `n` bytes of `text`, or the whole text.
fn tail(text: &str, n: usize) -> &str {
    text.len()
        .checked_sub(n)
        .and_then(|start| text.get(start..))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn state(cell: &Cell, fmt: &Format) -> WriterState {
        WriterState::new(cell, "python", fmt, true, true, &mut Vec::new())
    }

    #[test]
    fn test_cell_magic_sets_language() {
        let cell = Cell::code("%%bash --out x\nls");
        let state = state(&cell, &Format::new(".py").with_format_name("light"));
        assert_eq!(state.language, "bash");
        assert_eq!(state.source, vec!["ls"]);
        assert_eq!(state.metadata.get_str("language"), Some("bash"));
        assert_eq!(state.metadata.get_str("magic_args"), Some("--out x"));
    }

    #[test]
    fn test_ignored_metadata_is_filtered() {
        let cell = Cell::code("x").with_metadata(metadata!({"collapsed": true, "tags": ["a"]}));
        let state = state(&cell, &Format::new(".py").with_format_name("light"));
        assert!(!state.metadata.contains_key("collapsed"));
        assert!(state.metadata.contains_key("tags"));
    }

    #[test]
    fn test_raw_cells_are_inactive_code() {
        let state = state(&Cell::raw("text"), &Format::new(".py").with_format_name("light"));
        assert_eq!(state.metadata.get_str("active"), Some(""));
        assert!(state.is_code());
    }

    #[test]
    fn test_markdown_to_text_with_triple_quotes() {
        let mut cell = Cell::markdown("Text");
        cell.layout.cell_marker = Some("\"\"\"".to_string());
        let state = state(&cell, &Format::new(".py").with_format_name("percent"));
        assert!(state.use_triple_quotes());
        assert_eq!(state.markdown_to_text(state.source.clone()), vec!["\"\"\"\nText\n\"\"\""]);
    }

    #[test]
    fn test_markdown_to_text_raw_string_for_backslash() {
        let mut cell = Cell::markdown("$\\alpha$");
        cell.layout.cell_marker = Some("\"\"\"".to_string());
        let state = state(&cell, &Format::new(".py").with_format_name("percent"));
        assert_eq!(state.markdown_to_text(state.source.clone()), vec!["r\"\"\"\n$\\alpha$\n\"\"\""]);
    }

    #[test]
    fn test_go_magics_are_escaped() {
        let cell = Cell::code("%%\nfunc main() {}");
        let mut state = WriterState::new(&cell, "go", &Format::new(".go"), true, true, &mut Vec::new());
        state.escape_go_magics();
        assert_eq!(state.source[0], "//gonb:%%");
    }

    #[test]
    fn test_head_and_tail() {
        assert_eq!(head("\"\"\"\n", 3), "\"\"\"");
        assert_eq!(tail("\n'''", 3), "'''");
        assert_eq!(tail("ab", 3), "ab");
    }
}
