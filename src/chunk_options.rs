//! R Markdown chunk options.
//!
//! A chunk header such as ```` ```{r plot_1, dpi=72, echo=FALSE} ```` carries
//! a language, an optional chunk name and `name=value` options whose values
//! are R expressions. This module splits the options (respecting brackets
//! and quotes), maps the common ones to notebook metadata, and writes them
//! back.
//!
//! - R logicals (`TRUE`, `T`, `FALSE`, `F`) become booleans
//! - literals (`72`, `"fig/"`, `c("a", "b")`, `NULL`) become values
//! - any other expression is kept as a string prefixed with `#R_CODE#`
//!
//! `echo=FALSE`, `results='hide'` and `include=FALSE` are mapped either to
//! the `remove_input`, `remove_output` and `remove_cell` tags, or, with the
//! `use_runtools` option, to `hide_input` and `hide_output`.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::chunk_options::{metadata_to_rmd_options, rmd_options_to_metadata};
//! use nbtext::Value;
//!
//! let (language, metadata) = rmd_options_to_metadata(r#"r plot_1, dpi=72, fig.path="fig_path/""#, false).unwrap();
//! assert_eq!(language, "R");
//! assert_eq!(metadata.get("dpi"), Some(&Value::from(72)));
//!
//! let text = metadata_to_rmd_options(Some(&language), &metadata, false);
//! assert_eq!(text, r#"r plot_1, dpi=72, fig.path="fig_path/""#);
//! ```

use crate::cell_metadata::is_active;
use crate::de::from_literal;
use crate::error::Imbalance;
use crate::ser::to_json;
use crate::{Error, Metadata, Result, Value};
use tracing::trace;

/// Prefix of option values that are R expressions rather than literals.
pub const R_CODE_PREFIX: &str = "#R_CODE#";

/// Bracket and quote state while scanning chunk options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsingContext {
    parentheses: usize,
    curly_brackets: usize,
    square_brackets: usize,
    single_quote: bool,
    double_quote: bool,
}

impl ParsingContext {
    /// Outside of any bracket or quote?
    #[inline]
    #[must_use]
    pub const fn in_global_expression(&self) -> bool {
        self.parentheses == 0
            && self.curly_brackets == 0
            && self.square_brackets == 0
            && !self.single_quote
            && !self.double_quote
    }

    /// Updates the state with one character.
    ///
    /// Brackets inside quotes are not counted, and an escaped quote does not
    /// close its string.
    ///
    /// # Errors
    ///
    /// Returns the [`Imbalance`] for a closing bracket with no opening one.
    pub fn read_char(mut self, ch: char, prev: Option<char>) -> std::result::Result<Self, Imbalance> {
        let escaped = prev == Some('\\');
        if self.single_quote {
            if ch == '\'' && !escaped {
                self.single_quote = false;
            }
            return Ok(self);
        }
        if self.double_quote {
            if ch == '"' && !escaped {
                self.double_quote = false;
            }
            return Ok(self);
        }
        match ch {
            '(' => self.parentheses += 1,
            ')' => {
                self.parentheses = self
                    .parentheses
                    .checked_sub(1)
                    .ok_or(Imbalance::ClosingParenthesis)?;
            }
            '{' => self.curly_brackets += 1,
            '}' => {
                self.curly_brackets = self
                    .curly_brackets
                    .checked_sub(1)
                    .ok_or(Imbalance::ClosingCurlyBracket)?;
            }
            '[' => self.square_brackets += 1,
            ']' => {
                self.square_brackets = self
                    .square_brackets
                    .checked_sub(1)
                    .ok_or(Imbalance::ClosingSquareBracket)?;
            }
            '\'' if !escaped => self.single_quote = true,
            '"' if !escaped => self.double_quote = true,
            _ => {}
        }
        Ok(self)
    }
}

/// Splits chunk options into `(name, value)` pairs.
///
/// Only the first option may come without a name (the chunk name).
///
/// # Errors
///
/// Returns [`Error::ChunkOptions`] on unbalanced brackets or quotes, or on
/// a nameless option after the first one.
///
/// # Examples
///
/// ```rust
/// use nbtext::chunk_options::parse_rmd_options;
///
/// let options = parse_rmd_options(r#"plot_1, fig.cap="a, b", echo=c(1, 2)"#).unwrap();
/// assert_eq!(options[1], ("fig.cap".to_string(), r#""a, b""#.to_string()));
/// assert_eq!(options[2], ("echo".to_string(), "c(1, 2)".to_string()));
///
/// assert!(parse_rmd_options("name, name2").is_err());
/// ```
pub fn parse_rmd_options(line: &str) -> Result<Vec<(String, String)>> {
    let mut context = ParsingContext::default();
    let mut result: Vec<(String, String)> = Vec::new();
    let mut prev = None;
    let mut name = String::new();
    let mut value = String::new();
    let fail = |kind| Error::chunk_options(line, kind);

    for ch in std::iter::once(',').chain(line.chars()).chain(std::iter::once(',')) {
        if context.in_global_expression() && ch == ',' {
            if !name.is_empty() || !value.is_empty() {
                if !result.is_empty() && name.is_empty() {
                    return Err(fail(Imbalance::MissingName));
                }
                result.push((name.trim().to_string(), value.trim().to_string()));
                name.clear();
                value.clear();
            }
        } else if context.in_global_expression() && ch == '=' && name.is_empty() {
            name = std::mem::take(&mut value);
        } else {
            context = context.read_char(ch, prev).map_err(fail)?;
            value.push(ch);
        }
        prev = Some(ch);
    }

    if !context.in_global_expression() {
        return Err(fail(Imbalance::Unterminated));
    }
    Ok(result)
}

fn r_logical(value: &str) -> Option<bool> {
    match value {
        "TRUE" | "T" => Some(true),
        "FALSE" | "F" => Some(false),
        _ => None,
    }
}

fn r_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn is_hide(value: &str) -> bool {
    value == "'hide'" || value == "\"hide\""
}

fn push_tag(metadata: &mut Metadata, tag: &str) {
    if !metadata.get("tags").map_or(false, Value::is_array) {
        metadata.insert("tags".to_string(), Value::Array(Vec::new()));
    }
    if let Some(tags) = metadata.get_mut("tags").and_then(Value::as_array_mut) {
        tags.push(Value::from(tag));
    }
}

/// Maps `echo`, `include` and `results` to notebook metadata. Returns
/// `false` when the option is not one of the mapped forms.
fn update_metadata_from_rmd_options(
    name: &str,
    value: &str,
    metadata: &mut Metadata,
    use_runtools: bool,
) -> bool {
    if use_runtools {
        match (name, r_logical(value)) {
            ("echo", Some(echo)) => {
                metadata.insert("hide_input".to_string(), Value::from(!echo));
                true
            }
            ("include", Some(false)) => {
                metadata.insert("hide_input".to_string(), Value::from(true));
                metadata.insert("hide_output".to_string(), Value::from(true));
                true
            }
            ("results", _) if is_hide(value) => {
                metadata.insert("hide_output".to_string(), Value::from(true));
                true
            }
            _ => false,
        }
    } else {
        let tag = match (name, r_logical(value)) {
            ("echo", Some(false)) => "remove_input",
            ("include", Some(false)) => "remove_cell",
            ("results", _) if is_hide(value) => "remove_output",
            _ => return false,
        };
        push_tag(metadata, tag);
        true
    }
}

/// Evaluates an option value: a literal, an R vector, or opaque R code.
fn try_eval(value: &str) -> Value {
    if value == "NULL" {
        return Value::Null;
    }
    let literal = ["c(", "list("]
        .iter()
        .find_map(|open| value.strip_prefix(open))
        .and_then(|rest| rest.strip_suffix(')'))
        .map_or_else(|| value.to_string(), |items| format!("[{}]", items));
    match from_literal(&literal) {
        Ok(evaluated) => evaluated,
        Err(_) => Value::from(format!("{}{}", R_CODE_PREFIX, value)),
    }
}

/// Parses the content of a chunk header into a language and cell metadata.
///
/// # Errors
///
/// Returns [`Error::ChunkOptions`] when the options are malformed.
///
/// # Examples
///
/// ```rust
/// use nbtext::chunk_options::rmd_options_to_metadata;
/// use nbtext::{metadata, Value};
///
/// let (language, metadata) = rmd_options_to_metadata("python include=FALSE, active=\"Rmd\"", false).unwrap();
/// assert_eq!(language, "python");
/// assert_eq!(Value::Object(metadata), metadata!({"active": "Rmd", "tags": ["remove_cell"]}));
///
/// let (_, metadata) = rmd_options_to_metadata("r include=FALSE", true).unwrap();
/// assert_eq!(Value::Object(metadata), metadata!({"hide_input": true, "hide_output": true}));
/// ```
pub fn rmd_options_to_metadata(options: &str, use_runtools: bool) -> Result<(String, Metadata)> {
    let split = options
        .char_indices()
        .find(|&(_, ch)| ch.is_whitespace() || ch == ',');
    let (language, chunk_options) = match split {
        None => (options, Vec::new()),
        Some((pos, ch)) => {
            let rest = options[pos + ch.len_utf8()..].trim_start_matches([' ', ',']);
            (&options[..pos], parse_rmd_options(rest)?)
        }
    };
    let language = language.trim_end_matches([' ', ',']);
    let language = if language == "r" { "R" } else { language };
    trace!(language, count = chunk_options.len(), "chunk options");

    let mut metadata = Metadata::new();
    for (i, (name, value)) in chunk_options.into_iter().enumerate() {
        if i == 0 && name.is_empty() {
            metadata.insert("name".to_string(), Value::from(value));
            continue;
        }
        if update_metadata_from_rmd_options(&name, &value, &mut metadata, use_runtools) {
            continue;
        }
        let value = if name == "active" {
            Value::from(value.replace(['"', '\''], ""))
        } else if let Some(logical) = r_logical(&value) {
            Value::from(logical)
        } else {
            try_eval(&value)
        };
        metadata.insert(name, value);
    }

    if metadata.contains_key("eval") && !is_active(".Rmd", &metadata, true) {
        metadata.shift_remove("eval");
    }

    Ok((language.to_string(), metadata))
}

fn r_value(value: &Value) -> String {
    match value {
        Value::Bool(b) => r_bool(*b).to_string(),
        Value::Null => "NULL".to_string(),
        Value::String(s) => {
            if let Some(code) = s.strip_prefix(R_CODE_PREFIX) {
                code.to_string()
            } else if s.contains('"') {
                format!("'{}'", s)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(items) => {
            let items: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(_) => r_value(item),
                    other => to_json(other),
                })
                .collect();
            format!("c({})", items.join(", "))
        }
        other => to_json(other),
    }
}

/// Writes a language and cell metadata as chunk options.
///
/// With no language (knitr spin), only the options are returned.
///
/// # Examples
///
/// ```rust
/// use nbtext::chunk_options::metadata_to_rmd_options;
/// use nbtext::metadata;
///
/// let md = metadata!({"name": "chunk_name", "active": "Rmd", "tags": ["remove_cell"]});
/// let text = metadata_to_rmd_options(Some("R"), md.as_object().unwrap(), false);
/// assert_eq!(text, r#"r chunk_name, include=FALSE, active="Rmd""#);
///
/// let md = metadata!({"hide_input": true, "hide_output": true});
/// assert_eq!(metadata_to_rmd_options(None, md.as_object().unwrap(), true), "include=FALSE");
/// ```
#[must_use]
pub fn metadata_to_rmd_options(language: Option<&str>, metadata: &Metadata, use_runtools: bool) -> String {
    let mut metadata = metadata.clone();
    let mut options: Vec<String> = Vec::new();

    if let Some(name) = metadata.shift_remove("name") {
        options.push(name.as_str().map_or_else(|| to_json(&name), str::to_string));
    }

    if use_runtools {
        let hide_input = metadata.get("hide_input").and_then(Value::as_bool);
        let hide_output = metadata.get("hide_output").and_then(Value::as_bool);
        if hide_input == Some(true) && hide_output == Some(true) {
            metadata.shift_remove("hide_input");
            metadata.shift_remove("hide_output");
            options.push("include=FALSE".to_string());
        } else {
            if hide_output == Some(true) {
                metadata.shift_remove("hide_output");
                options.push("results='hide'".to_string());
            }
            if let Some(hide_input) = hide_input {
                metadata.shift_remove("hide_input");
                options.push(format!("echo={}", r_bool(!hide_input)));
            }
        }
    } else if let Some(tags) = metadata.get("tags").and_then(Value::as_array).cloned() {
        let mut kept = Vec::with_capacity(tags.len());
        for tag in tags {
            match tag.as_str() {
                Some("remove_input") => options.push("echo=FALSE".to_string()),
                Some("remove_output") => options.push("results='hide'".to_string()),
                Some("remove_cell") => options.push("include=FALSE".to_string()),
                _ => kept.push(tag),
            }
        }
        if kept.is_empty() {
            metadata.shift_remove("tags");
        } else {
            metadata.insert("tags".to_string(), Value::Array(kept));
        }
    }

    for (name, value) in metadata.iter() {
        let name = name.trim();
        if name == "active" {
            let active = value.as_str().map_or_else(|| to_json(value), str::to_string);
            options.push(format!("{}=\"{}\"", name, active));
        } else {
            options.push(format!("{}={}", name, r_value(value)));
        }
    }

    match language {
        Some(language) if options.is_empty() => language.to_lowercase(),
        Some(language) => format!("{} {}", language.to_lowercase(), options.join(", ")),
        None => options.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn round_trip(options: &str, expected: Value) {
        let (language, metadata) = rmd_options_to_metadata(options, false).unwrap();
        assert_eq!(Value::Object(metadata.clone()), expected);
        assert_eq!(metadata_to_rmd_options(Some(&language), &metadata, false), options);
    }

    #[test]
    fn test_echo_false_is_remove_input() {
        round_trip("r echo=FALSE", metadata!({"tags": ["remove_input"]}));
    }

    #[test]
    fn test_echo_true_is_kept() {
        round_trip("r plot_1, echo=TRUE", metadata!({"name": "plot_1", "echo": true}));
    }

    #[test]
    fn test_r_code_values() {
        round_trip(
            "python echo=if a==5 then TRUE else FALSE",
            metadata!({"echo": "#R_CODE#if a==5 then TRUE else FALSE"}),
        );
        round_trip(
            r#"python noname, tags=c("a", "b", "c"), echo={sum(a+c(1,2))>1}"#,
            metadata!({"name": "noname", "tags": ["a", "b", "c"], "echo": "#R_CODE#{sum(a+c(1,2))>1}"}),
        );
    }

    #[test]
    fn test_active_and_parameters() {
        round_trip(r#"python active="ipynb,py""#, metadata!({"active": "ipynb,py"}));
        round_trip(r#"python tags=c("parameters")"#, metadata!({"tags": ["parameters"]}));
    }

    #[test]
    fn test_results_hide_with_runtools() {
        let (_, metadata) = rmd_options_to_metadata("r results='hide', echo=FALSE", true).unwrap();
        assert_eq!(Value::Object(metadata.clone()), metadata!({"hide_output": true, "hide_input": true}));
        assert_eq!(metadata_to_rmd_options(Some("R"), &metadata, true), "r include=FALSE");
    }

    #[test]
    fn test_eval_dropped_for_inactive_cells() {
        let (_, metadata) = rmd_options_to_metadata(r#"python active="ipynb", eval=FALSE"#, false).unwrap();
        assert_eq!(Value::Object(metadata), metadata!({"active": "ipynb"}));
    }

    #[test]
    fn test_null_and_comma_after_language() {
        let (language, metadata) = rmd_options_to_metadata("r, fig.cap=NULL", false).unwrap();
        assert_eq!(language, "R");
        assert_eq!(Value::Object(metadata.clone()), metadata!({"fig.cap": null}));
        assert_eq!(metadata_to_rmd_options(Some("R"), &metadata, false), "r fig.cap=NULL");
    }

    #[test]
    fn test_imbalances() {
        let kind = |options: &str| match rmd_options_to_metadata(options, false) {
            Err(Error::ChunkOptions { kind, .. }) => Some(kind),
            _ => None,
        };
        assert_eq!(kind("r name, name2"), Some(Imbalance::MissingName));
        assert_eq!(kind("r a={)"), Some(Imbalance::ClosingParenthesis));
        assert_eq!(kind("r a=}"), Some(Imbalance::ClosingCurlyBracket));
        assert_eq!(kind("r b=]"), Some(Imbalance::ClosingSquareBracket));
        assert_eq!(kind("r c=["), Some(Imbalance::Unterminated));
    }

    #[test]
    fn test_brackets_in_quotes_are_ignored() {
        let options = parse_rmd_options(r#"fig.cap="a) b""#).unwrap();
        assert_eq!(options, vec![("fig.cap".to_string(), r#""a) b""#.to_string())]);
    }

    #[test]
    fn test_string_with_double_quotes_uses_single_quotes() {
        let md = metadata!({"fig.cap": "say \"hi\""});
        assert_eq!(
            metadata_to_rmd_options(Some("R"), md.as_object().unwrap(), false),
            r#"r fig.cap='say "hi"'"#
        );
    }
}
