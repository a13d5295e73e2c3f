//! Cell metadata on marker lines.
//!
//! Light and percent scripts, and Markdown code fences, carry the cell
//! metadata on the line that opens the cell, in one of two syntaxes:
//!
//! - `key=value` pairs, where each value is a JSON (or Python) literal and a
//!   bare identifier is a flag with a `null` value: `tags=["parameters"] .class`
//! - a single JSON object: `{"tags": ["parameters"]}`
//!
//! Either may be preceded by a language (`python`) or, in scripts, by a cell
//! title. Text that cannot be decoded is never an error: it is kept verbatim
//! under [`INCORRECTLY_ENCODED_METADATA`] and written back unchanged.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::cell_metadata::{metadata_to_text, text_to_metadata};
//! use nbtext::Value;
//!
//! let (language, metadata) = text_to_metadata(r#"python tags=["parameters"] .class"#, false);
//! assert_eq!(language, "python");
//! assert_eq!(metadata.get(".class"), Some(&Value::Null));
//!
//! let text = metadata_to_text(Some(&language), &metadata, false);
//! assert_eq!(text, r#"python tags=["parameters"] .class"#);
//! ```

use crate::de::from_relaxed_json;
use crate::languages::is_jupyter_language;
use crate::ser::{metadata_to_json, to_json};
use crate::{Metadata, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// Key under which undecodable metadata text is kept.
pub const INCORRECTLY_ENCODED_METADATA: &str = "incorrectly_encoded_metadata";

/// Formatting keys that only exist to make a text round trip stable.
pub const JUPYTEXT_CELL_METADATA: &[&str] = &[
    "skipline",
    "noskipline",
    "cell_marker",
    "lines_to_next_cell",
    "lines_to_end_of_cell_marker",
];

/// Frequent cell metadata that never enters the text representation.
pub const IGNORE_CELL_METADATA: &[&str] = &[
    "autoscroll",
    "collapsed",
    "scrolled",
    "trusted",
    "execution",
    "ExecuteTime",
];

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z_\.]+[a-zA-Z0-9_\.]*$").unwrap());
static VALID_METADATA_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\.-]+$").unwrap());

/// The outcome of decoding a metadata text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The text was valid JSON or a valid Python literal.
    Parsed(Value),
    /// The text could not be decoded, and is kept verbatim.
    Opaque(String),
}

impl Decoded {
    #[inline]
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Decoded::Opaque(_))
    }

    /// Converts the outcome to cell metadata. Anything but an object is
    /// stored under [`INCORRECTLY_ENCODED_METADATA`].
    #[must_use]
    pub fn into_metadata(self) -> Metadata {
        match self {
            Decoded::Parsed(Value::Object(map)) => map,
            Decoded::Parsed(other) => opaque_metadata(&to_json(&other)),
            Decoded::Opaque(text) => opaque_metadata(&text),
        }
    }
}

fn opaque_metadata(text: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(INCORRECTLY_ENCODED_METADATA.to_string(), Value::from(text));
    metadata
}

/// Decodes a JSON value, or failing that a Python literal.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::{relax_json_loads, Decoded};
/// use nbtext::Value;
///
/// assert_eq!(relax_json_loads("  ['a', True] "), Decoded::Parsed(Value::from(vec![Value::from("a"), Value::from(true)])));
/// assert!(relax_json_loads("{'unterminated").is_opaque());
/// ```
#[must_use]
pub fn relax_json_loads(text: &str) -> Decoded {
    let text = text.trim();
    match from_relaxed_json(text) {
        Ok(value) => Decoded::Parsed(value),
        Err(_) => Decoded::Opaque(text.to_string()),
    }
}

/// Can the key be written as `key=value` on a marker line?
#[inline]
#[must_use]
pub fn is_valid_metadata_key(key: &str) -> bool {
    VALID_METADATA_KEY.is_match(key)
}

fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// Parses `key1=value1 key2=value2 flag`, right to left.
///
/// The value of each key is everything after its `=` sign up to the next
/// key, so values may contain spaces and even `=` signs, provided they
/// decode as literals.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::parse_key_equal_value;
/// use nbtext::Value;
///
/// let metadata = parse_key_equal_value(r#"key="value=5" n=1"#);
/// assert_eq!(metadata.get("key"), Some(&Value::from("value=5")));
/// assert_eq!(metadata.get("n"), Some(&Value::from(1)));
/// ```
#[must_use]
pub fn parse_key_equal_value(text: &str) -> Metadata {
    let text = text.trim();
    if text.is_empty() {
        return Metadata::new();
    }

    let last_space = text.rfind(' ');
    let last_word = last_space.map_or(text, |pos| &text[pos + 1..]);
    if !text.starts_with("--") && is_identifier(last_word) {
        let mut metadata = match last_space {
            Some(pos) if pos > 0 => parse_key_equal_value(&text[..pos]),
            _ => Metadata::new(),
        };
        metadata.insert(last_word.to_string(), Value::Null);
        return metadata;
    }

    let mut end = text.len();
    while let Some(equal) = text[..end].rfind('=') {
        end = equal;
        let prev_whitespace = text[..equal].trim_end().rfind(' ');
        let key = text[prev_whitespace.map_or(0, |pos| pos + 1)..equal].trim();
        if !is_valid_metadata_key(key) {
            continue;
        }
        // a longer expression may still decode
        let value = match from_relaxed_json(&text[equal + 1..]) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let mut metadata = match prev_whitespace {
            Some(pos) if pos > 0 => parse_key_equal_value(&text[..pos]),
            _ => Metadata::new(),
        };
        metadata.insert(key.to_string(), value);
        return metadata;
    }

    opaque_metadata(text)
}

/// Is the option text a JSON object rather than `key=value` pairs?
#[must_use]
pub fn is_json_metadata(text: &str) -> bool {
    match (text.find('{'), text.find('=')) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(brace), Some(equal)) => brace < equal,
    }
}

/// Parses the options of a marker line into a language (or title) and metadata.
///
/// Without `allow_title`, the first word is returned only when it is a
/// known language. With `allow_title`, every word before the first key is
/// part of the title.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::text_to_metadata;
/// use nbtext::Value;
///
/// let (title, metadata) = text_to_metadata("cell title string='value' number=1.0", true);
/// assert_eq!(title, "cell title");
/// assert_eq!(metadata.get("string"), Some(&Value::from("value")));
///
/// let (language, metadata) = text_to_metadata(r#"python{"a": 1}"#, false);
/// assert_eq!(language, "python");
/// assert_eq!(metadata.get("a"), Some(&Value::from(1)));
/// ```
#[must_use]
pub fn text_to_metadata(text: &str, allow_title: bool) -> (String, Metadata) {
    let text = text.trim();
    let equal = text.find('=');
    if let Some(brace) = text.find('{') {
        if equal.map_or(true, |equal| equal > brace) {
            return (
                text[..brace].trim().to_string(),
                relax_json_loads(&text[brace..]).into_metadata(),
            );
        }
    }

    if !allow_title {
        if is_jupyter_language(text) {
            return (text.to_string(), Metadata::new());
        }
        return match text.split_once(' ') {
            Some((language, options)) if is_jupyter_language(language) => {
                (language.to_string(), parse_key_equal_value(options))
            }
            _ => (String::new(), parse_key_equal_value(text)),
        };
    }

    let mut words: Vec<&str> = match equal {
        Some(equal) => {
            let mut words: Vec<&str> = text[..equal].split(' ').collect();
            while words.last().map_or(false, |word| word.is_empty()) {
                words.pop();
            }
            // the key of the first pair
            words.pop();
            words
        }
        None => text.split(' ').collect(),
    };
    while words
        .last()
        .map_or(false, |word| word.trim().is_empty() || word.starts_with('.'))
    {
        words.pop();
    }
    let title = words.join(" ");
    let metadata = parse_key_equal_value(&text[title.len()..]);
    (title, metadata)
}

/// Writes a language (or title) and metadata as marker line options.
///
/// With no `language_or_title`, a plain `title` entry is written first. The
/// formatting keys in [`JUPYTEXT_CELL_METADATA`] are never written.
#[must_use]
pub fn metadata_to_text(language_or_title: Option<&str>, metadata: &Metadata, plain_json: bool) -> String {
    let mut metadata: Metadata = metadata
        .iter()
        .filter(|(key, _)| !JUPYTEXT_CELL_METADATA.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut text = Vec::new();
    match language_or_title {
        Some(language_or_title) => {
            if !language_or_title.is_empty() {
                text.push(language_or_title.to_string());
            }
        }
        None => {
            let plain_title = metadata
                .get_str("title")
                .filter(|title| !title.contains('{') && !title.contains('='))
                .map(str::to_string);
            if let Some(title) = plain_title {
                metadata.shift_remove("title");
                text.push(title);
            }
        }
    }

    if plain_json {
        if !metadata.is_empty() {
            text.push(metadata_to_json(&metadata));
        }
    } else {
        for (key, value) in metadata.iter() {
            if key == INCORRECTLY_ENCODED_METADATA {
                text.push(value.as_str().map_or_else(|| to_json(value), str::to_string));
            } else if value.is_null() {
                text.push(key.clone());
            } else {
                text.push(format!("{}={}", key, to_json(value)));
            }
        }
    }
    text.join(" ")
}

fn value_to_plain_text(value: &Value) -> String {
    value.as_str().map_or_else(|| to_json(value), str::to_string)
}

/// Options for a percent (or light) marker: depth, title, `[cell type]`,
/// then the remaining metadata.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::metadata_to_double_percent_options;
/// use nbtext::metadata;
///
/// let md = metadata!({"title": "Intro", "cell_depth": 1, "cell_type": "markdown", "key": "value"});
/// let text = metadata_to_double_percent_options(md.as_object().unwrap().clone(), false);
/// assert_eq!(text, r#"% Intro [markdown] key="value""#);
/// ```
#[must_use]
pub fn metadata_to_double_percent_options(mut metadata: Metadata, plain_json: bool) -> String {
    let mut text = Vec::new();
    if let Some(title) = metadata.shift_remove("title") {
        text.push(value_to_plain_text(&title));
    }
    if let Some(depth) = metadata.shift_remove("cell_depth") {
        let depth = depth.as_i64().unwrap_or(0).max(0) as usize;
        text.insert(0, "%".repeat(depth));
    }
    let region_name = metadata.shift_remove("region_name");
    if let Some(cell_type) = metadata.shift_remove("cell_type") {
        let name = region_name.unwrap_or(cell_type);
        text.push(format!("[{}]", value_to_plain_text(&name)));
    }
    metadata_to_text(Some(&text.join(" ")), &metadata, plain_json)
}

/// Parses the options of a light or percent marker line.
///
/// Recognizes the `[markdown]`, `[raw]` and `[md]` cell types, the `%`
/// depth prefix of sub-cells and the cell title.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::script_options_to_metadata;
/// use nbtext::Value;
///
/// let metadata = script_options_to_metadata("% Part one [markdown] key=\"value\"");
/// assert_eq!(metadata.get("cell_type"), Some(&Value::from("markdown")));
/// assert_eq!(metadata.get("cell_depth"), Some(&Value::from(1)));
/// assert_eq!(metadata.get("title"), Some(&Value::from("Part one")));
/// ```
#[must_use]
pub fn script_options_to_metadata(options: &str) -> Metadata {
    let (mut title, mut metadata) = text_to_metadata(options, true);

    for cell_type in ["markdown", "raw", "md"] {
        let code = format!("[{}]", cell_type);
        if title.contains(&code) {
            title = title.replace(&code, "").trim().to_string();
            metadata.insert("cell_type".to_string(), Value::from(cell_type));
            if cell_type == "md" {
                metadata.insert("region_name".to_string(), Value::from("md"));
                metadata.insert("cell_type".to_string(), Value::from("markdown"));
            }
            break;
        }
    }

    let depth = title.chars().take_while(|&c| c == '%').count();
    if depth > 0 {
        title = title[depth..].trim().to_string();
        metadata.insert("cell_depth".to_string(), Value::from(depth));
    }

    if !title.is_empty() {
        metadata.insert("title".to_string(), Value::from(title));
    }
    metadata
}

/// Is the cell active (run as code) in a document with extension `ext`?
///
/// - a frozen cell (`run_control.frozen`) is only active in `.ipynb`
/// - an `active-<ext1>-<ext2>` tag lists the extensions where it is active
/// - an `active` entry lists them separated by dots or commas
///
/// Otherwise `default` is returned. This never fails, whatever the metadata.
///
/// # Examples
///
/// ```rust
/// use nbtext::cell_metadata::is_active;
/// use nbtext::metadata;
///
/// let md = metadata!({"active": "ipynb,py"});
/// let md = md.as_object().unwrap();
/// assert!(is_active(".py", md, true));
/// assert!(!is_active(".Rmd", md, true));
///
/// let md = metadata!({"tags": ["active-md-Rmd"]});
/// assert!(is_active(".md", md.as_object().unwrap(), false));
/// ```
#[must_use]
pub fn is_active(ext: &str, metadata: &Metadata, default: bool) -> bool {
    let frozen = metadata
        .get("run_control")
        .and_then(Value::as_object)
        .and_then(|run_control| run_control.get("frozen"))
        .map_or(false, |frozen| matches!(frozen, Value::Bool(true)));
    if frozen {
        return ext == ".ipynb";
    }

    let ext = ext.replace('.', "");
    if let Some(tags) = metadata.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(Value::as_str) {
            if tag.starts_with("active-") {
                return tag.split('-').any(|part| part == ext);
            }
        }
    }

    match metadata.get("active") {
        None => default,
        Some(active) => value_to_plain_text(active)
            .split(|c| c == '.' || c == ',')
            .any(|part| part == ext),
    }
}

/// Does the metadata carry an `active-...` tag?
#[must_use]
pub fn has_active_tag(metadata: &Metadata) -> bool {
    metadata
        .get("tags")
        .and_then(Value::as_array)
        .map_or(false, |tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .any(|tag| tag.starts_with("active-"))
        })
}
