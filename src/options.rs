//! Format descriptors and per-format options.
//!
//! This module provides:
//!
//! - [`Format`]: which dialect to read or write (`"py:percent"`, `"md"`, ...)
//! - [`FormatOptions`]: the options that tune a dialect, e.g. custom cell
//!   markers or whether magics are commented
//!
//! Options given by the caller take precedence over the options stored in
//! the notebook header (`jupyter.jupytext`), which in turn take precedence
//! over the dialect defaults.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::{Format, FormatOptions};
//!
//! let fmt: Format = "py:percent".parse().unwrap();
//! assert_eq!(fmt.extension, ".py");
//! assert_eq!(fmt.format_name.as_deref(), Some("percent"));
//!
//! let fmt = Format::new(".py")
//!     .with_format_name("light")
//!     .with_options(FormatOptions::new().with_cell_markers("{{{,}}}"));
//! assert_eq!(fmt.to_string(), "py:light");
//! ```

use crate::{Error, Metadata, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Options that tune how a dialect reads and writes cells.
///
/// Every field is optional: `None` means "use the dialect default, or the
/// value stored in the notebook header". The struct is `Deserialize`, so it
/// can be loaded from a configuration file by the caller.
///
/// # Examples
///
/// ```rust
/// use nbtext::FormatOptions;
///
/// let options = FormatOptions::new()
///     .with_comment_magics(false)
///     .with_cell_metadata_json(true);
/// assert_eq!(options.comment_magics, Some(false));
///
/// let options: FormatOptions = serde_json::from_str(r#"{"split_at_heading": true}"#).unwrap();
/// assert_eq!(options.split_at_heading, Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Comment (or not) magic commands in scripts and markdown code blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_magics: Option<bool>,
    /// Custom light-format markers, `"start,end"`, e.g. `"{{{,}}}"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_markers: Option<String>,
    /// Write cell options as a JSON object rather than `key=value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_metadata_json: Option<bool>,
    /// Start a new markdown cell at every heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_at_heading: Option<bool>,
    /// Map `echo`/`include`/`results` to `hide_input`/`hide_output`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_runtools: Option<bool>,
    /// Comma-separated cell magics that are not languages but should be treated as such.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_cell_magics: Option<String>,
    /// Hide the notebook metadata in an HTML comment (Markdown).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_notebook_metadata: Option<bool>,
    /// Keep non-`jupyter` front matter keys in a leading raw cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_level_metadata_as_raw_cell: Option<bool>,
    /// Filter applied to notebook metadata on write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_metadata_filter: Option<String>,
    /// Filter applied to cell metadata on write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_metadata_filter: Option<String>,
    /// Version of the dialect the text was written with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
}

/// Options that travel in the notebook metadata (`jupytext` section).
const NOTEBOOK_OPTIONS: &[&str] = &[
    "comment_magics",
    "cell_markers",
    "cell_metadata_json",
    "split_at_heading",
    "use_runtools",
    "custom_cell_magics",
    "hide_notebook_metadata",
    "root_level_metadata_as_raw_cell",
    "notebook_metadata_filter",
    "cell_metadata_filter",
];

impl FormatOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_comment_magics(mut self, comment_magics: bool) -> Self {
        self.comment_magics = Some(comment_magics);
        self
    }

    /// Sets custom light-format cell markers, e.g. `"{{{,}}}"` or `"region,endregion"`.
    #[must_use]
    pub fn with_cell_markers(mut self, cell_markers: impl Into<String>) -> Self {
        self.cell_markers = Some(cell_markers.into());
        self
    }

    #[must_use]
    pub fn with_cell_metadata_json(mut self, cell_metadata_json: bool) -> Self {
        self.cell_metadata_json = Some(cell_metadata_json);
        self
    }

    #[must_use]
    pub fn with_split_at_heading(mut self, split_at_heading: bool) -> Self {
        self.split_at_heading = Some(split_at_heading);
        self
    }

    #[must_use]
    pub fn with_use_runtools(mut self, use_runtools: bool) -> Self {
        self.use_runtools = Some(use_runtools);
        self
    }

    #[must_use]
    pub fn with_custom_cell_magics(mut self, magics: impl Into<String>) -> Self {
        self.custom_cell_magics = Some(magics.into());
        self
    }

    #[must_use]
    pub fn with_hide_notebook_metadata(mut self, hide: bool) -> Self {
        self.hide_notebook_metadata = Some(hide);
        self
    }

    #[must_use]
    pub fn with_root_level_metadata_as_raw_cell(mut self, as_raw_cell: bool) -> Self {
        self.root_level_metadata_as_raw_cell = Some(as_raw_cell);
        self
    }

    #[must_use]
    pub fn with_notebook_metadata_filter(mut self, filter: impl Into<String>) -> Self {
        self.notebook_metadata_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_cell_metadata_filter(mut self, filter: impl Into<String>) -> Self {
        self.cell_metadata_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_format_version(mut self, version: impl Into<String>) -> Self {
        self.format_version = Some(version.into());
        self
    }

    /// The custom cell magics as a list.
    #[must_use]
    pub fn custom_cell_magics_list(&self) -> Vec<String> {
        self.custom_cell_magics
            .as_deref()
            .map(|magics| {
                magics
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "comment_magics" => self.comment_magics.map(Value::from),
            "cell_markers" => self.cell_markers.clone().map(Value::from),
            "cell_metadata_json" => self.cell_metadata_json.map(Value::from),
            "split_at_heading" => self.split_at_heading.map(Value::from),
            "use_runtools" => self.use_runtools.map(Value::from),
            "custom_cell_magics" => self.custom_cell_magics.clone().map(Value::from),
            "hide_notebook_metadata" => self.hide_notebook_metadata.map(Value::from),
            "root_level_metadata_as_raw_cell" => {
                self.root_level_metadata_as_raw_cell.map(Value::from)
            }
            "notebook_metadata_filter" => self.notebook_metadata_filter.clone().map(Value::from),
            "cell_metadata_filter" => self.cell_metadata_filter.clone().map(Value::from),
            _ => None,
        }
    }

    /// Sets an option from a metadata value unless it is already set.
    fn set_default(&mut self, name: &str, value: &Value) {
        fn flag(slot: &mut Option<bool>, value: &Value) {
            if slot.is_none() {
                *slot = value.as_bool();
            }
        }
        fn text(slot: &mut Option<String>, value: &Value) {
            if slot.is_none() {
                *slot = value.as_str().map(str::to_string);
            }
        }
        match name {
            "comment_magics" => flag(&mut self.comment_magics, value),
            "cell_markers" => text(&mut self.cell_markers, value),
            "cell_metadata_json" => flag(&mut self.cell_metadata_json, value),
            "split_at_heading" => flag(&mut self.split_at_heading, value),
            "use_runtools" => flag(&mut self.use_runtools, value),
            "custom_cell_magics" => text(&mut self.custom_cell_magics, value),
            "hide_notebook_metadata" => flag(&mut self.hide_notebook_metadata, value),
            "root_level_metadata_as_raw_cell" => {
                flag(&mut self.root_level_metadata_as_raw_cell, value)
            }
            "notebook_metadata_filter" => text(&mut self.notebook_metadata_filter, value),
            "cell_metadata_filter" => text(&mut self.cell_metadata_filter, value),
            _ => {}
        }
    }

    /// Fills unset options from the `jupytext` section of the notebook metadata.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::{metadata, FormatOptions};
    ///
    /// let jupytext = metadata!({"cell_markers": "region,endregion", "comment_magics": true});
    /// let mut options = FormatOptions::new().with_comment_magics(false);
    /// options.merge_from_metadata(jupytext.as_object().unwrap());
    ///
    /// assert_eq!(options.cell_markers.as_deref(), Some("region,endregion"));
    /// assert_eq!(options.comment_magics, Some(false));
    /// ```
    pub fn merge_from_metadata(&mut self, jupytext: &Metadata) {
        for name in NOTEBOOK_OPTIONS {
            if let Some(value) = jupytext.get(name) {
                self.set_default(name, value);
            }
        }
        if self.format_version.is_none() {
            self.format_version = jupytext
                .get("text_representation")
                .and_then(Value::as_object)
                .and_then(|tr| tr.get_str("format_version"))
                .map(str::to_string);
        }
    }

    /// Records the set options into the `jupytext` section of the notebook metadata.
    pub fn write_to_metadata(&self, jupytext: &mut Metadata) {
        for name in NOTEBOOK_OPTIONS {
            if let Some(value) = self.get(name) {
                jupytext.insert((*name).to_string(), value);
            }
        }
    }
}

/// Identifies a text dialect: an extension, an optional format name, and options.
///
/// The extension keeps its leading dot (`".py"`, `".Rmd"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_name: Option<String>,
    #[serde(default)]
    pub options: FormatOptions,
}

impl Format {
    /// Creates a format for an extension, with or without the leading dot.
    #[must_use]
    pub fn new(extension: &str) -> Self {
        Format {
            extension: normalize_extension(extension),
            format_name: None,
            options: FormatOptions::default(),
        }
    }

    #[must_use]
    pub fn with_format_name(mut self, format_name: impl Into<String>) -> Self {
        self.format_name = Some(format_name.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the format name, or `""` when none was given.
    #[must_use]
    pub fn name(&self) -> &str {
        self.format_name.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ext = self.extension.trim_start_matches('.');
        match &self.format_name {
            Some(name) if !name.is_empty() => write!(f, "{}:{}", ext, name),
            _ => f.write_str(ext),
        }
    }
}

/// Maps the long names some users write to their extension.
fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.');
    let ext = match ext.to_lowercase().as_str() {
        "markdown" => "md",
        "rmarkdown" => "Rmd",
        "c++" => "cpp",
        _ => ext,
    };
    format!(".{}", ext)
}

impl FromStr for Format {
    type Err = Error;

    /// Parses `"ext"` or `"ext:format_name"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::Format;
    ///
    /// let fmt: Format = "rmarkdown".parse().unwrap();
    /// assert_eq!(fmt.extension, ".Rmd");
    ///
    /// let fmt: Format = ".R:spin".parse().unwrap();
    /// assert_eq!((fmt.extension.as_str(), fmt.name()), (".R", "spin"));
    ///
    /// assert!("".parse::<Format>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let (ext, name) = match s.trim().split_once(':') {
            Some((ext, name)) => (ext, Some(name.trim())),
            None => (s.trim(), None),
        };
        if ext.trim_start_matches('.').is_empty() {
            return Err(Error::InvalidFormat(s.to_string()));
        }
        let mut format = Format::new(ext);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            format.format_name = Some(name.to_string());
        }
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    #[test]
    fn test_parse_formats() {
        let fmt: Format = "md".parse().unwrap();
        assert_eq!(fmt.extension, ".md");
        assert_eq!(fmt.format_name, None);

        let fmt: Format = "markdown".parse().unwrap();
        assert_eq!(fmt.extension, ".md");

        let fmt: Format = "py:percent".parse().unwrap();
        assert_eq!(fmt.to_string(), "py:percent");
    }

    #[test]
    fn test_options_round_trip_through_metadata() {
        let options = FormatOptions::new()
            .with_cell_markers("{{{,}}}")
            .with_use_runtools(true);
        let mut jupytext = Metadata::new();
        options.write_to_metadata(&mut jupytext);
        assert_eq!(
            Value::Object(jupytext.clone()),
            metadata!({"cell_markers": "{{{,}}}", "use_runtools": true})
        );

        let mut back = FormatOptions::new();
        back.merge_from_metadata(&jupytext);
        assert_eq!(back, options);
    }

    #[test]
    fn test_custom_cell_magics_list() {
        let options = FormatOptions::new().with_custom_cell_magics("kql, sparksql");
        assert_eq!(options.custom_cell_magics_list(), vec!["kql", "sparksql"]);
    }

    #[test]
    fn test_format_version_from_text_representation() {
        let jupytext = metadata!({"text_representation": {"extension": ".md", "format_version": "1.1"}});
        let mut options = FormatOptions::new();
        options.merge_from_metadata(jupytext.as_object().unwrap());
        assert_eq!(options.format_version.as_deref(), Some("1.1"));
    }
}
