//! Notebook and cell metadata filters.
//!
//! A filter is written as a comma-separated list of keys, e.g.
//! `"-all,kernelspec,jupytext"` or `"-ExecuteTime,-autoscroll"`. A `+` (or
//! no sign) adds a key to the kept keys, a `-` excludes it, and `all`
//! stands for every key. Keys may address a second level with a dot:
//! `"jupytext.text_representation"`.
//!
//! Each filter is combined with a default: the notebook default keeps only a
//! few entries (jupytext, kernelspec, ...), while the cell default keeps
//! everything but a few execution details.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::metadata_filter::{filter_metadata, MetadataFilter};
//! use nbtext::metadata;
//!
//! let md = metadata!({"tags": ["a"], "ExecuteTime": {}, "custom": 1});
//! let user: MetadataFilter = "-custom".parse().unwrap();
//! let mut unsupported = Vec::new();
//! let filtered = filter_metadata(md.as_object().unwrap(), &user, "-ExecuteTime", &mut unsupported);
//! assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["tags"]);
//! ```

use crate::cell_metadata::{is_valid_metadata_key, JUPYTEXT_CELL_METADATA};
use crate::{Error, Metadata, Value};
use std::fmt;
use std::str::FromStr;

/// Notebook metadata kept by default in the text header.
pub const DEFAULT_NOTEBOOK_METADATA: &str = "jupytext,kernelspec,kernel_info,orphan,tocdepth";

/// Either every key, or a list of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySet {
    All,
    Keys(Vec<String>),
}

impl Default for KeySet {
    fn default() -> Self {
        KeySet::Keys(Vec::new())
    }
}

impl KeySet {
    #[inline]
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, KeySet::All)
    }

    fn is_empty(&self) -> bool {
        matches!(self, KeySet::Keys(keys) if keys.is_empty())
    }

    fn keys(&self) -> &[String] {
        match self {
            KeySet::All => &[],
            KeySet::Keys(keys) => keys,
        }
    }

    fn from_keys(keys: Vec<String>) -> Self {
        if keys.iter().any(|key| key == "all") {
            KeySet::All
        } else {
            KeySet::Keys(keys.into_iter().filter(|key| !key.is_empty()).collect())
        }
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s == "all" => KeySet::All,
            Value::Array(items) => {
                KeySet::from_keys(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            }
            _ => KeySet::default(),
        }
    }
}

/// A metadata filter: the additional (kept) and excluded keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub additional: KeySet,
    pub excluded: KeySet,
}

impl MetadataFilter {
    /// Keeps everything.
    #[must_use]
    pub fn all() -> Self {
        MetadataFilter {
            additional: KeySet::All,
            excluded: KeySet::default(),
        }
    }

    /// Keeps nothing.
    #[must_use]
    pub fn none() -> Self {
        MetadataFilter {
            additional: KeySet::default(),
            excluded: KeySet::All,
        }
    }

    /// Reads a filter stored in notebook metadata: a string, a boolean, or
    /// an object with `additional` and `excluded` entries.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => MetadataFilter::all(),
            Value::Bool(false) => MetadataFilter::none(),
            Value::String(text) => parse_filter(text),
            Value::Object(map) => MetadataFilter {
                additional: map.get("additional").map(KeySet::from_value).unwrap_or_default(),
                excluded: map.get("excluded").map(KeySet::from_value).unwrap_or_default(),
            },
            _ => MetadataFilter::default(),
        }
    }

    /// Parses an optional filter expression; `None` is the empty filter.
    #[must_use]
    pub fn from_option(text: Option<&str>) -> Self {
        text.map(parse_filter).unwrap_or_default()
    }
}

fn parse_filter(text: &str) -> MetadataFilter {
    let mut additional = Vec::new();
    let mut excluded = Vec::new();
    for key in text.split(',') {
        let key = key.trim();
        if let Some(key) = key.strip_prefix('-') {
            excluded.push(key.trim().to_string());
        } else if let Some(key) = key.strip_prefix('+') {
            additional.push(key.trim().to_string());
        } else {
            additional.push(key.to_string());
        }
    }
    MetadataFilter {
        additional: KeySet::from_keys(additional),
        excluded: KeySet::from_keys(excluded),
    }
}

impl FromStr for MetadataFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_filter(s))
    }
}

impl fmt::Display for MetadataFilter {
    /// Writes the filter back as a string. Formatting keys are never listed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = match &self.additional {
            KeySet::All => vec!["all".to_string()],
            KeySet::Keys(keys) => keys
                .iter()
                .filter(|key| !JUPYTEXT_CELL_METADATA.contains(&key.as_str()))
                .cloned()
                .collect(),
        };
        match &self.excluded {
            KeySet::All => entries.push("-all".to_string()),
            KeySet::Keys(keys) => entries.extend(keys.iter().map(|key| format!("-{}", key))),
        }
        f.write_str(&entries.join(","))
    }
}

/// Records the metadata filters that reproduce the current text.
///
/// A text without notebook metadata gets filters that keep it that way: no
/// notebook metadata, and only the cell metadata keys seen in the text.
/// Otherwise the keys in use are added to the existing filters.
pub fn update_metadata_filters(metadata: &mut Metadata, has_jupyter_md: bool, cell_keys: &[String]) {
    if !has_jupyter_md {
        let jupytext = metadata.object_entry("jupytext");
        jupytext.insert("notebook_metadata_filter".to_string(), Value::from("-all"));
        if !jupytext.contains_key("cell_metadata_filter") {
            let filter = MetadataFilter {
                additional: KeySet::Keys(cell_keys.to_vec()),
                excluded: KeySet::All,
            };
            jupytext.insert("cell_metadata_filter".to_string(), Value::from(filter.to_string()));
        }
        return;
    }

    let existing = metadata
        .get("jupytext")
        .and_then(Value::as_object)
        .and_then(|jupytext| jupytext.get("cell_metadata_filter"))
        .map(MetadataFilter::from_value);
    if let Some(mut filter) = existing {
        if let KeySet::Keys(excluded) = &mut filter.excluded {
            excluded.retain(|key| !cell_keys.contains(key));
        }
        if let KeySet::Keys(additional) = &mut filter.additional {
            for key in cell_keys {
                if !additional.contains(key) {
                    additional.push(key.clone());
                }
            }
        }
        metadata
            .object_entry("jupytext")
            .insert("cell_metadata_filter".to_string(), Value::from(filter.to_string()));
        return;
    }

    let mut notebook_filter: Vec<String> = metadata
        .get("jupytext")
        .and_then(Value::as_object)
        .and_then(|jupytext| jupytext.get_str("notebook_metadata_filter"))
        .unwrap_or("")
        .split(',')
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();
    if notebook_filter.iter().any(|key| key == "all" || key == "-all") {
        return;
    }
    let defaults: Vec<&str> = DEFAULT_NOTEBOOK_METADATA.split(',').collect();
    for key in metadata.keys() {
        if defaults.contains(&key.as_str())
            || notebook_filter.contains(key)
            || notebook_filter.contains(&format!("-{}", key))
        {
            continue;
        }
        notebook_filter.push(key.clone());
    }
    if !notebook_filter.is_empty() {
        metadata.object_entry("jupytext").insert(
            "notebook_metadata_filter".to_string(),
            Value::from(notebook_filter.join(",")),
        );
    }
}

/// Filters notebook or cell metadata according to the user filter and a
/// default filter.
///
/// Keys that cannot be written in the text (see
/// [`is_valid_metadata_key`]) are dropped and collected into `unsupported`.
pub fn filter_metadata(
    metadata: &Metadata,
    user_filter: &MetadataFilter,
    default_filter: &str,
    unsupported: &mut Vec<String>,
) -> Metadata {
    let default_filter = parse_filter(default_filter);
    let default_include = default_filter.additional;
    let mut default_exclude = default_filter.excluded;
    if !default_include.is_all() && !default_include.is_empty() && default_exclude.is_empty() {
        default_exclude = KeySet::All;
    }

    let user_include = &user_filter.additional;
    let user_exclude = &user_filter.excluded;

    if user_include.is_all() {
        return subset_metadata(metadata, None, Some(user_exclude.keys()), unsupported);
    }
    if user_exclude.is_all() {
        return subset_metadata(metadata, Some(user_include.keys()), None, unsupported);
    }

    if default_exclude.is_all() {
        // only a few entries are kept by default
        let mut keep_only: Vec<String> = user_include.keys().to_vec();
        for key in default_include.keys() {
            if !keep_only.contains(key) {
                keep_only.push(key.clone());
            }
        }
        return subset_metadata(metadata, Some(&keep_only), Some(user_exclude.keys()), unsupported);
    }

    let mut exclude: Vec<String> = user_exclude.keys().to_vec();
    for key in default_exclude.keys() {
        if !user_include.keys().contains(key) && !exclude.contains(key) {
            exclude.push(key.clone());
        }
    }
    let empty_tags = metadata
        .get("tags")
        .map_or(false, |tags| matches!(tags, Value::Array(items) if items.is_empty()));
    if empty_tags {
        let mut metadata = metadata.clone();
        metadata.shift_remove("tags");
        return subset_metadata(&metadata, None, Some(&exclude), unsupported);
    }
    subset_metadata(metadata, None, Some(&exclude), unsupported)
}

/// Groups `a.b` keys by their first level.
fn second_level(keys: &[String]) -> Vec<(String, Vec<String>)> {
    let mut sub_keys: Vec<(String, Vec<String>)> = Vec::new();
    for key in keys {
        if let Some((left, right)) = key.split_once('.') {
            match sub_keys.iter_mut().find(|(name, _)| name == left) {
                Some((_, rights)) => rights.push(right.to_string()),
                None => sub_keys.push((left.to_string(), vec![right.to_string()])),
            }
        }
    }
    sub_keys
}

fn subset_metadata(
    metadata: &Metadata,
    keep_only: Option<&[String]>,
    exclude: Option<&[String]>,
    unsupported: &mut Vec<String>,
) -> Metadata {
    for key in metadata.keys() {
        if !is_valid_metadata_key(key) && !unsupported.contains(key) {
            unsupported.push(key.clone());
        }
    }
    let supported: Vec<(&String, &Value)> = metadata
        .iter()
        .filter(|(key, _)| is_valid_metadata_key(key))
        .collect();

    let mut filtered: Metadata = match keep_only {
        Some(keep_only) => {
            let mut filtered: Metadata = supported
                .iter()
                .filter(|(key, _)| keep_only.contains(key))
                .map(|(key, value)| ((*key).clone(), (*value).clone()))
                .collect();
            for (key, sub_keys) in second_level(keep_only) {
                if let Some(Value::Object(inner)) = metadata.get(&key) {
                    if is_valid_metadata_key(&key) {
                        let inner = subset_metadata(inner, Some(&sub_keys), None, unsupported);
                        filtered.insert(key, Value::Object(inner));
                    }
                }
            }
            filtered
        }
        None => supported
            .into_iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };

    if let Some(exclude) = exclude {
        for key in exclude {
            filtered.shift_remove(key);
        }
        for (key, sub_keys) in second_level(exclude) {
            if let Some(Value::Object(inner)) = filtered.get(&key) {
                let inner = subset_metadata(inner, None, Some(&sub_keys), unsupported);
                filtered.insert(key, Value::Object(inner));
            }
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn object(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn filter(text: &str) -> MetadataFilter {
        text.parse().unwrap()
    }

    #[test]
    fn test_filter_as_dict() {
        assert_eq!(filter("all"), MetadataFilter::all());
        assert_eq!(filter("-all"), MetadataFilter { additional: KeySet::Keys(vec![]), excluded: KeySet::All });
        assert_eq!(
            filter("one,+two,-three"),
            MetadataFilter {
                additional: KeySet::Keys(vec!["one".to_string(), "two".to_string()]),
                excluded: KeySet::Keys(vec!["three".to_string()]),
            }
        );
        assert_eq!(MetadataFilter::from_value(&Value::Bool(false)), MetadataFilter::none());
    }

    #[test]
    fn test_filter_as_string() {
        assert_eq!(filter("one,-all").to_string(), "one,-all");
        assert_eq!(filter("lines_to_next_cell,tags").to_string(), "tags");
        assert_eq!(filter("").to_string(), "");
    }

    #[test]
    fn test_notebook_default_filter() {
        let md = object(metadata!({"kernelspec": {"name": "python3"}, "widgets": {}, "jupytext": {}}));
        let mut unsupported = Vec::new();
        let filtered = filter_metadata(&md, &MetadataFilter::default(), DEFAULT_NOTEBOOK_METADATA, &mut unsupported);
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["kernelspec", "jupytext"]);

        let filtered = filter_metadata(&md, &filter("widgets,-kernelspec"), DEFAULT_NOTEBOOK_METADATA, &mut unsupported);
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["widgets", "jupytext"]);

        let filtered = filter_metadata(&md, &filter("-all"), DEFAULT_NOTEBOOK_METADATA, &mut unsupported);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_second_level_keys() {
        let md = object(metadata!({"jupytext": {"text_representation": {}, "main_language": "R"}, "kernelspec": {}}));
        let mut unsupported = Vec::new();
        let filtered = filter_metadata(
            &md,
            &filter("-jupytext.text_representation"),
            DEFAULT_NOTEBOOK_METADATA,
            &mut unsupported,
        );
        assert_eq!(Value::Object(filtered), metadata!({"jupytext": {"main_language": "R"}, "kernelspec": {}}));

        let filtered = filter_metadata(&md, &filter("jupytext.main_language,-all"), "", &mut unsupported);
        assert_eq!(Value::Object(filtered), metadata!({"jupytext": {"main_language": "R"}}));
    }

    #[test]
    fn test_empty_tags_and_unsupported_keys() {
        let md = object(metadata!({"tags": [], "a,b": 1, "ok": 2}));
        let mut unsupported = Vec::new();
        let filtered = filter_metadata(&md, &MetadataFilter::default(), "-ExecuteTime", &mut unsupported);
        assert_eq!(Value::Object(filtered), metadata!({"ok": 2}));
        assert_eq!(unsupported, vec!["a,b"]);
    }

    #[test]
    fn test_update_filters_without_header() {
        let mut md = Metadata::new();
        update_metadata_filters(&mut md, false, &["tags".to_string(), "title".to_string()]);
        assert_eq!(
            Value::Object(md),
            metadata!({"jupytext": {"notebook_metadata_filter": "-all", "cell_metadata_filter": "tags,title,-all"}})
        );
    }

    #[test]
    fn test_update_existing_cell_filter() {
        let mut md = object(metadata!({"jupytext": {"cell_metadata_filter": "-tags,-ExecuteTime"}}));
        update_metadata_filters(&mut md, true, &["tags".to_string()]);
        assert_eq!(
            md.get("jupytext").and_then(Value::as_object).and_then(|j| j.get_str("cell_metadata_filter")),
            Some("tags,-ExecuteTime")
        );
    }

    #[test]
    fn test_update_notebook_filter_with_custom_keys() {
        let mut md = object(metadata!({"kernelspec": {}, "widgets": {}, "jupytext": {}}));
        update_metadata_filters(&mut md, true, &[]);
        assert_eq!(
            md.get("jupytext").and_then(Value::as_object).and_then(|j| j.get_str("notebook_metadata_filter")),
            Some("widgets")
        );
    }
}
