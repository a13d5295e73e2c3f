//! The document header: YAML front matter, shebang and encoding lines.
//!
//! Text notebooks may start with a YAML block between `---` lines,
//! commented with the dialect's header prefix:
//!
//! ```text
//! # ---
//! # jupyter:
//! #   kernelspec:
//! #     display_name: Python 3
//! #     language: python
//! #     name: python3
//! # ---
//! ```
//!
//! The `jupyter` section is the notebook metadata. Other root-level keys are
//! kept as a leading raw cell, or lifted to `jupytext.root_level_metadata`.

use crate::formats::FormatImplementation;
use crate::languages::{comment_lines, default_language_from_metadata_and_ext, script_language};
use crate::metadata_filter::{filter_metadata, MetadataFilter, DEFAULT_NOTEBOOK_METADATA};
use crate::pep8::pep8_lines_between_cells;
use crate::{Cell, CellType, Error, FormatOptions, Metadata, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---\s*$").unwrap());
static BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").unwrap());
static JUPYTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^jupyter\s*:\s*$").unwrap());
static LEFT_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s").unwrap());

const UTF8_HEADER: &str = " -*- coding: utf-8 -*-";

/// Removes the prefix (and one space), and the suffix, from a line.
///
/// # Examples
///
/// ```rust
/// use nbtext::header::uncomment_line;
///
/// assert_eq!(uncomment_line("# text", "#", ""), "text");
/// assert_eq!(uncomment_line("#text", "#", ""), "text");
/// assert_eq!(uncomment_line("(* text *)", "(*", "*)"), "text");
/// ```
#[must_use]
pub fn uncomment_line(line: &str, prefix: &str, suffix: &str) -> String {
    let mut line = line;
    if !prefix.is_empty() {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest.strip_prefix(' ').unwrap_or(rest);
        }
    }
    if !suffix.is_empty() {
        if let Some(rest) = line.strip_suffix(suffix) {
            line = rest.strip_suffix(' ').unwrap_or(rest);
        }
    }
    line.to_string()
}

/// What the header of a text document contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// The notebook metadata.
    pub metadata: Metadata,
    /// Did the header have a `jupyter` section?
    pub has_jupyter_md: bool,
    /// The other root-level keys, as a raw cell.
    pub cell: Option<Cell>,
    /// Index of the first line after the header.
    pub next: usize,
}

fn is_raw_header_cell(cell: &Cell) -> Option<Vec<String>> {
    if cell.cell_type != CellType::Raw {
        return None;
    }
    let lines: Vec<String> = cell
        .source
        .trim_matches(|c| c == '\n' || c == '\t' || c == ' ')
        .lines()
        .map(str::to_string)
        .collect();
    if lines.len() >= 2 && HEADER.is_match(&lines[0]) && HEADER.is_match(&lines[lines.len() - 1]) {
        Some(lines)
    } else {
        None
    }
}

/// Reads the header of a text document.
///
/// # Errors
///
/// Returns [`Error::Header`] when the YAML cannot be parsed, or when the
/// encoding line declares another encoding than utf-8.
///
/// # Examples
///
/// ```rust
/// use nbtext::header::header_to_metadata_and_cell;
///
/// let lines: Vec<String> = "---\ntitle: Test\njupyter:\n  kernelspec:\n    name: python3\n---\n\nText"
///     .lines()
///     .map(str::to_string)
///     .collect();
/// let header = header_to_metadata_and_cell(&lines, "", "", ".md", true).unwrap();
/// assert!(header.has_jupyter_md);
/// assert!(header.metadata.contains_key("kernelspec"));
/// assert_eq!(header.cell.unwrap().source, "---\ntitle: Test\n---");
/// assert_eq!(header.next, 7);
/// ```
pub fn header_to_metadata_and_cell(
    lines: &[String],
    header_prefix: &str,
    header_suffix: &str,
    ext: &str,
    root_level_metadata_as_raw_cell: bool,
) -> Result<Header> {
    let mut header: Vec<String> = Vec::new();
    let mut jupyter: Vec<String> = Vec::new();
    let mut in_jupyter = false;
    let mut in_html_div = false;
    let mut start = 0;
    let mut started = false;
    let mut ended = false;
    let mut metadata = Metadata::new();
    let mut last = 0;

    let comment = if header_prefix == "#'" { "#" } else { header_prefix };
    let encoding_re = Regex::new(&format!(
        r"^[ \t\f]*{}.*?coding[:=][ \t]*([-_.a-zA-Z0-9]+)",
        regex::escape(comment)
    ))
    .map_err(Error::custom)?;

    for (i, line) in lines.iter().enumerate() {
        last = i;
        if i == 0 {
            if let Some(executable) = line.strip_prefix("#!") {
                metadata
                    .object_entry("jupytext")
                    .insert("executable".to_string(), Value::from(executable));
                start = i + 1;
                continue;
            }
        }
        if !comment.is_empty() && (i == 0 || (i == 1 && !encoding_re.is_match(&lines[0]))) {
            if let Some(captures) = encoding_re.captures(line) {
                if &captures[1] != "utf-8" {
                    return Err(Error::Header(format!(
                        "encodings other than utf-8 are not supported: {}",
                        &captures[1]
                    )));
                }
                metadata
                    .object_entry("jupytext")
                    .insert("encoding".to_string(), Value::from(line.as_str()));
                start = i + 1;
                continue;
            }
        }
        if !line.starts_with(header_prefix) {
            break;
        }
        if comment.is_empty() && line.trim().starts_with("<!--") {
            in_html_div = true;
            continue;
        }
        if in_html_div {
            if ended && line.contains("-->") {
                break;
            }
            if !started && line.trim().is_empty() {
                continue;
            }
        }

        let line = uncomment_line(line, header_prefix, header_suffix);
        if HEADER.is_match(&line) {
            if !started {
                started = true;
                continue;
            }
            ended = true;
            if in_html_div {
                continue;
            }
            break;
        }

        // something else than a YAML header
        if !started {
            if line.trim().is_empty() {
                continue;
            }
            break;
        }

        if JUPYTER.is_match(&line) {
            in_jupyter = true;
        } else if !line.is_empty() && !LEFT_SPACE.is_match(&line) {
            in_jupyter = false;
        }
        if in_jupyter {
            jupyter.push(line);
        } else {
            header.push(line);
        }
    }

    if !ended {
        return Ok(Header {
            metadata,
            has_jupyter_md: false,
            cell: None,
            next: start,
        });
    }

    if !jupyter.is_empty() {
        let extra = metadata;
        let parsed: Value = serde_yaml::from_str(&jupyter.join("\n"))?;
        metadata = parsed
            .as_object()
            .and_then(|root| root.get("jupyter"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        metadata.recursive_update(&extra);
    }

    let mut i = last;
    let lines_to_next_cell = match lines.get(i + 1) {
        Some(next) if BLANK.is_match(&uncomment_line(next, header_prefix, "")) => {
            i += 1;
            1
        }
        _ => 0,
    };

    let cell = if header.is_empty() {
        None
    } else if root_level_metadata_as_raw_cell {
        let mut source = vec!["---".to_string()];
        source.extend(header.iter().cloned());
        source.push("---".to_string());
        let mut cell = Cell::raw(source.join("\n"));
        if lines_to_next_cell != pep8_lines_between_cells(&["---".to_string()], &lines[i + 1..], ext) {
            cell.layout.lines_to_next_cell = Some(lines_to_next_cell);
        }
        Some(cell)
    } else {
        let root: Value = serde_yaml::from_str(&header.join("\n"))?;
        metadata
            .object_entry("jupytext")
            .insert("root_level_metadata".to_string(), root);
        None
    };

    trace!(keys = metadata.len(), next = i + 1, "header");
    Ok(Header {
        metadata,
        has_jupyter_md: !jupyter.is_empty(),
        cell,
        next: i + 1,
    })
}

/// Returns the shebang and encoding lines of a script.
///
/// Both are popped from `jupytext.executable` and `jupytext.encoding`. A
/// non-Python script with non-ASCII content gets a utf-8 coding line.
pub fn encoding_and_executable(cells: &[Cell], metadata: &mut Metadata, ext: &str) -> Vec<String> {
    let comment = match script_language(ext) {
        Some(script) => script.comment,
        None => return Vec::new(),
    };

    let mut lines = Vec::new();
    let mut encoding = None;
    if let Some(jupytext) = metadata.get_mut("jupytext").and_then(Value::as_object_mut) {
        if let Some(executable) = jupytext.shift_remove("executable") {
            lines.push(format!("#!{}", executable.as_str().unwrap_or_default()));
        }
        encoding = jupytext.shift_remove("encoding");
    }

    match encoding {
        Some(encoding) => lines.push(encoding.as_str().unwrap_or_default().to_string()),
        None => {
            let language = default_language_from_metadata_and_ext(metadata, ext, false);
            if language.as_deref() != Some("python") && cells.iter().any(|cell| !cell.source.is_ascii()) {
                lines.push(format!("{}{}", comment, UTF8_HEADER));
            }
        }
    }
    lines
}

/// Restamps a versioned `text_representation` entry, or drops an
/// unversioned one, then applies the notebook metadata filter.
///
/// An entry without `format_version` only records the format a notebook was
/// read from, and is not written. A versioned entry describes the text being
/// written: all its fields are replaced, and the `jupytext_version` of the
/// tool that wrote the previous text is removed.
fn insert_jupytext_info_and_filter_metadata(
    mut metadata: Metadata,
    implementation: &FormatImplementation,
    options: &FormatOptions,
    unsupported: &mut Vec<String>,
) -> Metadata {
    if let Some(jupytext) = metadata.get_mut("jupytext").and_then(Value::as_object_mut) {
        let versioned = jupytext
            .get("text_representation")
            .and_then(Value::as_object)
            .map(|representation| representation.contains_key("format_version"));
        match versioned {
            Some(true) => {
                let mut representation = Metadata::new();
                representation.insert("extension".to_string(), Value::from(implementation.extension));
                representation.insert("format_name".to_string(), Value::from(implementation.format_name));
                representation.insert(
                    "format_version".to_string(),
                    Value::from(implementation.current_version_number),
                );
                jupytext.insert("text_representation".to_string(), Value::Object(representation));
            }
            Some(false) => {
                jupytext.shift_remove("text_representation");
            }
            None => {}
        }
    }
    if metadata
        .get("jupytext")
        .map_or(false, |jupytext| !jupytext.is_truthy())
    {
        metadata.shift_remove("jupytext");
    }

    let user_filter = MetadataFilter::from_option(options.notebook_metadata_filter.as_deref());
    filter_metadata(&metadata, &user_filter, DEFAULT_NOTEBOOK_METADATA, unsupported)
}

/// Writes the header of a text document.
///
/// A leading raw cell with `---` lines becomes the body of the header and
/// is removed from `cells`. Returns the header lines and the
/// `lines_to_next_cell` of that cell.
///
/// # Errors
///
/// Returns [`Error::Header`] when the metadata cannot be written as YAML.
pub fn metadata_and_cell_to_header(
    cells: &mut Vec<Cell>,
    metadata: &Metadata,
    implementation: &FormatImplementation,
    options: &FormatOptions,
    unsupported: &mut Vec<String>,
) -> Result<(Vec<String>, Option<usize>)> {
    let mut metadata = metadata.clone();
    let mut header: Vec<String> = Vec::new();
    let mut lines_to_next_cell = None;
    let mut root_level_metadata = Metadata::new();

    if options.root_level_metadata_as_raw_cell == Some(false) {
        let root = metadata
            .get_mut("jupytext")
            .and_then(Value::as_object_mut)
            .and_then(|jupytext| jupytext.shift_remove("root_level_metadata"));
        if let Some(Value::Object(root)) = root {
            root_level_metadata = root;
        }
    } else if let Some(lines) = cells.first().and_then(is_raw_header_cell) {
        header = lines[1..lines.len() - 1].to_vec();
        lines_to_next_cell = cells[0].layout.lines_to_next_cell;
        cells.remove(0);
    }

    let metadata = insert_jupytext_info_and_filter_metadata(metadata, implementation, options, unsupported);
    if !metadata.is_empty() {
        root_level_metadata.insert("jupyter".to_string(), Value::Object(metadata));
    }
    if !root_level_metadata.is_empty() {
        let yaml = serde_yaml::to_string(&Value::Object(root_level_metadata).sorted())?;
        header.extend(yaml.lines().map(str::to_string));
    }

    if !header.is_empty() {
        header.insert(0, "---".to_string());
        header.push("---".to_string());
        if options.hide_notebook_metadata == Some(true) && implementation.format_name == "markdown" {
            header.splice(0..0, ["<!--".to_string(), String::new()]);
            header.extend(["".to_string(), "-->".to_string()]);
        }
    }

    Ok((
        comment_lines(&header, implementation.header_prefix, implementation.header_suffix),
        lines_to_next_cell,
    ))
}
