//! The dialect registry and format detection.
//!
//! Every supported `(extension, format_name)` pair has one
//! [`FormatImplementation`] in [`FORMATS`]: the dialect that reads and writes
//! cells, the prefix of the header lines and the version of the dialect.
//! The first entry for an extension is its default.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::formats::{get_format_implementation, guess_format, Dialect};
//!
//! let implementation = get_format_implementation(".py", Some("percent")).unwrap();
//! assert_eq!(implementation.dialect, Dialect::Percent);
//! assert_eq!(implementation.header_prefix, "#");
//!
//! let (name, _) = guess_format("# %%\n1 + 1\n", ".py");
//! assert_eq!(name, "percent");
//! ```

use crate::header::header_to_metadata_and_cell;
use crate::languages::{script_language, SCRIPT_EXTENSIONS};
use crate::magics::is_magic;
use crate::stringparser::StringParser;
use crate::{Error, FormatOptions, Metadata, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// The text dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Fenced code blocks in Markdown.
    Markdown,
    /// ```` ```{r options} ```` chunks.
    RMarkdown,
    /// Scripts with optional `# +` / `# -` markers.
    Light,
    /// Light scripts written without any marker.
    NoMarker,
    /// Scripts with `# %%` cell markers.
    Percent,
    /// Percent scripts where magics stay uncommented.
    Hydrogen,
    /// knitr spin R scripts, `#'` for markdown.
    Spin,
    /// Sphinx-gallery Python scripts.
    Sphinx,
}

impl Dialect {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::Markdown => "markdown",
            Dialect::RMarkdown => "rmarkdown",
            Dialect::Light => "light",
            Dialect::NoMarker => "nomarker",
            Dialect::Percent => "percent",
            Dialect::Hydrogen => "hydrogen",
            Dialect::Spin => "spin",
            Dialect::Sphinx => "sphinx",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the dialect registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatImplementation {
    pub format_name: &'static str,
    pub extension: &'static str,
    pub dialect: Dialect,
    pub header_prefix: &'static str,
    pub header_suffix: &'static str,
    pub current_version_number: &'static str,
    pub min_readable_version_number: Option<&'static str>,
}

impl FormatImplementation {
    const fn text(
        dialect: Dialect,
        extension: &'static str,
        current_version_number: &'static str,
        min_readable_version_number: Option<&'static str>,
    ) -> Self {
        FormatImplementation {
            format_name: dialect.as_str(),
            extension,
            dialect,
            header_prefix: "",
            header_suffix: "",
            current_version_number,
            min_readable_version_number,
        }
    }
}

/// The dialect registry.
pub static FORMATS: Lazy<Vec<FormatImplementation>> = Lazy::new(|| {
    let mut formats = vec![
        FormatImplementation::text(Dialect::Markdown, ".md", "1.3", Some("1.0")),
        FormatImplementation::text(Dialect::Markdown, ".markdown", "1.2", Some("1.0")),
        FormatImplementation::text(Dialect::RMarkdown, ".Rmd", "1.2", Some("1.0")),
    ];
    let scripts = [
        (Dialect::Light, "1.5", Some("1.1")),
        (Dialect::NoMarker, "1.0", Some("1.0")),
        (Dialect::Percent, "1.3", Some("1.1")),
        (Dialect::Hydrogen, "1.3", Some("1.1")),
    ];
    for (dialect, current, min_readable) in scripts {
        for (ext, script) in SCRIPT_EXTENSIONS.iter() {
            formats.push(FormatImplementation {
                header_prefix: script.comment,
                header_suffix: script.comment_suffix,
                ..FormatImplementation::text(dialect, *ext, current, min_readable)
            });
        }
    }
    for ext in [".r", ".R"] {
        formats.push(FormatImplementation {
            header_prefix: "#'",
            ..FormatImplementation::text(Dialect::Spin, ext, "1.0", None)
        });
    }
    formats.push(FormatImplementation {
        header_prefix: "#",
        ..FormatImplementation::text(Dialect::Sphinx, ".py", "1.1", None)
    });
    formats
});

/// Reduces `.lgt.py` or `py` to `.py`.
#[must_use]
pub fn last_extension(ext: &str) -> String {
    format!(".{}", ext.rsplit('.').next().unwrap_or(ext))
}

/// Returns the implementation of a format, the default one for the
/// extension when no format name is given.
///
/// # Errors
///
/// Returns [`Error::UnknownFormat`] when the format name is not available
/// for that extension, and [`Error::UnsupportedExtension`] when no format
/// handles the extension.
///
/// # Examples
///
/// ```rust
/// use nbtext::formats::get_format_implementation;
/// use nbtext::Error;
///
/// assert_eq!(get_format_implementation(".R", None).unwrap().format_name, "light");
/// assert!(matches!(
///     get_format_implementation(".py", Some("rmarkdown")),
///     Err(Error::UnknownFormat { .. })
/// ));
/// assert!(matches!(get_format_implementation(".docx", None), Err(Error::UnsupportedExtension(_))));
/// ```
pub fn get_format_implementation(
    ext: &str,
    format_name: Option<&str>,
) -> Result<&'static FormatImplementation> {
    let ext = last_extension(ext);
    let format_name = format_name.filter(|name| !name.is_empty());

    let mut alternatives = Vec::new();
    for implementation in FORMATS.iter().filter(|f| f.extension == ext) {
        match format_name {
            Some(name) if name != implementation.format_name => {
                alternatives.push(implementation.format_name)
            }
            _ => return Ok(implementation),
        }
    }

    match format_name {
        Some(name) if !alternatives.is_empty() => Err(Error::UnknownFormat {
            format_name: name.to_string(),
            extension: ext,
            alternatives: alternatives.join(", "),
        }),
        _ => Err(Error::UnsupportedExtension(ext)),
    }
}

/// Returns the header metadata of a text document, or nothing if the
/// header cannot be read.
#[must_use]
pub fn read_metadata(text: &str, ext: &str) -> Metadata {
    let ext = last_extension(ext);
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let (comment, suffix) = match ext.as_str() {
        ".md" | ".markdown" | ".Rmd" => ("", ""),
        _ => script_language(&ext).map_or(("#", ""), |s| (s.comment, s.comment_suffix)),
    };

    let metadata = header_to_metadata_and_cell(&lines, comment, suffix, &ext, true)
        .map(|header| header.metadata)
        .unwrap_or_default();
    if metadata.is_empty() && (ext == ".r" || ext == ".R") {
        return header_to_metadata_and_cell(&lines, "#'", "", &ext, true)
            .map(|header| header.metadata)
            .unwrap_or_default();
    }
    metadata
}

fn text_representation(metadata: &Metadata) -> Option<&Metadata> {
    metadata
        .get("jupytext")
        .and_then(Value::as_object)
        .and_then(|jupytext| jupytext.get("text_representation"))
        .and_then(Value::as_object)
}

/// Returns the format name recorded for this extension in the notebook
/// metadata, either in `text_representation` or in the paired `formats`.
///
/// With `explicit_default`, the default format of script extensions is
/// returned when nothing is recorded.
#[must_use]
pub fn format_name_for_ext(metadata: &Metadata, ext: &str, explicit_default: bool) -> Option<String> {
    if let Some(representation) = text_representation(metadata) {
        let same_extension = representation
            .get_str("extension")
            .map_or(false, |extension| extension.ends_with(ext));
        if let Some(name) = representation.get_str("format_name").filter(|_| same_extension) {
            return Some(name.to_string());
        }
    }

    let formats = metadata
        .get("jupytext")
        .and_then(Value::as_object)
        .and_then(|jupytext| jupytext.get_str("formats"))
        .unwrap_or("");
    for entry in formats.split(',').filter(|entry| !entry.trim().is_empty()) {
        let entry = entry.rsplit('/').next().unwrap_or(entry);
        if let Ok(format) = entry.parse::<crate::Format>() {
            if format.extension == ext && (!explicit_default || format.format_name.is_some()) {
                return format.format_name;
            }
        }
    }

    if !explicit_default || matches!(ext, ".md" | ".markdown" | ".Rmd") {
        return None;
    }
    get_format_implementation(ext, None)
        .ok()
        .map(|implementation| implementation.format_name.to_string())
}

fn parse_version(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

/// Checks that the dialect version declared in the header can be read.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] when the document was written with a
/// dialect version older than the oldest readable one, or newer than the
/// current one.
pub fn check_file_version(metadata: &Metadata, implementation: &FormatImplementation) -> Result<()> {
    let representation = match text_representation(metadata) {
        Some(representation) => representation,
        None => return Ok(()),
    };
    let same_format = representation
        .get_str("extension")
        .map_or(false, |ext| ext.ends_with(implementation.extension))
        && representation.get_str("format_name") == Some(implementation.format_name);
    let version = match representation.get_str("format_version") {
        Some(version) if same_format => version,
        _ => return Ok(()),
    };

    let current = implementation.current_version_number;
    let min_readable = implementation.min_readable_version_number.unwrap_or(current);
    let parsed = parse_version(version);
    if parse_version(min_readable) <= parsed && parsed <= parse_version(current) {
        return Ok(());
    }
    Err(Error::InvalidFormat(format!(
        "{}:{} version {} (readable versions are {} to {})",
        implementation.extension.trim_start_matches('.'),
        implementation.format_name,
        version,
        min_readable,
        current
    )))
}

/// Marker-line signatures of a script extension, used by [`guess_format`].
struct ScriptSignatures {
    double_percent: Regex,
    double_percent_and_space: Regex,
    nbconvert_script: Regex,
    vim_folding_markers: Regex,
    vscode_folding_markers: Regex,
}

static TWENTY_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#( |)#{19,}\s*$").unwrap());

static SCRIPT_SIGNATURES: Lazy<Vec<(&'static str, ScriptSignatures)>> = Lazy::new(|| {
    SCRIPT_EXTENSIONS
        .iter()
        .map(|(ext, script)| {
            let comment = regex::escape(script.comment);
            let signatures = ScriptSignatures {
                double_percent: Regex::new(&format!(r"^{}( %%|%%)$", comment)).unwrap(),
                double_percent_and_space: Regex::new(&format!(r"^{}( %%|%%)\s", comment)).unwrap(),
                nbconvert_script: Regex::new(&format!(r"^{}( <codecell>| In\[[0-9 ]*\]:?)", comment))
                    .unwrap(),
                vim_folding_markers: Regex::new(&format!(r"^{}\s*\{{\{{\{{", comment)).unwrap(),
                vscode_folding_markers: Regex::new(&format!(r"^{}\s*region", comment)).unwrap(),
            };
            (*ext, signatures)
        })
        .collect()
});

/// Guesses the format name, and the options it needs, from the content.
///
/// The header `text_representation` wins. Otherwise, for scripts: any
/// percent marker gives `percent` (`hydrogen` if the script also has
/// uncommented magics), then vim or VS Code folding markers give `light`
/// with custom cell markers, then twenty-hash rows give `sphinx` and `#'`
/// lines in R give `spin`. The default format of the extension comes last.
///
/// # Examples
///
/// ```rust
/// use nbtext::formats::guess_format;
///
/// let (name, options) = guess_format("# {{{\nx = 1\n# }}}\n", ".py");
/// assert_eq!(name, "light");
/// assert_eq!(options.cell_markers.as_deref(), Some("{{{,}}}"));
///
/// let (name, _) = guess_format("#' Some text\nx <- 1\n", ".R");
/// assert_eq!(name, "spin");
/// ```
#[must_use]
pub fn guess_format(text: &str, ext: &str) -> (String, FormatOptions) {
    let metadata = read_metadata(text, ext);
    if text_representation(&metadata).is_some() {
        if let Some(name) = format_name_for_ext(&metadata, ext, true) {
            return (name, FormatOptions::default());
        }
    }

    let script = script_language(ext);
    let signatures = SCRIPT_SIGNATURES.iter().find(|(e, _)| *e == ext).map(|(_, s)| s);
    if let (Some(script), Some(signatures)) = (script, signatures) {
        let is_r = ext == ".r" || ext == ".R";
        let mut parser = StringParser::new(Some(if is_r { "R" } else { "python" }));

        let mut twenty_hash_count = 0;
        let mut double_percent_count = 0;
        let mut magic_command_count = 0;
        let mut rspin_comment_count = 0;
        let mut vim_folding_markers_count = 0;
        let mut vscode_folding_markers_count = 0;

        for line in text.lines() {
            parser = parser.read_line(line);
            if parser.is_quoted() {
                continue;
            }
            // escaped magics (no space after %%) do not start cells
            if signatures.double_percent.is_match(line)
                || signatures.double_percent_and_space.is_match(line)
                || signatures.nbconvert_script.is_match(line)
            {
                double_percent_count += 1;
            }
            if !line.starts_with(script.comment) && is_magic(line, script.language, true, true) {
                magic_command_count += 1;
            }
            if ext == ".py" && TWENTY_HASH.is_match(line) {
                twenty_hash_count += 1;
            }
            if is_r && line.starts_with("#'") {
                rspin_comment_count += 1;
            }
            if signatures.vim_folding_markers.is_match(line) {
                vim_folding_markers_count += 1;
            }
            if signatures.vscode_folding_markers.is_match(line) {
                vscode_folding_markers_count += 1;
            }
        }

        if double_percent_count >= 1 {
            let name = if magic_command_count > 0 { "hydrogen" } else { "percent" };
            return (name.to_string(), FormatOptions::default());
        }
        if vim_folding_markers_count > 0 {
            return ("light".to_string(), FormatOptions::new().with_cell_markers("{{{,}}}"));
        }
        if vscode_folding_markers_count > 0 {
            return (
                "light".to_string(),
                FormatOptions::new().with_cell_markers("region,endregion"),
            );
        }
        if twenty_hash_count >= 2 {
            return ("sphinx".to_string(), FormatOptions::default());
        }
        if rspin_comment_count >= 1 {
            return ("spin".to_string(), FormatOptions::default());
        }
    }

    let name = get_format_implementation(ext, None)
        .map(|implementation| implementation.format_name.to_string())
        .unwrap_or_default();
    (name, FormatOptions::default())
}

/// Guesses both the extension and the format of a text, as `"ext:format_name"`.
///
/// # Examples
///
/// ```rust
/// use nbtext::formats::divine_format;
///
/// assert_eq!(divine_format("Some text\n```\ncode\n```\n"), "md");
/// assert_eq!(divine_format("# %%\n1 + 1\n"), "py:percent");
/// ```
#[must_use]
pub fn divine_format(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let mut comments: Vec<&str> = vec!["", "#"];
    for (_, script) in SCRIPT_EXTENSIONS.iter() {
        if !comments.contains(&script.comment) {
            comments.push(script.comment);
        }
    }
    for comment in comments {
        let metadata = match header_to_metadata_and_cell(&lines, comment, "", "", true) {
            Ok(header) => header.metadata,
            Err(_) => continue,
        };
        let extension = text_representation(&metadata)
            .and_then(|representation| representation.get_str("extension"))
            .map(str::to_string);
        if let Some(ext) = extension {
            let (name, _) = guess_format(text, &ext);
            return format!("{}:{}", ext.trim_start_matches('.'), name);
        }
    }

    if lines.iter().any(|line| line == "```") {
        return "md".to_string();
    }
    format!("py:{}", guess_format(text, ".py").0)
}
