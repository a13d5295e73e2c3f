//! Escaping of Jupyter magics and code-start look-alikes.
//!
//! A magic (`%matplotlib inline`, `!ls`, `%%time`) is not valid code in the
//! host language, so text notebooks keep it behind a comment: `# %matplotlib
//! inline`. Readers uncomment it again. An explicit `# escape` or
//! `# noescape` at the end of the line overrides the heuristic.
//!
//! Likewise, a code line that looks like a cell marker (`# +` in a light
//! script, ```` ``` ```` in Markdown) gets one extra comment layer on write,
//! removed on read.
//!
//! Both directions skip lines that start inside a string literal.

use crate::languages::{comment_for_language, script_language, usual_language_name, SCRIPT_EXTENSIONS};
use crate::stringparser::StringParser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

struct MagicPatterns {
    magic: Regex,
    force_escape: Regex,
    no_escape: Regex,
}

impl MagicPatterns {
    fn with_prefix(comment: &str, prefix: &str, indent: &str) -> Self {
        let c = regex::escape(comment);
        let head = format!(r"^{indent}({c} |{c})*{prefix}", indent = indent, c = c, prefix = prefix);
        MagicPatterns {
            magic: Regex::new(&head).unwrap(),
            force_escape: Regex::new(&format!(r"{}(.*){}\s*escape", head, c)).unwrap(),
            no_escape: Regex::new(&format!(r"{}(.*){}\s*noescape", head, c)).unwrap(),
        }
    }
}

static MAGIC_PATTERNS: Lazy<HashMap<&'static str, MagicPatterns>> = Lazy::new(|| {
    let mut patterns = HashMap::new();
    for (_, script) in SCRIPT_EXTENSIONS {
        patterns.insert(
            script.language,
            MagicPatterns::with_prefix(script.comment, r"(%|%%|%%%)[a-zA-Z]", r"\s*"),
        );
    }
    // Rust (evcxr) magics start with ':'
    patterns.insert("rust", MagicPatterns::with_prefix("//", r":[a-zA-Z]", ""));
    // C# (.NET interactive) magics start with '#!'
    patterns.insert("csharp", MagicPatterns::with_prefix("//", r"#![a-zA-Z]", ""));
    // Go (gonb) magics may start with '!' or '!*'
    patterns.insert(
        "go",
        MagicPatterns::with_prefix("//", r"(!|!\*|%|%%|%%%)[a-zA-Z]", ""),
    );
    patterns
});

// Help and shell commands must be escaped
static PYTHON_HELP_OR_BASH_CMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(# |#)*\s*(\?|!)\s*[A-Za-z\.\~\$\\/\{\}]").unwrap());

// Shell commands that IPython runs without '!', unless followed by '=' or ','
static PYTHON_MAGIC_CMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(# |#)*(cat|cd|cp|mv|rm|rmdir|mkdir|copy|ddir|echo|ls|ldir|ren)($|\s$|\s[^=,])")
        .unwrap()
});

static PYTHON_MAGIC_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(# |#)*\s*([a-zA-Z_][a-zA-Z_$0-9]*)\s*=\s*(%|%%|%%%|!)[a-zA-Z](.*)").unwrap()
});

// `object?` is only a help request in a cell known to be code
static IPYTHON_MAGIC_HELP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(# )*[^\s]*\?\s*$").unwrap());

static LINE_CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r".*\\\s*$").unwrap());

static ESCAPED_CODE_START: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    let mut patterns = HashMap::new();
    patterns.insert(".Rmd", Regex::new(r"^(# |#)*```\{.*\}").unwrap());
    patterns.insert(".md", Regex::new(r"^(# |#)*```").unwrap());
    patterns.insert(".markdown", Regex::new(r"^(# |#)*```").unwrap());
    for (ext, script) in SCRIPT_EXTENSIONS {
        let c = regex::escape(script.comment);
        let pattern = format!(r"^({c} |{c})*({c}|{c} )\+", c = c);
        patterns.insert(*ext, Regex::new(&pattern).unwrap());
    }
    patterns
});

fn comment_of(language: &str) -> &'static str {
    comment_for_language(language).unwrap_or("#")
}

/// Is the line a (possibly already commented) magic that should be escaped?
///
/// `global_escape` is the document-wide `comment_magics` setting, and
/// `explicitly_code` tells whether the line belongs to a cell that is known
/// to be code (which enables the `object?` help syntax).
///
/// # Examples
///
/// ```rust
/// use nbtext::magics::is_magic;
///
/// assert!(is_magic("%matplotlib inline", "python", true, false));
/// assert!(is_magic("# !ls", "python", true, false));
/// assert!(!is_magic("%matplotlib inline # noescape", "python", true, false));
/// assert!(is_magic("ls -l", "python", true, false));
/// assert!(!is_magic("ls = 3", "python", true, false));
/// assert!(is_magic("// :dep serde", "rust", true, false));
/// assert!(!is_magic("%matplotlib inline", "matlab", true, false));
/// ```
#[must_use]
pub fn is_magic(line: &str, language: &str, global_escape: bool, explicitly_code: bool) -> bool {
    let language = usual_language_name(language);
    if matches!(language.as_str(), "octave" | "matlab" | "sas") {
        return false;
    }
    let patterns = match MAGIC_PATTERNS.get(language.as_str()) {
        Some(patterns) => patterns,
        None => return false,
    };
    if patterns.force_escape.is_match(line) {
        return true;
    }
    if !global_escape || patterns.no_escape.is_match(line) {
        return false;
    }
    if patterns.magic.is_match(line) {
        return true;
    }
    if language != "python" {
        return false;
    }
    PYTHON_HELP_OR_BASH_CMD.is_match(line)
        || PYTHON_MAGIC_ASSIGN.is_match(line)
        || (explicitly_code && IPYTHON_MAGIC_HELP.is_match(line))
        || PYTHON_MAGIC_CMD.is_match(line)
}

/// Does the cell contain a line that is a magic only when the cell is known
/// to be code? Such cells need an explicit start marker.
#[must_use]
pub fn need_explicit_marker(source: &[String], language: &str, global_escape: bool) -> bool {
    if language != "python" || !global_escape {
        return false;
    }
    let mut parser = StringParser::new(Some(language));
    for line in source {
        if !parser.is_quoted()
            && is_magic(line, language, global_escape, true)
            && !is_magic(line, language, global_escape, false)
        {
            return true;
        }
        parser = parser.read_line(line);
    }
    false
}

/// Comments out the magics, after their indentation: `    # %time f()`.
///
/// In Python, a magic that ends with a line continuation carries the
/// escape over to the next line.
///
/// # Examples
///
/// ```rust
/// use nbtext::magics::comment_magic;
///
/// let source = vec!["%%time".to_string(), "x = '''".to_string(), "%not".to_string(), "'''".to_string()];
/// assert_eq!(comment_magic(&source, "python", true, true), vec!["# %%time", "x = '''", "%not", "'''"]);
/// ```
#[must_use]
pub fn comment_magic(
    source: &[String],
    language: &str,
    global_escape: bool,
    explicitly_code: bool,
) -> Vec<String> {
    let comment = comment_of(language);
    let mut parser = StringParser::new(Some(language));
    let mut next_is_magic = false;
    let mut result = Vec::with_capacity(source.len());
    for line in source {
        if !parser.is_quoted()
            && (next_is_magic || is_magic(line, language, global_escape, explicitly_code))
        {
            if next_is_magic {
                result.push(format!("{} {}", comment, line));
            } else {
                let unindented = line.trim_start();
                let indent = &line[..line.len() - unindented.len()];
                result.push(format!("{}{} {}", indent, comment, unindented));
            }
            next_is_magic = language == "python" && LINE_CONTINUATION.is_match(line);
        } else {
            result.push(line.clone());
        }
        parser = parser.read_line(line);
    }
    result
}

/// Removes one comment layer, keeping the indentation.
///
/// # Examples
///
/// ```rust
/// use nbtext::magics::unesc;
///
/// assert_eq!(unesc("    # %time f()", "python"), "    %time f()");
/// assert_eq!(unesc("#%time", "python"), "%time");
/// assert_eq!(unesc("x = 1", "python"), "x = 1");
/// ```
#[must_use]
pub fn unesc(line: &str, language: &str) -> String {
    let comment = comment_of(language);
    let unindented = line.trim_start();
    let indent = &line[..line.len() - unindented.len()];
    if let Some(rest) = unindented.strip_prefix(comment) {
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        return format!("{}{}", indent, rest);
    }
    line.to_string()
}

/// Uncomments the magics; the inverse of [`comment_magic`].
#[must_use]
pub fn uncomment_magic(
    source: &[String],
    language: &str,
    global_escape: bool,
    explicitly_code: bool,
) -> Vec<String> {
    let mut parser = StringParser::new(Some(language));
    let mut next_is_magic = false;
    let mut result = Vec::with_capacity(source.len());
    for line in source {
        if !parser.is_quoted()
            && (next_is_magic || is_magic(line, language, global_escape, explicitly_code))
        {
            result.push(unesc(line, language));
            next_is_magic = language == "python" && LINE_CONTINUATION.is_match(line);
        } else {
            result.push(line.clone());
        }
        parser = parser.read_line(line);
    }
    result
}

/// Is the line a (possibly commented) cell start marker for this extension?
#[must_use]
pub fn is_escaped_code_start(line: &str, ext: &str) -> bool {
    ESCAPED_CODE_START
        .get(ext)
        .map_or(false, |pattern| pattern.is_match(line))
}

/// Comments out the lines that would be read as a cell start.
///
/// # Examples
///
/// ```rust
/// use nbtext::magics::escape_code_start;
///
/// let source = vec!["# + this looks like a marker".to_string(), "x = 1".to_string()];
/// assert_eq!(
///     escape_code_start(&source, ".py", "python"),
///     vec!["# # + this looks like a marker", "x = 1"]
/// );
/// ```
#[must_use]
pub fn escape_code_start(source: &[String], ext: &str, language: &str) -> Vec<String> {
    let comment = script_language(ext).map_or("#", |s| s.comment);
    let mut parser = StringParser::new(Some(language));
    let mut result = Vec::with_capacity(source.len());
    for line in source {
        if !parser.is_quoted() && is_escaped_code_start(line, ext) {
            result.push(format!("{} {}", comment, line));
        } else {
            result.push(line.clone());
        }
        parser = parser.read_line(line);
    }
    result
}

/// Removes the extra comment layer added by [`escape_code_start`].
///
/// A line is only unescaped if it still looks like a cell start afterwards.
#[must_use]
pub fn unescape_code_start(source: &[String], ext: &str, language: &str) -> Vec<String> {
    let mut parser = StringParser::new(Some(language));
    let mut result = Vec::with_capacity(source.len());
    for line in source {
        if !parser.is_quoted() && is_escaped_code_start(line, ext) {
            let unescaped = unesc(line, language);
            if is_escaped_code_start(&unescaped, ext) {
                result.push(unescaped);
            } else {
                result.push(line.clone());
            }
        } else {
            result.push(line.clone());
        }
        parser = parser.read_line(line);
    }
    result
}
