//! Languages, script extensions and comment strings.
//!
//! Every script dialect is keyed by a file extension; the extension decides
//! the notebook's default language and the comment string used to escape
//! markdown cells and magics.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::languages::{script_language, usual_language_name};
//!
//! let py = script_language(".py").unwrap();
//! assert_eq!(py.language, "python");
//! assert_eq!(py.comment, "#");
//!
//! assert_eq!(usual_language_name("C#"), "csharp");
//! ```

use crate::{Cell, Metadata, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// Language and comment conventions of a script extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLanguage {
    pub language: &'static str,
    pub comment: &'static str,
    pub comment_suffix: &'static str,
}

const fn lang(language: &'static str, comment: &'static str) -> ScriptLanguage {
    ScriptLanguage {
        language,
        comment,
        comment_suffix: "",
    }
}

const fn block(
    language: &'static str,
    comment: &'static str,
    comment_suffix: &'static str,
) -> ScriptLanguage {
    ScriptLanguage {
        language,
        comment,
        comment_suffix,
    }
}

/// Supported script extensions, in registry order.
pub static SCRIPT_EXTENSIONS: &[(&str, ScriptLanguage)] = &[
    (".py", lang("python", "#")),
    (".coco", lang("coconut", "#")),
    (".R", lang("R", "#")),
    (".r", lang("R", "#")),
    (".jl", lang("julia", "#")),
    (".cpp", lang("c++", "//")),
    (".ss", lang("scheme", ";;")),
    (".clj", lang("clojure", ";;")),
    (".scm", lang("scheme", ";;")),
    (".sh", lang("bash", "#")),
    (".ps1", lang("powershell", "#")),
    (".q", lang("q", "/")),
    (".m", lang("matlab", "%")),
    // Mathematica also uses .m, hence the made-up extension
    (".wolfram", block("wolfram language", "(*", "*)")),
    (".pro", lang("idl", ";")),
    (".js", lang("javascript", "//")),
    (".ts", lang("typescript", "//")),
    (".scala", lang("scala", "//")),
    (".rs", lang("rust", "//")),
    (".robot", lang("robotframework", "#")),
    (".resource", lang("robotframework", "#")),
    (".cs", lang("csharp", "//")),
    (".fsx", lang("fsharp", "//")),
    (".fs", lang("fsharp", "//")),
    (".sos", lang("sos", "#")),
    (".java", lang("java", "//")),
    (".groovy", lang("groovy", "//")),
    (".sage", lang("sage", "#")),
    (".ml", block("ocaml", "(*", "*)")),
    (".hs", lang("haskell", "--")),
    (".tcl", lang("tcl", "#")),
    (".mac", block("maxima", "/*", "*/")),
    (".gp", lang("gnuplot", "#")),
    (".do", lang("stata", "//")),
    (".sas", block("sas", "/*", "*/")),
    (".xsh", lang("xonsh", "#")),
    (".lgt", lang("logtalk", "%")),
    (".logtalk", lang("logtalk", "%")),
    (".lua", lang("lua", "--")),
    (".go", lang("go", "//")),
];

/// Cell magics that are also language names.
const MAGIC_LANGUAGES: &[&str] = &[
    "R",
    "bash",
    "sh",
    "python",
    "python2",
    "python3",
    "coconut",
    "javascript",
    "js",
    "perl",
    "html",
    "latex",
    "markdown",
    "pypy",
    "ruby",
    "script",
    "svg",
    "matlab",
    "octave",
    "idl",
    "robotframework",
    "sas",
    "spark",
    "sql",
    "cython",
    "haskell",
    "tcl",
    "gnuplot",
    "wolfram language",
];

/// All languages a cell may be written in: the magic languages, every
/// script language, and the short C#/F# names.
pub static JUPYTER_LANGUAGES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut languages: Vec<&'static str> = MAGIC_LANGUAGES.to_vec();
    for (_, script) in SCRIPT_EXTENSIONS {
        if !languages.contains(&script.language) {
            languages.push(script.language);
        }
    }
    for extra in ["c#", "f#", "cs", "fs"] {
        if !languages.contains(&extra) {
            languages.push(extra);
        }
    }
    languages
});

static GO_DOUBLE_PERCENT_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(%%\s*|%%\s+-.*)$").unwrap());

/// Returns the script conventions for an extension such as `".py"`.
#[must_use]
pub fn script_language(ext: &str) -> Option<&'static ScriptLanguage> {
    SCRIPT_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, script)| script)
}

/// Returns the comment string of a language, if it is a script language.
#[must_use]
pub fn comment_for_language(language: &str) -> Option<&'static str> {
    SCRIPT_EXTENSIONS
        .iter()
        .find(|(_, script)| script.language == language)
        .map(|(_, script)| script.comment)
}

/// Returns `true` for languages that can appear on a fence or a cell magic.
///
/// The comparison is case-insensitive, so `"r"`, `"R"` and `"PYTHON"` all match.
#[must_use]
pub fn is_jupyter_language(language: &str) -> bool {
    JUPYTER_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(language))
}

fn is_exact_jupyter_language(language: &str) -> bool {
    JUPYTER_LANGUAGES.contains(&language)
}

fn is_custom_magic(language: &str, custom_cell_magics: &[String]) -> bool {
    custom_cell_magics.iter().any(|m| m == language)
}

/// Returns the usual name of a language, the one used in the extension table.
///
/// # Examples
///
/// ```rust
/// use nbtext::languages::usual_language_name;
///
/// assert_eq!(usual_language_name("r"), "R");
/// assert_eq!(usual_language_name("C++17"), "c++");
/// assert_eq!(usual_language_name("octave"), "matlab");
/// ```
#[must_use]
pub fn usual_language_name(language: &str) -> String {
    let language = language.to_lowercase();
    match language.as_str() {
        "r" => "R".to_string(),
        "octave" => "matlab".to_string(),
        "cs" | "c#" => "csharp".to_string(),
        "fs" | "f#" => "fsharp".to_string(),
        "sas" => "SAS".to_string(),
        l if l.starts_with("c++") => "c++".to_string(),
        _ => language,
    }
}

/// Are those the same language?
#[must_use]
pub fn same_language(kernel_language: &str, language: &str) -> bool {
    usual_language_name(kernel_language) == usual_language_name(language)
}

fn nested_str<'a>(metadata: &'a Metadata, section: &str, key: &str) -> Option<&'a str> {
    metadata
        .get(section)
        .and_then(Value::as_object)
        .and_then(|s| s.get_str(key))
}

/// Returns the default language given the notebook metadata and the extension.
///
/// The `jupytext.main_language` entry wins over the kernel language, which
/// wins over the extension. With `pop_main_language`, a main language that
/// equals the kernel (or extension) language is removed from the metadata,
/// since it can be re-derived.
pub fn default_language_from_metadata_and_ext(
    metadata: &mut Metadata,
    ext: &str,
    pop_main_language: bool,
) -> Option<String> {
    let default_from_ext = script_language(ext).map(|s| s.language);
    let main_language = nested_str(metadata, "jupytext", "main_language").map(str::to_string);
    let default_language = nested_str(metadata, "kernelspec", "language")
        .filter(|l| !l.is_empty())
        .or(default_from_ext)
        .map(str::to_string);

    if pop_main_language && main_language.is_some() && main_language == default_language {
        if let Some(jupytext) = metadata.get_mut("jupytext").and_then(Value::as_object_mut) {
            jupytext.shift_remove("main_language");
        }
    }

    let language = main_language.or(default_language)?;
    if language == "R" || language == "sas" {
        return Some(language);
    }
    if language.starts_with("C++") {
        return Some("c++".to_string());
    }
    Some(language.to_lowercase().replace('#', "sharp"))
}

/// Read-only variant of [`default_language_from_metadata_and_ext`].
#[must_use]
pub fn default_language(metadata: &Metadata, ext: &str) -> Option<String> {
    let mut metadata = metadata.clone();
    default_language_from_metadata_and_ext(&mut metadata, ext, false)
}

/// Sets the main language of the notebook and turns cells in other
/// languages into cell magics.
///
/// Without a kernel language, the main language is the most frequent cell
/// language, with python given a head start of one half cell. It is recorded
/// in `jupytext.main_language` whenever the kernel does not carry it.
pub fn set_main_and_cell_language(
    metadata: &mut Metadata,
    cells: &mut [Cell],
    ext: &str,
    custom_cell_magics: &[String],
) {
    let main_language = match default_language_from_metadata_and_ext(metadata, ext, false) {
        Some(language) => language,
        None => {
            let mut counts: Vec<(String, f64)> = vec![("python".to_string(), 0.5)];
            for cell in cells.iter() {
                if let Some(language) = &cell.language {
                    let language = usual_language_name(language);
                    match counts.iter_mut().find(|(l, _)| *l == language) {
                        Some((_, count)) => *count += 1.0,
                        None => counts.push((language, 1.0)),
                    }
                }
            }
            let mut best = ("python".to_string(), 0.5);
            for (language, count) in counts {
                if count > best.1 {
                    best = (language, count);
                }
            }
            best.0
        }
    };

    if nested_str(metadata, "kernelspec", "language").is_none() && !cells.is_empty() {
        metadata
            .object_entry("jupytext")
            .insert("main_language".to_string(), Value::from(main_language.clone()));
    }

    for cell in cells.iter_mut() {
        let language = match &cell.language {
            Some(language) => language.clone(),
            None => continue,
        };
        if language == main_language {
            cell.language = None;
            continue;
        }
        if usual_language_name(&language) == main_language {
            continue;
        }
        if is_exact_jupyter_language(&language) || is_custom_magic(&language, custom_cell_magics)
        {
            cell.language = None;
            let magic = if main_language == "csharp" { "#!" } else { "%%" };
            let header = match cell.metadata.shift_remove("magic_args") {
                Some(Value::String(args)) => format!("{}{} {}", magic, language, args),
                _ => format!("{}{}", magic, language),
            };
            cell.source = format!("{}\n{}", header, cell.source);
        }
    }
}

/// Detects a cell magic that sets the cell language, e.g. `%%bash`.
///
/// On a match the magic line is removed from `source`, and the language and
/// the magic arguments are returned.
pub fn cell_language(
    source: &mut Vec<String>,
    default_language: &str,
    custom_cell_magics: &[String],
) -> Option<(String, String)> {
    let line = source.first()?;
    if default_language == "go" && GO_DOUBLE_PERCENT_COMMAND.is_match(line) {
        return None;
    }
    if default_language == "csharp" {
        if let Some(rest) = line.strip_prefix("#!") {
            let language = rest.trim().to_string();
            if is_exact_jupyter_language(&language) {
                source.remove(0);
                return Some((language, String::new()));
            }
        }
    } else if let Some(magic) = line.strip_prefix("%%") {
        let (language, magic_args) = match magic.split_once(' ') {
            Some((language, args)) => (language.to_string(), args.to_string()),
            None => (magic.to_string(), String::new()),
        };
        if is_exact_jupyter_language(&language) || is_custom_magic(&language, custom_cell_magics)
        {
            source.remove(0);
            return Some((language, magic_args));
        }
    }
    None
}

/// Prefixes every line with a comment (and suffix), e.g. `# text`.
///
/// Empty lines get the bare prefix.
///
/// # Examples
///
/// ```rust
/// use nbtext::languages::comment_lines;
///
/// let lines = vec!["text".to_string(), String::new()];
/// assert_eq!(comment_lines(&lines, "#", ""), vec!["# text", "#"]);
/// assert_eq!(comment_lines(&lines, "(*", "*)"), vec!["(* text *)", "(* *)"]);
/// ```
#[must_use]
pub fn comment_lines(lines: &[String], prefix: &str, suffix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return lines.to_vec();
    }
    lines
        .iter()
        .map(|line| match (line.is_empty(), suffix.is_empty()) {
            (true, true) => prefix.to_string(),
            (false, true) => format!("{} {}", prefix, line),
            (true, false) => format!("{} {}", prefix, suffix),
            (false, false) => format!("{} {} {}", prefix, line, suffix),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn object(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_default_language() {
        let mut md = Metadata::new();
        assert_eq!(
            default_language_from_metadata_and_ext(&mut md, ".py", false).as_deref(),
            Some("python")
        );
        let mut md = object(metadata!({"kernelspec": {"language": "C#"}}));
        assert_eq!(
            default_language_from_metadata_and_ext(&mut md, ".cs", false).as_deref(),
            Some("csharp")
        );
        assert_eq!(default_language(&Metadata::new(), ".md"), None);
    }

    #[test]
    fn test_pop_main_language() {
        let mut md = object(metadata!({"jupytext": {"main_language": "python"}}));
        default_language_from_metadata_and_ext(&mut md, ".py", true);
        let jupytext = md.get("jupytext").and_then(Value::as_object).unwrap();
        assert!(jupytext.is_empty());
    }

    #[test]
    fn test_main_language_by_plurality() {
        let mut cells = vec![
            Cell::code("1").with_language("R"),
            Cell::code("%%R\n2"),
            Cell::code("3").with_language("bash"),
        ];
        let mut md = Metadata::new();
        set_main_and_cell_language(&mut md, &mut cells, ".md", &[]);
        let jupytext = md.get("jupytext").and_then(Value::as_object).unwrap();
        assert_eq!(jupytext.get_str("main_language"), Some("R"));
        assert_eq!(cells[0].language, None);
        assert_eq!(cells[2].source, "%%bash\n3");
    }

    #[test]
    fn test_python_wins_ties() {
        let mut cells = vec![Cell::code("x").with_language("python"), Cell::code("y").with_language("R")];
        let mut md = Metadata::new();
        set_main_and_cell_language(&mut md, &mut cells, ".md", &[]);
        assert_eq!(cells[0].language, None);
        assert_eq!(cells[1].source, "%%R\ny");
    }

    #[test]
    fn test_cell_language() {
        let mut source = vec!["%%bash -l".to_string(), "ls".to_string()];
        assert_eq!(
            cell_language(&mut source, "python", &[]),
            Some(("bash".to_string(), "-l".to_string()))
        );
        assert_eq!(source, vec!["ls"]);

        let mut source = vec!["%%time".to_string()];
        assert_eq!(cell_language(&mut source, "python", &[]), None);

        let mut source = vec!["%%".to_string()];
        assert_eq!(cell_language(&mut source, "go", &[]), None);
    }
}
