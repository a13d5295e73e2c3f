//! Error types for notebook conversion.
//!
//! Conversions fail loudly in only a few situations; everything else is
//! degraded gracefully (for instance, cell metadata that cannot be parsed is
//! kept verbatim as an opaque blob instead of raising).
//!
//! ## Error Categories
//!
//! - **Chunk option errors**: unbalanced brackets or quotes in R Markdown
//!   chunk options, or a value with no option name
//! - **Syntax errors**: invalid literals in the relaxed literal parser, with
//!   line/column information
//! - **Format errors**: unknown `(extension, format_name)` combinations or a
//!   malformed format string
//! - **Header errors**: YAML front matter that cannot be parsed
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::{reads, Error, Format};
//!
//! let fmt: Format = "Rmd".parse().unwrap();
//! let result = reads("```{r a={)}\n1 + 1\n```\n", &fmt);
//! assert!(matches!(result, Err(Error::ChunkOptions { .. })));
//! ```

use std::fmt;
use thiserror::Error;

/// The kind of imbalance found while splitting R Markdown chunk options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imbalance {
    /// A `)` with no matching `(`.
    ClosingParenthesis,
    /// A `}` with no matching `{`.
    ClosingCurlyBracket,
    /// A `]` with no matching `[`.
    ClosingSquareBracket,
    /// An expression still open (bracket or quote) at the end of the options.
    Unterminated,
    /// A value given without an option name, e.g. `name, name2`.
    MissingName,
}

impl fmt::Display for Imbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Imbalance::ClosingParenthesis => "too many closing parentheses",
            Imbalance::ClosingCurlyBracket => "too many closing curly brackets",
            Imbalance::ClosingSquareBracket => "too many closing square brackets",
            Imbalance::Unterminated => "option is not properly terminated",
            Imbalance::MissingName => "no name for option value",
        };
        f.write_str(msg)
    }
}

/// Represents all possible errors that can occur while reading or writing
/// a text notebook.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Structural error in R Markdown / knitr spin chunk options
    #[error("Invalid chunk options '{options}': {kind}")]
    ChunkOptions { options: String, kind: Imbalance },

    /// Syntax error in a literal value, with position
    #[error("Syntax error at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// The format name is not registered for the extension
    #[error("Format '{format_name}' is not associated to extension '{extension}'. Please choose one of: {alternatives}.")]
    UnknownFormat {
        format_name: String,
        extension: String,
        alternatives: String,
    },

    /// No dialect at all handles the extension
    #[error("No format associated to extension '{0}'")]
    UnsupportedExtension(String),

    /// The format string itself could not be understood
    #[error("Invalid format '{0}'")]
    InvalidFormat(String),

    /// The YAML header could not be parsed
    #[error("Invalid notebook header: {0}")]
    Header(String),

    /// A reader failed to consume any line
    #[error("The {dialect} reader made no progress at line {line}")]
    NoProgress { dialect: &'static str, line: usize },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Creates a syntax error with line and column information.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::Error;
    ///
    /// let err = Error::syntax(1, 5, "unterminated string");
    /// assert!(err.to_string().contains("column 5"));
    /// ```
    pub fn syntax(line: usize, col: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            col,
            msg: msg.to_string(),
        }
    }

    /// Creates a chunk option error for the given option text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::error::{Error, Imbalance};
    ///
    /// let err = Error::chunk_options("a={)", Imbalance::ClosingParenthesis);
    /// assert!(err.to_string().contains("too many closing parentheses"));
    /// ```
    pub fn chunk_options(options: &str, kind: Imbalance) -> Self {
        Error::ChunkOptions {
            options: options.to_string(),
            kind,
        }
    }

    /// Creates a custom error from any displayable message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Returns `true` when the error comes from chunk option parsing.
    #[must_use]
    pub const fn is_chunk_options(&self) -> bool {
        matches!(self, Error::ChunkOptions { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Header(err.to_string())
    }
}

/// A specialized `Result` type for notebook conversions.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imbalance_messages() {
        let err = Error::chunk_options("a=}", Imbalance::ClosingCurlyBracket);
        assert_eq!(
            err.to_string(),
            "Invalid chunk options 'a=}': too many closing curly brackets"
        );
        assert!(err.is_chunk_options());
    }

    #[test]
    fn test_unknown_format_lists_alternatives() {
        let err = Error::UnknownFormat {
            format_name: "spin".to_string(),
            extension: ".py".to_string(),
            alternatives: "light, nomarker, percent".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'spin'"));
        assert!(msg.contains("light, nomarker, percent"));
    }
}
