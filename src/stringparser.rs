//! Line-by-line tracking of open string literals.
//!
//! Readers must not take a marker-looking line for a cell boundary when it
//! sits inside a multi-line string. [`StringParser`] is fed one line at a
//! time and tells whether the *next* line starts inside a string.
//!
//! This is a heuristic: it knows about quotes, backslash escapes, line
//! comments and (for Python-like languages) triple quotes, and nothing else.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::stringparser::StringParser;
//!
//! let mut parser = StringParser::new(Some("python"));
//! parser = parser.read_line("text = '''multi");
//! assert!(parser.is_quoted());
//! parser = parser.read_line("# %% not a cell");
//! assert!(parser.is_quoted());
//! parser = parser.read_line("line'''");
//! assert!(!parser.is_quoted());
//! ```

use crate::languages::comment_for_language;

/// Quote state at the start of the next line.
///
/// A small `Copy` value: [`StringParser::read_line`] consumes the state and
/// returns the updated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringParser {
    ignore: bool,
    python: bool,
    comment: Option<&'static str>,
    single: Option<char>,
    triple: Option<char>,
}

impl StringParser {
    /// Creates a parser for the given language; `None` disables tracking.
    #[must_use]
    pub fn new(language: Option<&str>) -> Self {
        StringParser {
            ignore: language.is_none(),
            python: language != Some("R"),
            comment: language.and_then(comment_for_language),
            single: None,
            triple: None,
        }
    }

    /// Is the start of the next line inside a string?
    #[inline]
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        !self.ignore && (self.single.is_some() || self.triple.is_some())
    }

    /// Reads one line and returns the updated state.
    #[must_use]
    pub fn read_line(mut self, line: &str) -> Self {
        if self.ignore {
            return self;
        }

        if !self.is_quoted() {
            if let Some(comment) = self.comment {
                if line.trim_start().starts_with(comment) {
                    return self;
                }
            }
        }

        let chars: Vec<char> = line.chars().collect();
        let mut byte_offsets = Vec::with_capacity(chars.len());
        let mut offset = 0;
        for ch in &chars {
            byte_offsets.push(offset);
            offset += ch.len_utf8();
        }

        // Index of the last quote that opened or closed a triple quote
        let mut triple_start: isize = -1;

        for (i, &ch) in chars.iter().enumerate() {
            if self.single.is_none() && self.triple.is_none() {
                if let Some(comment) = self.comment {
                    if line[byte_offsets[i]..].starts_with(comment) {
                        break;
                    }
                }
            }
            if ch != '"' && ch != '\'' {
                continue;
            }
            if i > 0 && chars[i - 1] == '\\' {
                continue;
            }
            if self.single == Some(ch) {
                self.single = None;
                continue;
            }
            if self.single.is_some() {
                continue;
            }

            if self.python
                && i >= 2
                && chars[i - 2] == ch
                && chars[i - 1] == ch
                && i as isize >= triple_start + 3
            {
                if self.triple == Some(ch) {
                    self.triple = None;
                    triple_start = i as isize;
                    continue;
                }
                if self.triple.is_some() {
                    continue;
                }
                self.triple = Some(ch);
                triple_start = i as isize;
                continue;
            }

            if self.triple.is_some() {
                continue;
            }
            self.single = Some(ch);
        }

        // Python strings cannot span lines without triple quotes
        if self.python {
            self.single = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted_lines(language: &str, text: &str) -> Vec<usize> {
        let mut quoted = Vec::new();
        let mut parser = StringParser::new(Some(language));
        for (i, line) in text.lines().enumerate() {
            if parser.is_quoted() {
                quoted.push(i);
            }
            parser = parser.read_line(line);
        }
        quoted
    }

    #[test]
    fn test_long_string() {
        let text = "'''This is a multiline\ncomment with \"quotes\", 'single quotes'\n# and comments\nand line breaks\n\n\nand it ends here'''\n\n\n1 + 1\n";
        assert_eq!(quoted_lines("python", text), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_single_chars() {
        let text = "'This is a single line comment'''\n'and another one'\n# and comments\n\"and line breaks\"\n\n\n\"and it ends here'''\"\n\n\n1 + 1\n";
        assert!(quoted_lines("python", text).is_empty());
    }

    #[test]
    fn test_long_string_with_four_quotes() {
        let text = "''''This is a multiline\ncomment that starts with four quotes\n'''\n\n1 + 1\n";
        assert_eq!(quoted_lines("python", text), vec![1, 2]);
    }

    #[test]
    fn test_long_string_ends_with_four_quotes() {
        let text = "'''This is a multiline\ncomment that ends with four quotes\n''''\n\n1 + 1\n";
        assert_eq!(quoted_lines("python", text), vec![1, 2]);
    }

    #[test]
    fn test_quotes_in_comments_are_ignored() {
        let text = "x = 1  # it's fine\n# don't\ny = 2\n";
        assert!(quoted_lines("python", text).is_empty());
    }

    #[test]
    fn test_r_strings_span_lines() {
        let text = "x <- \"first\nsecond\"\ny <- 1\n";
        assert_eq!(quoted_lines("R", text), vec![1]);
    }

    #[test]
    fn test_no_language_never_quoted() {
        let parser = StringParser::new(None).read_line("'''");
        assert!(!parser.is_quoted());
    }
}
