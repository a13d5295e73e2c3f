//! Relaxed literal parsing.
//!
//! Cell options are usually JSON, but users write them by hand, so the
//! reader also accepts Python-style literals: single-quoted strings,
//! `True`/`False`/`None`, tuples and trailing commas.
//!
//! ## Overview
//!
//! - **Single pass**: a character cursor with one character of look-ahead
//! - **Whole input**: trailing non-blank text is an error, so `1 + 1` or
//!   `c(1, 2)` are rejected rather than partially read
//! - **Error reporting**: line/column of the offending character
//!
//! ## Usage
//!
//! ```rust
//! use nbtext::de::from_literal;
//! use nbtext::Value;
//!
//! let value = from_literal("['a', \"b\", True, None, (1, 2.5)]").unwrap();
//! assert_eq!(value.to_string(), r#"["a", "b", true, null, [1, 2.5]]"#);
//!
//! assert!(from_literal("{sum(a)}").is_err());
//! ```

use crate::{Error, Metadata, Number, Result, Value};

/// Parses a complete Python-style literal.
///
/// # Errors
///
/// Returns [`Error::Syntax`] when the text is not a single literal.
pub fn from_literal(text: &str) -> Result<Value> {
    let mut deserializer = Deserializer::from_str(text);
    deserializer.skip_whitespace();
    let value = deserializer.parse_value()?;
    deserializer.skip_whitespace();
    if !deserializer.at_end() {
        return Err(deserializer.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Parses JSON first and falls back to Python-style literals.
///
/// # Errors
///
/// Returns the literal parser's error when neither syntax applies.
///
/// # Examples
///
/// ```rust
/// use nbtext::de::from_relaxed_json;
///
/// assert_eq!(from_relaxed_json(" 'value' ").unwrap().as_str(), Some("value"));
/// assert_eq!(from_relaxed_json("5.0").unwrap().to_string(), "5.0");
/// ```
pub fn from_relaxed_json(text: &str) -> Result<Value> {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(_) => from_literal(text),
    }
}

/// The literal parser.
///
/// Created via [`Deserializer::from_str`]; most callers use [`from_literal`].
pub struct Deserializer<'de> {
    input: &'de str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'de> Deserializer<'de> {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'de str) -> Self {
        Deserializer {
            input,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::syntax(self.line, self.column, msg)
    }

    fn rest(&self) -> &'de str {
        &self.input[self.position..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.next_char();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(ch) if ch.is_whitespace()) {
            self.next_char();
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek_char() {
            None => Err(self.error("expected a value")),
            Some('[') => self.parse_sequence('[', ']'),
            Some('(') => self.parse_sequence('(', ')'),
            Some('{') => self.parse_dict(),
            Some('"') | Some('\'') => self.parse_string().map(Value::String),
            Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == '.' => {
                self.parse_number().map(Value::Number)
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.parse_name(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    /// `True`, `False`, `None`, or a prefixed string such as `r'...'`.
    fn parse_name(&mut self) -> Result<Value> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..len];
        let after = rest[len..].chars().next();

        if matches!(after, Some('"') | Some('\''))
            && matches!(name.to_ascii_lowercase().as_str(), "r" | "u")
        {
            let raw = name.eq_ignore_ascii_case("r");
            self.advance(name.chars().count());
            return if raw {
                self.parse_raw_string().map(Value::String)
            } else {
                self.parse_string().map(Value::String)
            };
        }

        let value = match name {
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            "None" => Value::Null,
            _ => return Err(self.error(&format!("malformed literal '{}'", name))),
        };
        self.advance(len);
        Ok(value)
    }

    /// Consumes the opening quote(s) and returns the quote sequence.
    fn open_quote(&mut self) -> Result<&'static str> {
        let quote = match self.next_char() {
            Some('"') => "\"",
            Some('\'') => "'",
            _ => return Err(self.error("expected string")),
        };
        let triple = if quote == "\"" { "\"\"\"" } else { "'''" };
        if self.rest().starts_with(&triple[1..]) {
            self.advance(2);
            return Ok(triple);
        }
        Ok(quote)
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.open_quote()?;
        let mut result = String::new();

        loop {
            if self.rest().starts_with(quote) {
                self.advance(quote.len());
                return Ok(result);
            }
            let ch = match self.next_char() {
                Some(ch) => ch,
                None => return Err(self.error("unterminated string")),
            };
            match ch {
                '\n' if quote.len() == 1 => return Err(self.error("unterminated string")),
                '\\' => self.parse_escape(&mut result)?,
                other => result.push(other),
            }
        }
    }

    fn parse_raw_string(&mut self) -> Result<String> {
        let quote = self.open_quote()?;
        let mut result = String::new();

        loop {
            if self.rest().starts_with(quote) {
                self.advance(quote.len());
                return Ok(result);
            }
            match self.next_char() {
                Some('\\') => {
                    result.push('\\');
                    if let Some(next) = self.next_char() {
                        result.push(next);
                    }
                }
                Some('\n') if quote.len() == 1 => {
                    return Err(self.error("unterminated string"))
                }
                Some(other) => result.push(other),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_escape(&mut self, result: &mut String) -> Result<()> {
        match self.next_char() {
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{0008}'),
            Some('f') => result.push('\u{000C}'),
            Some('0') => result.push('\0'),
            Some('\n') => {}
            Some('x') => result.push(self.parse_hex_escape(2)?),
            Some('u') => result.push(self.parse_hex_escape(4)?),
            Some('U') => result.push(self.parse_hex_escape(8)?),
            Some(other) => {
                // Unknown escapes are kept literally, as Python does
                result.push('\\');
                result.push(other);
            }
            None => return Err(self.error("unexpected end of input in string")),
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.next_char() {
                Some(ch) if ch.is_ascii_hexdigit() => hex.push(ch),
                _ => return Err(self.error("invalid escape sequence")),
            }
        }
        let code_point =
            u32::from_str_radix(&hex, 16).map_err(|_| self.error("invalid escape sequence"))?;
        char::from_u32(code_point).ok_or_else(|| self.error("invalid unicode code point"))
    }

    fn parse_number(&mut self) -> Result<Number> {
        let start = self.position;

        if matches!(self.peek_char(), Some('-') | Some('+')) {
            self.next_char();
        }

        let mut is_float = false;
        let mut digits = 0;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() || ch == '_' {
                digits += 1;
                self.next_char();
            } else if ch == '.' && !is_float {
                is_float = true;
                self.next_char();
            } else if (ch == 'e' || ch == 'E') && digits > 0 {
                is_float = true;
                self.next_char();
                if matches!(self.peek_char(), Some('-') | Some('+')) {
                    self.next_char();
                }
            } else {
                break;
            }
        }
        if digits == 0 {
            return Err(self.error("invalid number"));
        }

        let number_str: String = self.input[start..self.position]
            .chars()
            .filter(|c| *c != '_' && *c != '+')
            .collect();

        if is_float {
            number_str
                .parse::<f64>()
                .map(Number::from)
                .map_err(|_| self.error("invalid float"))
        } else {
            number_str
                .parse::<i64>()
                .map(Number::Integer)
                .or_else(|_| number_str.parse::<f64>().map(Number::Float))
                .map_err(|_| self.error("invalid integer"))
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Result<Value> {
        if self.next_char() != Some(open) {
            return Err(self.error("expected sequence"));
        }
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(close) {
                self.next_char();
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.next_char() {
                Some(',') => continue,
                Some(ch) if ch == close => return Ok(Value::Array(items)),
                Some(_) => return Err(self.error("expected ',' or end of sequence")),
                None => return Err(self.error("unterminated sequence")),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Value> {
        self.next_char();
        let mut map = Metadata::new();
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some('}') {
                self.next_char();
                return Ok(Value::Object(map));
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return Err(self.error("unsupported dictionary key")),
            };
            self.skip_whitespace();
            if self.next_char() != Some(':') {
                return Err(self.error("expected ':' after dictionary key"));
            }
            self.skip_whitespace();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.next_char() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(_) => return Err(self.error("expected ',' or '}'")),
                None => return Err(self.error("unterminated dictionary")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    #[test]
    fn test_python_literals() {
        assert_eq!(from_literal("True").unwrap(), Value::Bool(true));
        assert_eq!(from_literal("None").unwrap(), Value::Null);
        assert_eq!(from_literal("'a'").unwrap(), Value::from("a"));
        assert_eq!(from_literal("-5").unwrap(), Value::from(-5));
        assert_eq!(from_literal("2.5e3").unwrap(), Value::from(2500.0));
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            from_literal("{'a': [1, 2,], \"b\": ('x',)}").unwrap(),
            metadata!({"a": [1, 2], "b": ["x"]})
        );
        assert_eq!(from_literal("[\"a\",5]").unwrap(), metadata!(["a", 5]));
    }

    #[test]
    fn test_strings() {
        assert_eq!(from_literal(r"'it\'s'").unwrap(), Value::from("it's"));
        assert_eq!(from_literal(r"r'\d+'").unwrap(), Value::from(r"\d+"));
        assert_eq!(from_literal("'''a\nb'''").unwrap(), Value::from("a\nb"));
        assert_eq!(from_literal(r"'é'").unwrap(), Value::from("é"));
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(from_literal("{sum(a+c(1,2))>1}").is_err());
        assert!(from_literal("if a==5 then TRUE else FALSE").is_err());
        assert!(from_literal("1 + 1").is_err());
        assert!(from_literal("{{4").is_err());
        assert!(from_literal("'unterminated").is_err());
        assert!(from_literal("").is_err());
    }

    #[test]
    fn test_error_position() {
        match from_literal("[1,\n 2 3]") {
            Err(Error::Syntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_relaxed_json_prefers_json() {
        assert_eq!(from_relaxed_json("{\"a\": true}").unwrap(), metadata!({"a": true}));
        assert_eq!(from_relaxed_json("{'a': True}").unwrap(), metadata!({"a": true}));
    }
}
