//! Single-line JSON emitter for cell options.
//!
//! Cell options are written inline on marker lines (`# %% tags=["a", "b"]`,
//! ```` ```python echo=false ````), so values are rendered on one line with
//! a space after every `,` and `:`. The JSON itself is written by
//! `serde_json` through [`InlineFormatter`]: non-ASCII characters are written
//! as-is and floats always carry a decimal point or an exponent, so that the
//! relaxed reader gets back a float.
//!
//! ## Usage
//!
//! ```rust
//! use nbtext::{metadata, ser::to_json};
//!
//! let value = metadata!({"number": 1.0, "array": ["a", "b"], "flag": null});
//! assert_eq!(to_json(&value), r#"{"number": 1.0, "array": ["a", "b"], "flag": null}"#);
//! ```

use crate::{Metadata, Number, Value};
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// A compact `serde_json` formatter with a space after every `,` and `:`.
///
/// Floats are written the way the relaxed reader expects to read them back.
/// JSON has no literal for Infinity or NaN, so they are written as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineFormatter;

impl Formatter for InlineFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(format_float(value).as_bytes())
    }
}

fn to_inline_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut output = Vec::with_capacity(64);
    let mut serializer = serde_json::Serializer::with_formatter(&mut output, InlineFormatter);
    // values only have string keys, and writing to a Vec cannot fail
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(output).unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Renders a value as single-line JSON.
#[must_use]
pub fn to_json(value: &Value) -> String {
    to_inline_json(value)
}

/// Renders a metadata object as single-line JSON.
#[must_use]
pub fn metadata_to_json(metadata: &Metadata) -> String {
    to_inline_json(metadata)
}

/// Formats a number the way the relaxed reader expects to read it back.
///
/// # Examples
///
/// ```rust
/// use nbtext::{ser::format_number, Number};
///
/// assert_eq!(format_number(&Number::Float(1.0)), "1.0");
/// assert_eq!(format_number(&Number::Float(1e16)), "1e+16");
/// assert_eq!(format_number(&Number::Float(1.5e-7)), "1.5e-07");
/// assert_eq!(format_number(&Number::Integer(-3)), "-3");
/// ```
#[must_use]
pub fn format_number(number: &Number) -> String {
    match number {
        Number::Integer(i) => i.to_string(),
        Number::Float(f) => format_float(*f),
        Number::Infinity => "Infinity".to_string(),
        Number::NegativeInfinity => "-Infinity".to_string(),
        Number::NaN => "NaN".to_string(),
    }
}

fn format_float(f: f64) -> String {
    // `Debug` already switches to scientific notation at the same magnitudes
    // as the reader's reference formatting; only the exponent differs.
    let repr = format!("{:?}", f);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    #[test]
    fn test_string_escapes() {
        let value = Value::from("a \"quoted\"\nline\\é");
        assert_eq!(to_json(&value), r#""a \"quoted\"\nline\\é""#);
    }

    #[test]
    fn test_nested() {
        let value = metadata!({"a": {"b": [1, true, null]}, "c": "d"});
        assert_eq!(to_json(&value), r#"{"a": {"b": [1, true, null]}, "c": "d"}"#);
    }

    #[test]
    fn test_floats() {
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(100.0), "100.0");
    }

    #[test]
    fn test_non_finite_floats_are_null() {
        let value = Value::Array(vec![Value::from(f64::INFINITY), Value::from(f64::NAN), Value::from(2.0)]);
        assert_eq!(to_json(&value), "[null, null, 2.0]");
    }

    #[test]
    fn test_exponent_floats() {
        assert_eq!(to_json(&Value::from(1e16)), "1e+16");
        assert_eq!(to_json(&metadata!({"small": 1.5e-7})), r#"{"small": 1.5e-07}"#);
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(to_json(&Value::from("\u{1}")), r#""\u0001""#);
    }
}
