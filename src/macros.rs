/// Builds a [`Value`](crate::Value) from a JSON-like literal.
///
/// Objects become [`Value::Object`](crate::Value::Object) with keys in the
/// order written, which makes the macro convenient for cell metadata in tests.
///
/// # Examples
///
/// ```rust
/// use nbtext::{metadata, Value};
///
/// let md = metadata!({"name": "plot_1", "dpi": 72, "tags": ["remove_input"], "echo": null});
/// let obj = md.as_object().unwrap();
/// assert_eq!(obj.get("dpi"), Some(&Value::from(72)));
/// assert_eq!(obj.keys().next().map(String::as_str), Some("name"));
/// ```
#[macro_export]
macro_rules! metadata {
    (null) => {
        $crate::Value::Null
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::Array(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::Array(vec![$($crate::metadata!($elem)),*])
    };

    ({}) => {
        $crate::Value::Object($crate::Metadata::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut object = $crate::Metadata::new();
        $(
            object.insert($key.to_string(), $crate::metadata!($value));
        )*
        $crate::Value::Object(object)
    }};

    ($s:expr) => {
        $crate::Value::from($s)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Metadata, Number, Value};

    #[test]
    fn test_metadata_macro_primitives() {
        assert_eq!(metadata!(null), Value::Null);
        assert_eq!(metadata!(true), Value::Bool(true));
        assert_eq!(metadata!(42), Value::Number(Number::Integer(42)));
        assert_eq!(metadata!(1.0), Value::Number(Number::Float(1.0)));
        assert_eq!(metadata!("R"), Value::String("R".to_string()));
    }

    #[test]
    fn test_metadata_macro_nested() {
        assert_eq!(metadata!({}), Value::Object(Metadata::new()));

        let md = metadata!({
            "jupytext": {"main_language": "python"},
            "tags": ["a", "b"]
        });
        let obj = md.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(
            obj.get("tags"),
            Some(&Value::Array(vec![Value::from("a"), Value::from("b")]))
        );
    }
}
