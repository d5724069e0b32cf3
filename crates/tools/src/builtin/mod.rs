//! Tools registered in the built-in catalog.

pub mod calculator;
pub mod clock;
pub mod database;
pub mod fibonacci;
pub mod weather;

use ltm_core::error::ToolError;

static NULL: serde_json::Value = serde_json::Value::Null;

/// Read an integer argument. Accepts `{"<key>": 10}`, a bare `10`, or the
/// string forms of either, since engines are loose about argument shapes.
pub(crate) fn integer_arg(arguments: &serde_json::Value, key: &str) -> Result<i64, ToolError> {
    let value = match arguments {
        serde_json::Value::Object(map) => map.get(key).unwrap_or(&NULL),
        other => other,
    };
    let parsed = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be an integer")))
}

/// Read a string argument. Accepts `{"<key>": "x"}` or a bare string.
pub(crate) fn string_arg<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    let found = match arguments {
        serde_json::Value::String(s) => Some(s.as_str()),
        other => other[key].as_str(),
    };
    found
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arg_shapes() {
        assert_eq!(integer_arg(&serde_json::json!({"n": 10}), "n").unwrap(), 10);
        assert_eq!(integer_arg(&serde_json::json!({"n": "12"}), "n").unwrap(), 12);
        assert_eq!(integer_arg(&serde_json::json!(7), "n").unwrap(), 7);
        assert_eq!(integer_arg(&serde_json::json!({"n": 3.0}), "n").unwrap(), 3);
        assert!(integer_arg(&serde_json::json!({"n": 2.5}), "n").is_err());
        assert!(integer_arg(&serde_json::json!({}), "n").is_err());
    }

    #[test]
    fn string_arg_shapes() {
        let args = serde_json::json!({"query": "rust"});
        assert_eq!(string_arg(&args, "query").unwrap(), "rust");
        let bare = serde_json::json!("Paris");
        assert_eq!(string_arg(&bare, "location").unwrap(), "Paris");
        assert!(string_arg(&serde_json::json!({"query": " "}), "query").is_err());
    }
}
