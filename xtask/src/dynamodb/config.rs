//! Registry loading and command-line value parsing (Functional Core - pure).

use std::path::Path;

use ddbgate::ddbgate_core::{NativeValue, Number, TableRegistry};

use super::error::{DynamodbError, Result};

/// Default registry file, relative to the working directory.
pub const DEFAULT_REGISTRY_PATH: &str = "tables.json";

/// Reads a `{"tables": [...]}` registry file.
pub fn load_registry(path: &Path) -> Result<TableRegistry> {
    let text = std::fs::read_to_string(path)?;
    Ok(TableRegistry::from_json(&text)?)
}

/// Parses a typed command-line value.
///
/// `n:` marks a number, `s:` forces a string. Anything else is a string.
pub fn parse_value(raw: &str) -> Result<NativeValue> {
    if let Some(number) = raw.strip_prefix("n:") {
        return Ok(NativeValue::Number(Number::parse(number)?));
    }
    if let Some(text) = raw.strip_prefix("s:") {
        return Ok(NativeValue::String(text.to_string()));
    }
    Ok(NativeValue::String(raw.to_string()))
}

/// Splits `placeholder=value`, requiring the placeholder to start with `prefix`.
pub fn parse_binding<'a>(raw: &'a str, prefix: char) -> Result<(&'a str, &'a str)> {
    let (placeholder, value) = raw.split_once('=').ok_or_else(|| {
        DynamodbError::InvalidArgument(format!("expected {prefix}name=value, got '{raw}'"))
    })?;
    if !placeholder.starts_with(prefix) || placeholder.len() < 2 {
        return Err(DynamodbError::InvalidArgument(format!(
            "placeholder '{placeholder}' must start with '{prefix}'"
        )));
    }
    Ok((placeholder, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_defaults_to_string() {
        assert_eq!(parse_value("GROUP#DEV").unwrap(), "GROUP#DEV".into());
        assert_eq!(parse_value("s:42").unwrap(), "42".into());
    }

    #[test]
    fn test_parse_value_number() {
        assert_eq!(parse_value("n:42").unwrap(), 42_i64.into());
        assert!(matches!(
            parse_value("n:forty"),
            Err(DynamodbError::Core(_))
        ));
    }

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding(":pk=GROUP#DEV", ':').unwrap(), (":pk", "GROUP#DEV"));
        assert_eq!(parse_binding("#sk=SK", '#').unwrap(), ("#sk", "SK"));
        // Only the first '=' splits.
        assert_eq!(parse_binding(":v=a=b", ':').unwrap(), (":v", "a=b"));
    }

    #[test]
    fn test_parse_binding_rejects_malformed() {
        assert!(parse_binding(":pk", ':').is_err());
        assert!(parse_binding("pk=x", ':').is_err());
        assert!(parse_binding(":=x", ':').is_err());
    }

    #[test]
    fn test_load_registry_missing_file() {
        let result = load_registry(Path::new("/nonexistent/tables.json"));
        assert!(matches!(result, Err(DynamodbError::Io(_))));
    }
}
