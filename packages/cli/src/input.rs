//! Reading raw inputs from files and stdin.

use std::io::Read as _;
use std::path::Path;

use boxtrack_normalize_models::RawInput;

/// Reads the whole file, or stdin when no path is given.
///
/// # Errors
///
/// * If the file or stdin cannot be read
pub fn read_text(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Parses a batch file: either a JSON array of inputs or one input per
/// line. Blank lines are skipped.
///
/// # Errors
///
/// * If the text is neither a JSON array nor JSON lines of inputs
pub fn parse_batch(text: &str) -> Result<Vec<RawInput>, serde_json::Error> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text);
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use boxtrack_normalize_models::{InputHint, RawContent};
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_json_array() {
        let text = json!([
            { "content": "MSCU1234566 на станции Гончарово" },
            { "content": { "container": "CSQU3054383" }, "hint": "json" },
        ])
        .to_string();

        let inputs = parse_batch(&text).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(matches!(inputs[0].content, RawContent::Text(_)));
        assert!(matches!(inputs[1].content, RawContent::Object(_)));
        assert_eq!(inputs[1].hint, Some(InputHint::Json));
    }

    #[test]
    fn parses_json_lines() {
        let text = "{\"content\": \"MSCU1234566 в пути\"}\n\n{\"content\": [\"a\", \"b\"]}\n";
        let inputs = parse_batch(text).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(matches!(inputs[1].content, RawContent::Array(_)));
    }

    #[test]
    fn metadata_is_read() {
        let text = json!([{
            "content": "в пути",
            "metadata": { "fromEmail": "ops@example.com", "subject": "MSCU1234566" },
        }])
        .to_string();

        let inputs = parse_batch(&text).unwrap();
        assert_eq!(
            inputs[0].metadata.from_email.as_deref(),
            Some("ops@example.com")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_batch("not json").is_err());
    }
}
