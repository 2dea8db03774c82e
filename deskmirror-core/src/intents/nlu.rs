//! Training intent discovery from a Rasa `nlu.yml` file.

use std::path::Path;

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Read the intents defined in a Rasa NLU file, in definition order.
///
/// Blank names are ignored and duplicates keep their first position.
/// A file without an `nlu` list yields no intents.
pub fn load_nlu_intents(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(Error::NluFile(format!(
            "NLU file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    parse_nlu_intents(&content)
}

/// Same as [`load_nlu_intents`] but from YAML text.
pub fn parse_nlu_intents(content: &str) -> Result<Vec<String>> {
    let raw: Value = serde_yaml::from_str(content)?;

    let Some(blocks) = raw.get("nlu").and_then(Value::as_sequence) else {
        return Ok(Vec::new());
    };

    let mut intents: Vec<String> = Vec::new();
    for block in blocks {
        let Some(name) = block.get("intent").and_then(Value::as_str) else {
            continue;
        };
        let name = name.trim();
        if !name.is_empty() && !intents.iter().any(|seen| seen == name) {
            intents.push(name.to_string());
        }
    }

    tracing::debug!(count = intents.len(), "Loaded NLU intents");
    Ok(intents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nlu_intents() {
        let content = r#"
version: "3.1"
nlu:
  - intent: saludo
    examples: |
      - hola
  - intent: despedida
  - intent: saludo
  - intent:
    examples: |
      -
  - synonym: savings
    examples: |
      - pink pig
"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nlu.yml");
        std::fs::write(&path, content).unwrap();

        let intents = load_nlu_intents(&path).unwrap();

        assert_eq!(intents, vec!["saludo", "despedida"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_nlu_intents(&dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, Error::NluFile(_)));
    }

    #[test]
    fn test_no_nlu_section() {
        assert!(parse_nlu_intents("version: \"3.1\"\nrules: []\n")
            .unwrap()
            .is_empty());
        assert!(parse_nlu_intents("nlu: not-a-list\n").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_nlu_intents("nlu: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
