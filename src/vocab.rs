use std::collections::HashMap;
use std::path::Path;

use crate::error::DsError;

/// Tokens that never carry a language prefix.
const LANGUAGE_NEUTRAL_TOKENS: [&str; 2] = ["SP", "AP"];

/// Phoneme and language id tables for one model family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub phonemes: HashMap<String, i64>,
    pub languages: HashMap<String, i64>,
}

impl Vocabulary {
    /// Loads the phoneme table (JSON object for `.json` files, one token per
    /// line otherwise) and, when given, the language id table.
    pub fn load(phonemes: &Path, languages: Option<&Path>) -> Result<Self, DsError> {
        let phonemes = if is_json_path(phonemes) {
            load_json_table(phonemes, "read phoneme dictionary")?
        } else {
            load_phoneme_lines(phonemes)?
        };
        let languages = match languages {
            Some(path) => load_json_table(path, "read language dictionary")?,
            None => HashMap::new(),
        };
        tracing::debug!(
            phonemes = phonemes.len(),
            languages = languages.len(),
            "vocabulary loaded"
        );
        Ok(Self {
            phonemes,
            languages,
        })
    }

    pub fn is_multi_language(&self) -> bool {
        !self.languages.is_empty()
    }

    /// Tries `language/token`, then the bare token, then falls back to id 0.
    pub fn token_id(&self, token: &str, language: &str) -> i64 {
        if !language.is_empty() && !LANGUAGE_NEUTRAL_TOKENS.contains(&token) {
            if let Some(&id) = self.phonemes.get(&format!("{language}/{token}")) {
                return id;
            }
        }
        self.phonemes.get(token).copied().unwrap_or(0)
    }

    pub fn language_id(&self, language: &str) -> i64 {
        self.languages.get(language).copied().unwrap_or(0)
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_phoneme_lines(path: &Path) -> Result<HashMap<String, i64>, DsError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| DsError::model_load("read phoneme list", format!("{}: {e}", path.display())))?;
    let mut table = HashMap::new();
    // `lines` already strips a trailing `\r`.
    for (id, line) in data.lines().enumerate() {
        table.entry(line.to_string()).or_insert(id as i64);
    }
    Ok(table)
}

fn load_json_table(path: &Path, context: &'static str) -> Result<HashMap<String, i64>, DsError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| DsError::model_load(context, format!("{}: {e}", path.display())))?;
    serde_json::from_str(&data)
        .map_err(|e| DsError::model_load(context, format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary {
            phonemes: HashMap::from([
                ("SP".to_string(), 1),
                ("a".to_string(), 2),
                ("ja/a".to_string(), 3),
            ]),
            languages: HashMap::from([("ja".to_string(), 1), ("zh".to_string(), 2)]),
        }
    }

    #[test]
    fn token_lookup_prefers_language_prefix() {
        let v = vocab();
        assert_eq!(v.token_id("a", "ja"), 3);
        assert_eq!(v.token_id("a", "zh"), 2);
        assert_eq!(v.token_id("a", ""), 2);
        assert_eq!(v.token_id("SP", "ja"), 1);
        assert_eq!(v.token_id("missing", "ja"), 0);
    }

    #[test]
    fn unknown_language_maps_to_zero() {
        assert_eq!(vocab().language_id("en"), 0);
        assert_eq!(vocab().language_id("zh"), 2);
    }

    #[test]
    fn loads_line_based_phonemes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("phonemes.txt");
        std::fs::write(&path, "<PAD>\r\nSP\r\nAP\na\na\n").expect("write");
        let v = Vocabulary::load(&path, None).expect("load");
        assert_eq!(v.phonemes["<PAD>"], 0);
        assert_eq!(v.phonemes["SP"], 1);
        assert_eq!(v.phonemes["a"], 3);
        assert!(!v.is_multi_language());
    }

    #[test]
    fn loads_json_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phonemes = dir.path().join("phonemes.JSON");
        let languages = dir.path().join("languages.json");
        std::fs::write(&phonemes, r#"{"SP": 1, "ja/a": 7}"#).expect("write");
        std::fs::write(&languages, r#"{"ja": 1}"#).expect("write");
        let v = Vocabulary::load(&phonemes, Some(&languages)).expect("load");
        assert_eq!(v.token_id("a", "ja"), 7);
        assert!(v.is_multi_language());
    }

    #[test]
    fn missing_file_is_a_model_load_error() {
        let err = Vocabulary::load(Path::new("/nonexistent/phonemes.txt"), None)
            .expect_err("missing");
        assert_eq!(err.code(), crate::error::StatusCode::ModelLoadError);
    }
}
