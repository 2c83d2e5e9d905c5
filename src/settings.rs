//! Persisted service settings.
//!
//! The four service settings live in a dotenv file, one `KEY=value` per
//! line. Saving rewrites only the lines for those keys and keeps everything
//! else in the file (comments, unrelated variables) where it was.

use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::SETTING_KEYS;

/// A dotenv file holding the service settings.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the known settings. Keys absent from the file map to "".
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        let mut settings: BTreeMap<String, String> = SETTING_KEYS
            .iter()
            .map(|k| (k.to_string(), String::new()))
            .collect();

        if !self.path.exists() {
            return Ok(settings);
        }

        let entries = dotenvy::from_path_iter(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Failed to parse {}", self.path.display()))?;
            if let Some(slot) = settings.get_mut(&key) {
                *slot = value;
            }
        }

        Ok(settings)
    }

    /// Write the given settings, updating existing lines in place and
    /// appending keys the file does not mention yet.
    pub fn save<I, K, V>(&self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut pending: HashMap<String, String> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (key, value) in updates {
            let key = key.into();
            if !SETTING_KEYS.contains(&key.as_str()) {
                bail!(
                    "Unknown setting '{}'; expected one of {}",
                    key,
                    SETTING_KEYS.join(", ")
                );
            }
            if !pending.contains_key(&key) {
                order.push(key.clone());
            }
            pending.insert(key, value.into());
        }

        let existing = if self.path.exists() {
            fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?
        } else {
            String::new()
        };

        // A key listed more than once keeps its first line; the rest are
        // dropped so every reader sees the saved value.
        let mut written: HashSet<String> = HashSet::new();
        let mut lines: Vec<String> = Vec::new();
        for line in existing.lines() {
            match line_key(line).and_then(|key| pending.get_key_value(key)) {
                Some((key, value)) => {
                    if written.insert(key.clone()) {
                        lines.push(format_entry(key, value));
                    }
                }
                None => lines.push(line.to_string()),
            }
        }
        for key in order {
            if written.contains(&key) {
                continue;
            }
            if let Some(value) = pending.get(&key) {
                lines.push(format_entry(&key, value));
            }
        }

        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// The variable name on a `KEY=value` or `export KEY=value` line.
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}

fn format_entry(key: &str, value: &str) -> String {
    format!("{}={}", key, quote_value(value))
}

/// Quote a value only when dotenv parsing would otherwise change it.
fn quote_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@+,~%".contains(c));
    if plain {
        return value.to_string();
    }
    if !value.contains('\'') && !value.contains('\n') {
        return format!("'{}'", value);
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

/// Mask a secret for display, keeping the last four characters.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FIRECRAWL_API_KEY, LLM_API_KEY, LLM_ENDPOINT, LLM_MODEL_ID};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_empty_settings() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path().join(".env"));

        let settings = file.load().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings.values().all(|v| v.is_empty()));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path().join(".env"));

        file.save([
            (LLM_ENDPOINT, "https://api.example.com/v1"),
            (LLM_API_KEY, "sk-abc123"),
            (LLM_MODEL_ID, "gpt-4o-mini"),
            (FIRECRAWL_API_KEY, "fc-xyz"),
        ])
        .unwrap();

        let settings = file.load().unwrap();
        assert_eq!(settings[LLM_ENDPOINT], "https://api.example.com/v1");
        assert_eq!(settings[LLM_API_KEY], "sk-abc123");
        assert_eq!(settings[LLM_MODEL_ID], "gpt-4o-mini");
        assert_eq!(settings[FIRECRAWL_API_KEY], "fc-xyz");

        let raw = fs::read_to_string(file.path()).unwrap();
        assert!(raw.contains("LLM_MODEL_ID=gpt-4o-mini\n"));
    }

    #[test]
    fn test_save_preserves_unrelated_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# local settings\nRUST_LOG=debug\nLLM_MODEL_ID=old-model\n",
        )
        .unwrap();

        let file = SettingsFile::new(&path);
        file.save([(LLM_MODEL_ID, "new-model"), (LLM_API_KEY, "sk-1")])
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "# local settings\nRUST_LOG=debug\nLLM_MODEL_ID=new-model\nLLM_API_KEY=sk-1\n"
        );
    }

    #[test]
    fn test_save_collapses_duplicate_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "LLM_MODEL_ID=a\nRUST_LOG=info\nLLM_MODEL_ID=b\n").unwrap();

        let file = SettingsFile::new(&path);
        file.save([(LLM_MODEL_ID, "new-model")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "LLM_MODEL_ID=new-model\nRUST_LOG=info\n");
        assert_eq!(file.load().unwrap()[LLM_MODEL_ID], "new-model");
    }

    #[test]
    fn test_save_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path().join(".env"));

        assert!(file.save([("OPENAI_API_KEY", "sk")]).is_err());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_values_with_spaces_survive() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path().join(".env"));

        file.save([(LLM_MODEL_ID, "my model #1")]).unwrap();
        assert_eq!(file.load().unwrap()[LLM_MODEL_ID], "my model #1");
    }

    #[test]
    fn test_line_key() {
        assert_eq!(line_key("LLM_API_KEY=abc"), Some("LLM_API_KEY"));
        assert_eq!(line_key("export LLM_API_KEY = abc"), Some("LLM_API_KEY"));
        assert_eq!(line_key("# LLM_API_KEY=abc"), None);
        assert_eq!(line_key("garbage"), None);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("sk-abcdef"), "*****cdef");
    }
}
