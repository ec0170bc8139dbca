//! Configuration Loader
//!
//! Builds `Settings` from defaults, an optional JSON file, and the environment.

use crate::config::settings::Settings;
use crate::error::{FolioError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    settings: Settings,
}

impl ConfigLoader {
    /// Load from default file locations and the process environment
    pub fn new() -> Result<Self> {
        let mut loader = Self {
            settings: Settings::default(),
        };

        if let Some(path) = Self::get_config_paths().into_iter().find(|p| p.exists()) {
            loader.load_from_file(&path)?;
        }

        loader.apply_env(|name| std::env::var(name).ok())?;
        Ok(loader)
    }

    /// Create a loader with a specific config file (environment still applies)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self {
            settings: Settings::default(),
        };

        loader.load_from_file(path)?;
        loader.apply_env(|name| std::env::var(name).ok())?;

        Ok(loader)
    }

    /// Get list of config paths to check, highest priority first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(custom_path) = std::env::var("FOLIO_CONFIG_PATH") {
            paths.push(PathBuf::from(custom_path));
        }

        paths.push(PathBuf::from("folio.json"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("folio-relay").join("config.json"));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FolioError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            FolioError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        let keys = std::mem::take(&mut self.settings.ai.api_keys);
        self.settings.ai.api_keys = normalize_keys(keys);

        tracing::debug!(path = %path.display(), "loaded settings file");
        Ok(())
    }

    /// Overlay environment variables onto the current settings
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &mut self.settings;

        if let Some(raw) = lookup("OPENAI_API_KEYS") {
            s.ai.api_keys = parse_key_list(&raw);
        }
        if let Some(v) = lookup("AI_COMPLETION_URL") {
            s.ai.completion_url = v;
        }
        if let Some(v) = lookup("AI_MODEL") {
            s.ai.model = v;
        }
        if let Some(v) = lookup("AI_TEMPERATURE") {
            s.ai.temperature = parse_env("AI_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("AI_MAX_TOKENS") {
            s.ai.max_tokens = parse_env("AI_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("AI_TIMEOUT_SECS") {
            s.ai.timeout_secs = parse_env("AI_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RESEND_API_KEY") {
            s.contact.resend_api_key = Some(v).filter(|k| !k.trim().is_empty());
        }
        if let Some(v) = lookup("CONTACT_EMAIL") {
            s.contact.contact_email = v;
        }
        if let Some(v) = lookup("EMAIL_FROM") {
            s.contact.email_from = v;
        }
        if let Some(v) = lookup("RATE_LIMIT_ENABLED") {
            s.contact.rate_limit_enabled = parse_env("RATE_LIMIT_ENABLED", &v)?;
        }
        if let Some(v) = lookup("CONTACT_FORM_RATE_LIMIT") {
            s.contact.rate_limit = v;
        }
        if let Some(v) = lookup("ENVIRONMENT") {
            s.environment = v;
        }
        if let Some(v) = lookup("HOST") {
            s.host = v;
        }
        if let Some(v) = lookup("PORT") {
            s.port = parse_env("PORT", &v)?;
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate and take ownership of the configuration
    pub fn into_settings(self) -> Result<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    normalize_keys(raw.split(','))
}

/// Trim every key and drop the blank ones
pub fn normalize_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FolioError::Config(format!("Invalid {}='{}': {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn loader() -> ConfigLoader {
        ConfigLoader {
            settings: Settings::default(),
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(
            parse_key_list(" k1, k2 ,,k3 ,"),
            vec!["k1".to_string(), "k2".to_string(), "k3".to_string()]
        );
        assert!(parse_key_list(" , ").is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = loader();
        loader
            .apply_env(env(&[
                ("OPENAI_API_KEYS", "a,b"),
                ("AI_MODEL", "open-mistral-nemo"),
                ("AI_MAX_TOKENS", "256"),
                ("PORT", "9001"),
                ("RESEND_API_KEY", ""),
                ("ENVIRONMENT", "production"),
            ]))
            .unwrap();

        let settings = loader.into_settings().unwrap();
        assert_eq!(settings.ai.api_keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(settings.ai.model, "open-mistral-nemo");
        assert_eq!(settings.ai.max_tokens, 256);
        assert_eq!(settings.port, 9001);
        assert!(settings.contact.resend_api_key.is_none());
        assert!(!settings.is_development());
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut loader = loader();
        let err = loader.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, FolioError::Config(_)));
    }

    #[test]
    fn test_empty_key_pool_is_fatal() {
        let mut loader = loader();
        loader.apply_env(env(&[("OPENAI_API_KEYS", " , ")])).unwrap();
        assert!(matches!(loader.into_settings(), Err(FolioError::Config(_))));
    }

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "environment": "production",
                "ai": {{ "api_keys": ["file-key"], "timeout_secs": 10 }},
                "monitor": {{ "interval_secs": 5 }}
            }}"#
        )
        .unwrap();

        let mut loader = loader();
        loader.load_from_file(file.path()).unwrap();
        loader.apply_env(env(&[("AI_TIMEOUT_SECS", "12")])).unwrap();

        let settings = loader.into_settings().unwrap();
        assert_eq!(settings.ai.api_keys, vec!["file-key".to_string()]);
        assert_eq!(settings.ai.timeout_secs, 12);
        assert_eq!(settings.monitor.interval_secs, 5);
        assert_eq!(settings.environment, "production");
    }

    #[test]
    fn test_file_keys_are_trimmed_and_blanks_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "ai": {{ "api_keys": ["good", "", " padded ", "   "] }} }}"#).unwrap();

        let mut loader = loader();
        loader.load_from_file(file.path()).unwrap();

        let settings = loader.into_settings().unwrap();
        assert_eq!(
            settings.ai.api_keys,
            vec!["good".to_string(), "padded".to_string()]
        );
    }

    #[test]
    fn test_file_with_only_blank_keys_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "ai": {{ "api_keys": ["", "  "] }} }}"#).unwrap();

        let mut loader = loader();
        loader.load_from_file(file.path()).unwrap();
        assert!(matches!(loader.into_settings(), Err(FolioError::Config(_))));
    }

    #[test]
    fn test_unparsable_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let mut loader = loader();
        assert!(matches!(
            loader.load_from_file(file.path()),
            Err(FolioError::Config(_))
        ));
    }
}
