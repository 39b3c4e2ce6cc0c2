//! Configuration management for BookHive clients.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://project.supabase.co",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Table holding the catalog records.
pub const DEFAULT_RECORDS_TABLE: &str = "books";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to ship in clients).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Name of the owner-scoped records table.
    #[serde(default = "default_records_table")]
    pub records_table: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_records_table() -> String {
    DEFAULT_RECORDS_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            records_table: default_records_table(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `BOOKHIVE_*` overrides using `lookup` to read variables.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = read("BOOKHIVE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = read("BOOKHIVE_SUPABASE_URL") {
            self.supabase_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = read("BOOKHIVE_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Some(table) = read("BOOKHIVE_RECORDS_TABLE") {
            self.records_table = table;
        }
    }

    /// Check the values that would otherwise fail much later at request time.
    pub fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::Config("supabase_anon_key is empty".to_string()));
        }
        if self.records_table.trim().is_empty() {
            return Err(CoreError::Config("records_table is empty".to_string()));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.supabase_url, DEFAULT_SUPABASE_URL);
        assert_eq!(config.supabase_anon_key, DEFAULT_SUPABASE_ANON_KEY);
        assert_eq!(config.records_table, "books");
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.records_table, DEFAULT_RECORDS_TABLE);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            supabase_url: "https://abc.supabase.co".to_string(),
            supabase_anon_key: "anon".to_string(),
            records_table: "books".to_string(),
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.records_table, DEFAULT_RECORDS_TABLE);
    }

    #[test]
    fn test_overrides_replace_values_and_skip_blank() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BOOKHIVE_LOG_LEVEL", "warn"),
            ("BOOKHIVE_SUPABASE_URL", "https://xyz.supabase.co/"),
            ("BOOKHIVE_SUPABASE_ANON_KEY", "   "),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.supabase_url, "https://xyz.supabase.co");
        assert_eq!(config.supabase_anon_key, DEFAULT_SUPABASE_ANON_KEY);
    }

    #[test]
    fn test_config_supabase_url_parse() {
        let config = Config::default();
        let url = config.supabase_url().unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_validate_rejects_invalid_url() {
        let config = Config {
            supabase_url: "not a valid url".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let config = Config {
            records_table: " ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
