use std::env;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

/// Top-level toggled.toml configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ToggledConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Sled => "sled",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sled" => Ok(StorageBackend::Sled),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

// ── Default value functions ──────────────────────────

fn default_port() -> u16 {
    8080
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Sled
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
            data_dir: default_data_dir(),
            storage: default_storage(),
        }
    }
}

impl ToggledConfig {
    /// Load configuration from a TOML file, falling back to defaults if the file
    /// doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!(path, error = %e, "failed to parse config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // TOGGLED_STORAGE
        if let Some(val) = lookup("TOGGLED_STORAGE") {
            match val.parse() {
                Ok(backend) => self.server.storage = backend,
                Err(e) => warn!(value = %val, "ignoring TOGGLED_STORAGE: {}", e),
            }
        }

        // TOGGLED_PORT
        if let Some(val) = lookup("TOGGLED_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %val, "ignoring invalid TOGGLED_PORT"),
            }
        }

        if let Some(val) = lookup("TOGGLED_HOSTNAME") {
            self.server.hostname = val;
        }

        if let Some(val) = lookup("TOGGLED_DATA_DIR") {
            self.server.data_dir = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_missing() {
        let config = ToggledConfig::load("/nonexistent/toggled.toml");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.hostname, "0.0.0.0");
        assert_eq!(config.server.data_dir, "./data");
        assert_eq!(config.server.storage, StorageBackend::Sled);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = ToggledConfig::parse(
            r#"
[server]
port = 9100
storage = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.storage, StorageBackend::Memory);
        assert_eq!(config.server.data_dir, "./data");
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        assert!(ToggledConfig::parse("[server]\nstorage = \"postgres\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TOGGLED_STORAGE", "MEMORY"),
            ("TOGGLED_PORT", "7001"),
            ("TOGGLED_DATA_DIR", "/var/lib/toggled"),
        ]);
        let mut config = ToggledConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.storage, StorageBackend::Memory);
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.server.data_dir, "/var/lib/toggled");
        assert_eq!(config.server.hostname, "0.0.0.0");
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("TOGGLED_STORAGE", "tape"), ("TOGGLED_PORT", "http")]);
        let mut config = ToggledConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.storage, StorageBackend::Sled);
        assert_eq!(config.server.port, 8080);
    }
}
