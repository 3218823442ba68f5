use crate::providers::Credentials;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub providers: ProvidersConfig,

    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/leaguevault.db".to_string(),
            log_level: "info".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub espn: EspnConfig,
    pub yahoo: YahooConfig,
    pub fleaflicker: FleaflickerConfig,
}

/// ESPN private leagues need the cookie pair from a logged-in browser
/// session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EspnConfig {
    pub espn_s2: String,
    pub swid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    /// OAuth bearer token. Obtain one via Yahoo's developer console; expired
    /// tokens fail discovery with an auth error.
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleaflickerConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Platform user id recorded as the importer on jobs and memberships.
    pub user_id: i64,

    /// How the importer is named on league rosters, for owner matching.
    pub display_name: Option<String>,

    /// Keep raw provider payloads in the archive table.
    pub archive_raw: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            user_id: 1,
            display_name: None,
            archive_raw: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("leaguevault").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".leaguevault").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.is_empty() {
            anyhow::bail!("general.database_path cannot be empty");
        }
        Ok(())
    }

    /// Configured credentials for a provider. The CSV provider takes its
    /// export text on the command line, not from config.
    #[must_use]
    pub fn credentials_for(&self, provider: &str) -> Credentials {
        match provider {
            "espn" => {
                let espn = &self.providers.espn;
                if espn.espn_s2.is_empty() || espn.swid.is_empty() {
                    Credentials::None
                } else {
                    Credentials::Cookies {
                        espn_s2: espn.espn_s2.clone(),
                        swid: espn.swid.clone(),
                    }
                }
            }
            "yahoo" if !self.providers.yahoo.access_token.is_empty() => Credentials::OAuth {
                access_token: self.providers.yahoo.access_token.clone(),
                refresher: None,
            },
            "fleaflicker" if !self.providers.fleaflicker.api_key.is_empty() => {
                Credentials::ApiKey(self.providers.fleaflicker.api_key.clone())
            }
            _ => Credentials::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.database_path, "sqlite:data/leaguevault.db");
        assert_eq!(config.import.user_id, 1);
        assert!(config.import.archive_raw);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[providers.espn]
espn_s2 = "s2value"
swid = "{SWID}"

[import]
display_name = "Mike Smith"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.credentials_for("espn"),
            Credentials::Cookies { .. }
        ));
        assert_eq!(config.import.display_name.as_deref(), Some("Mike Smith"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn missing_credentials_fall_back_to_none() {
        let config = Config::default();
        assert!(matches!(config.credentials_for("espn"), Credentials::None));
        assert!(matches!(config.credentials_for("yahoo"), Credentials::None));
        assert!(matches!(config.credentials_for("sleeper"), Credentials::None));
    }
}
