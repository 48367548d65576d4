//! Gateway configuration
//!
//! Loaded once at startup from a JSON file. Without a file, a built-in
//! provider table is used and providers whose credentials are absent from
//! the environment are skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::get_db_path;
use crate::error::{Error, Result};
use crate::services::providers::{AdapterKind, CostRule, ScrapeCostTable};
use crate::services::quota::{Capability, QuotaWindow};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_INVOKE_TIMEOUT_SECS: u64 = 30;
pub const MAX_INVOKE_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 1000;
pub const DEFAULT_SEARCH_CACHE_TTL_SECS: u64 = 900;

const CONFIG_ENV: &str = "QUOTAGATE_CONFIG";
const DB_PATH_ENV: &str = "QUOTAGATE_DB_PATH";

/// One provider entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: AdapterKind,
    pub capability: Capability,
    #[serde(default)]
    pub priority: u32,
    pub limit: i64,
    pub window: QuotaWindow,
    #[serde(default)]
    pub cost: CostRule,
    /// Environment variable holding the API key
    pub credential_env: String,
    /// Environment variable holding the Google CSE engine id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_id_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    BuiltIn,
    File(PathBuf),
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default = "default_invoke_timeout_secs")]
    pub invoke_timeout_secs: u64,
    #[serde(default = "default_event_buffer_capacity")]
    pub event_buffer_capacity: usize,
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(skip)]
    pub source: ConfigSource,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_invoke_timeout_secs() -> u64 {
    DEFAULT_INVOKE_TIMEOUT_SECS
}

fn default_event_buffer_capacity() -> usize {
    DEFAULT_EVENT_BUFFER_CAPACITY
}

fn default_search_cache_ttl_secs() -> u64 {
    DEFAULT_SEARCH_CACHE_TTL_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: None,
            invoke_timeout_secs: DEFAULT_INVOKE_TIMEOUT_SECS,
            event_buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
            search_cache_ttl_secs: DEFAULT_SEARCH_CACHE_TTL_SECS,
            providers: default_providers(),
            source: ConfigSource::BuiltIn,
        }
    }
}

impl GatewayConfig {
    /// Load configuration.
    ///
    /// Resolution order: `explicit` path, then `QUOTAGATE_CONFIG`, then the
    /// default config file if it exists, then the built-in table. A path given
    /// explicitly or via the environment must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(shellexpand::tilde(&path).into_owned());
            return Self::from_file(&path);
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        log::info!("[config] no config file found, using built-in provider table");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_json_str(&raw)?;
        config.source = ConfigSource::File(path.to_path_buf());
        log::info!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.invoke_timeout_secs == 0 {
            return Err(Error::config("invoke_timeout_secs must be at least 1"));
        }
        if self.invoke_timeout_secs > MAX_INVOKE_TIMEOUT_SECS {
            return Err(Error::config(format!(
                "invoke_timeout_secs must be at most {}",
                MAX_INVOKE_TIMEOUT_SECS
            )));
        }
        for provider in &self.providers {
            if provider.kind.capability() != provider.capability {
                return Err(Error::config(format!(
                    "provider {}: kind {} cannot serve {}",
                    provider.name, provider.kind, provider.capability
                )));
            }
            if provider.limit < 0 {
                return Err(Error::config(format!(
                    "provider {}: limit must not be negative",
                    provider.name
                )));
            }
        }
        Ok(())
    }

    /// Missing credentials are fatal only for explicitly configured providers
    pub fn is_from_file(&self) -> bool {
        matches!(self.source, ConfigSource::File(_))
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }

    /// Database location: `QUOTAGATE_DB_PATH`, then `database_path`, then the
    /// platform data directory.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if std::env::var(DB_PATH_ENV).is_err() {
            if let Some(path) = &self.database_path {
                return Ok(PathBuf::from(shellexpand::tilde(path).into_owned()));
            }
        }
        get_db_path()
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "quotagate", "Quotagate")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

/// Built-in provider table
pub fn default_providers() -> Vec<ProviderConfig> {
    let search = |name: &str, kind, priority, limit, window, env: &str| ProviderConfig {
        name: name.to_string(),
        kind,
        capability: Capability::Search,
        priority,
        limit,
        window,
        cost: CostRule::Flat(1),
        credential_env: env.to_string(),
        engine_id_env: None,
        base_url: None,
    };
    let scrape = |name: &str, kind, priority, limit, env: &str| ProviderConfig {
        name: name.to_string(),
        kind,
        capability: Capability::Scrape,
        priority,
        limit,
        window: QuotaWindow::Month,
        cost: CostRule::ScrapeTable(ScrapeCostTable::default()),
        credential_env: env.to_string(),
        engine_id_env: None,
        base_url: None,
    };

    let mut google = search("google", AdapterKind::GoogleCse, 1, 100, QuotaWindow::Day, "GOOGLE_API_KEY");
    google.engine_id_env = Some("GOOGLE_CSE_ID".to_string());

    vec![
        google,
        search("brave", AdapterKind::Brave, 2, 2000, QuotaWindow::Month, "BRAVE_API"),
        search("serper", AdapterKind::Serper, 3, 2500, QuotaWindow::Month, "SERPER_API_KEY"),
        scrape("webscraping_ai", AdapterKind::WebscrapingAi, 1, 2000, "WEBSCRAPING_API_KEY"),
        scrape("scrapingant", AdapterKind::Scrapingant, 2, 10000, "SCRAPINGANT_API_KEY"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ENV_MUTEX;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.invoke_timeout(), Duration::from_secs(30));
        assert_eq!(config.event_buffer_capacity, 1000);
        assert_eq!(config.search_cache_ttl(), Duration::from_secs(900));
        assert_eq!(config.providers.len(), 5);
        assert!(!config.is_from_file());
    }

    #[test]
    fn test_default_table_limits() {
        let limits: Vec<(String, i64, QuotaWindow)> = default_providers()
            .into_iter()
            .map(|p| (p.name, p.limit, p.window))
            .collect();
        assert_eq!(
            limits,
            vec![
                ("google".to_string(), 100, QuotaWindow::Day),
                ("brave".to_string(), 2000, QuotaWindow::Month),
                ("serper".to_string(), 2500, QuotaWindow::Month),
                ("webscraping_ai".to_string(), 2000, QuotaWindow::Month),
                ("scrapingant".to_string(), 10000, QuotaWindow::Month),
            ]
        );
    }

    #[test]
    fn test_parse_minimal_file() {
        let config = GatewayConfig::from_json_str(
            r#"{
                "bind": "0.0.0.0:9000",
                "providers": [
                    {"name": "brave", "kind": "brave", "capability": "search",
                     "limit": 50, "window": "daily", "credential_env": "BRAVE_API"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.invoke_timeout_secs, 30);
        assert_eq!(config.providers.len(), 1);
        let brave = &config.providers[0];
        assert_eq!(brave.window, QuotaWindow::Day);
        assert_eq!(brave.cost, CostRule::Flat(1));
        assert_eq!(brave.priority, 0);
    }

    #[test]
    fn test_kind_capability_mismatch_rejected() {
        let err = GatewayConfig::from_json_str(
            r#"{"providers": [{"name": "x", "kind": "scrapingant", "capability": "search",
                "limit": 1, "window": "day", "credential_env": "X"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot serve search"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = GatewayConfig::from_json_str(
            r#"{"providers": [{"name": "x", "kind": "bing", "capability": "search",
                "limit": 1, "window": "day", "credential_env": "X"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(GatewayConfig::from_json_str(r#"{"invoke_timeout_secs": 0}"#).is_err());
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let err = GatewayConfig::from_json_str(r#"{"invoke_timeout_secs": 18446744073709551615}"#)
            .unwrap_err();
        assert!(err.to_string().contains("at most 3600"));
        assert!(GatewayConfig::from_json_str(r#"{"invoke_timeout_secs": 3600}"#).is_ok());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"search_cache_ttl_secs": 60}}"#).unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert!(config.is_from_file());
        assert_eq!(config.search_cache_ttl_secs, 60);
        assert_eq!(config.providers.len(), 5);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = GatewayConfig::load(Some(Path::new("/nonexistent/quotagate.json"))).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_db_path_from_config() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var(DB_PATH_ENV);

        let config = GatewayConfig {
            database_path: Some("/tmp/gateway-test.db".to_string()),
            ..GatewayConfig::default()
        };
        assert_eq!(config.resolve_db_path().unwrap(), PathBuf::from("/tmp/gateway-test.db"));
    }

    #[test]
    fn test_db_path_env_wins() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var(DB_PATH_ENV, "/tmp/from-env.db");

        let config = GatewayConfig {
            database_path: Some("/tmp/from-config.db".to_string()),
            ..GatewayConfig::default()
        };
        let path = config.resolve_db_path().unwrap();
        std::env::remove_var(DB_PATH_ENV);

        assert_eq!(path, PathBuf::from("/tmp/from-env.db"));
    }
}
