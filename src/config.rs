//! Application configuration module / Cấu hình ứng dụng
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::search::{SearchOptions, DEFAULT_SNIPPET_WINDOW};

/// Global configuration instance
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Overrides `source.path`
pub const ENV_SOURCE_PATH: &str = "SHEETDEX_SOURCE_PATH";
/// Overrides `index.deep` (`1`, `true`, `yes`)
pub const ENV_DEEP_INDEX: &str = "DEEP_INDEX";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub host: String,
    pub port: u16,
}

/// Kind of sheet source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// One JSON workbook export
    Workbook,
    /// Directory of CSV files
    CsvDir,
}

/// Sheet source configuration / Nguồn dữ liệu
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Workbook file or CSV directory
    pub path: String,
}

/// Index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Run the rich-annotation pass on rebuild
    pub deep: bool,
    /// Build the index once at startup
    pub rebuild_on_start: bool,
}

/// Search defaults for requests that omit them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub fuzz_threshold: u8,
    pub snippet_window: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8190,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Workbook,
            path: "data/workbook.json".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            deep: true,
            rebuild_on_start: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            fuzz_threshold: 85,
            snippet_window: DEFAULT_SNIPPET_WINDOW,
        }
    }
}

impl SearchConfig {
    /// Options for `query` with the configured defaults
    pub fn options(&self, query: &str) -> SearchOptions {
        SearchOptions::new(query)
            .with_top_k(self.top_k.max(1))
            .with_threshold(self.fuzz_threshold)
    }
}

impl AppConfig {
    /// Get the server bind address
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the source path
    pub fn get_source_path(&self) -> PathBuf {
        PathBuf::from(&self.source.path)
    }

    /// Apply environment overrides, `lookup` reads one variable
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_SOURCE_PATH).filter(|p| !p.trim().is_empty()) {
            self.source.path = path;
        }
        if let Some(flag) = lookup(ENV_DEEP_INDEX) {
            self.index.deep = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

/// Get the config file path
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / Đọc cấu hình
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Load configuration from `config_path`, creating it with defaults when missing
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

/// Initialize global configuration
pub fn init_config() -> Result<Arc<RwLock<AppConfig>>, String> {
    let config = load_config()?;

    let config_arc = Arc::new(RwLock::new(config));

    CONFIG.set(config_arc.clone())
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(config_arc)
}

/// Get global configuration instance
pub fn get_config() -> Arc<RwLock<AppConfig>> {
    CONFIG.get_or_init(|| {
        let config = load_config().unwrap_or_default();
        Arc::new(RwLock::new(config))
    }).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.get_bind_address(), "0.0.0.0:8190");
        assert_eq!(config.source.kind, SourceKind::Workbook);
        assert!(config.index.deep);
        assert_eq!(config.search.top_k, 20);
        assert_eq!(config.search.fuzz_threshold, 85);
        assert_eq!(config.search.snippet_window, 60);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"source": {"kind": "csv_dir", "path": "exports"}, "search": {"top_k": 5}}"#).unwrap();
        assert_eq!(config.source.kind, SourceKind::CsvDir);
        assert_eq!(config.get_source_path(), PathBuf::from("exports"));
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.fuzz_threshold, 85);
        assert_eq!(config.server.port, 8190);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_SOURCE_PATH, "/srv/wb.json"), (ENV_DEEP_INDEX, "No")].into();
        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.source.path, "/srv/wb.json");
        assert!(!config.index.deep);

        config.apply_overrides(|key| (key == ENV_DEEP_INDEX).then(|| "YES".to_string()));
        assert!(config.index.deep);
        assert_eq!(config.source.path, "/srv/wb.json");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let created = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.server.port, 8190);

        std::fs::write(&path, r#"{"server": {"host": "127.0.0.1", "port": 9000}}"#).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.get_bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_search_options_from_config() {
        let search = SearchConfig {
            top_k: 0,
            fuzz_threshold: 70,
            snippet_window: 30,
        };
        let opts = search.options("van an");
        assert_eq!(opts.top_k, 1);
        assert_eq!(opts.fuzz_threshold, 70);
        assert!(!opts.exact);
    }
}
