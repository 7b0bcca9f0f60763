use crate::error::{EtlError, Result};
use crate::store::LoadMode;
use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configured database path.
pub const DB_PATH_ENV: &str = "CARE_ETL_DB";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_data_dirs")]
    pub data_dirs: Vec<PathBuf>,
    #[serde(default = "default_dimension_file")]
    pub dimension_file: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterConfig {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    #[serde(default)]
    pub region_include: Vec<String>,
    #[serde(default)]
    pub category_include: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_top_customers")]
    pub top_customers: usize,
}

#[derive(Debug, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub load_mode: LoadMode,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Connection parameters for the durable store. The embedded engine only
/// consumes `database`; the remaining fields are recognized so configs
/// written for server-based engines parse without errors.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    pub driver: Option<String>,
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default = "default_true")]
    pub trust_certificate: bool,
}

fn default_data_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("sample_data/sigsaude"),
        PathBuf::from("sample_data/operadoras"),
    ]
}

fn default_dimension_file() -> PathBuf {
    PathBuf::from("sample_data/dim_clientes.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_top_customers() -> usize {
    5
}

fn default_database() -> PathBuf {
    PathBuf::from("data/service_records.db")
}

fn default_true() -> bool {
    true
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_dirs: default_data_dirs(),
            dimension_file: default_dimension_file(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            top_customers: default_top_customers(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enable: false,
            load_mode: LoadMode::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            driver: None,
            server: None,
            username: None,
            password: None,
            encrypt: false,
            trust_certificate: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;
        if let Ok(db) = env::var(DB_PATH_ENV) {
            if !db.trim().is_empty() {
                config.persistence.connection.database = PathBuf::from(db);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.persistence.enable);
        assert_eq!(config.persistence.load_mode, LoadMode::Merge);
        assert_eq!(config.report.top_customers, 5);
        assert!(config.filter.period_start.is_none());
        assert!(config.filter.region_include.is_empty());
    }

    #[test]
    fn test_full_config_round_trip() {
        let raw = r#"
            [input]
            data_dirs = ["a", "b"]
            dimension_file = "dim.csv"

            [filter]
            period_start = "2024-01-01"
            period_end = "2024-12-31"
            region_include = ["SP", "RJ"]

            [persistence]
            enable = true
            load_mode = "append"

            [persistence.connection]
            database = "store.db"
            username = "etl_user"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.input.data_dirs.len(), 2);
        assert!(config.persistence.enable);
        assert_eq!(config.persistence.load_mode, LoadMode::Append);
        assert_eq!(
            config.filter.period_start,
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(config.persistence.connection.username.as_deref(), Some("etl_user"));
    }
}
