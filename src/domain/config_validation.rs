//! Configuration validation and typed accessors.
//!
//! Every recognised key is checked by [`validate_config`] before a command
//! runs; the accessors below then turn the raw strings into domain values.

use crate::domain::error::SharebookError;
use crate::domain::replay::{ReplayPolicy, SellFallback};
use crate::domain::valuation::MarketSession;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveTime;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_STORAGE_DIR: &str = "portfolios";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_LOG_LEVEL: &str = "warn";
const TIME_FORMAT: &str = "%H:%M";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!(
                "unknown storage backend {:?} (expected file or sqlite)",
                other
            )),
        }
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SharebookError {
    SharebookError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> SharebookError {
    SharebookError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SharebookError> {
    validate_storage(config)?;
    replay_policy(config)?;
    market_session(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_storage(config: &dyn ConfigPort) -> Result<(), SharebookError> {
    match storage_backend(config)? {
        StorageBackend::File => {}
        StorageBackend::Sqlite => {
            if !cfg!(feature = "sqlite") {
                return Err(invalid(
                    "storage",
                    "backend",
                    "sqlite backend requested but sharebook was built without the sqlite feature",
                ));
            }
            sqlite_path(config)?;
            pool_size(config)?;
        }
    }
    Ok(())
}

fn validate_logging(config: &dyn ConfigPort) -> Result<(), SharebookError> {
    let level = log_level(config);
    // Full filter directives such as `sharebook=debug` are passed through.
    if level.contains('=') || LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Ok(());
    }
    Err(invalid(
        "logging",
        "level",
        format!(
            "unknown level {:?} (expected one of {})",
            level,
            LOG_LEVELS.join(", ")
        ),
    ))
}

pub fn storage_backend(config: &dyn ConfigPort) -> Result<StorageBackend, SharebookError> {
    match config.get_value("storage", "backend") {
        None => Ok(StorageBackend::default()),
        Some(s) => s.parse().map_err(|e: String| invalid("storage", "backend", e)),
    }
}

pub fn storage_dir(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_value("storage", "dir")
        .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string())
        .into()
}

pub fn sqlite_path(config: &dyn ConfigPort) -> Result<PathBuf, SharebookError> {
    config
        .get_value("sqlite", "path")
        .map(PathBuf::from)
        .ok_or_else(|| missing("sqlite", "path"))
}

pub fn pool_size(config: &dyn ConfigPort) -> Result<u32, SharebookError> {
    let size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE as i64);
    if !(1..=64).contains(&size) {
        return Err(invalid("sqlite", "pool_size", "pool_size must be between 1 and 64"));
    }
    Ok(size as u32)
}

pub fn prices_dir(config: &dyn ConfigPort) -> Result<PathBuf, SharebookError> {
    config
        .get_value("data", "prices_dir")
        .map(PathBuf::from)
        .ok_or_else(|| missing("data", "prices_dir"))
}

pub fn replay_policy(config: &dyn ConfigPort) -> Result<ReplayPolicy, SharebookError> {
    let fallback = match config.get_value("ledger", "sell_fallback") {
        None => SellFallback::default(),
        Some(s) => s
            .parse()
            .map_err(|e: String| invalid("ledger", "sell_fallback", e))?,
    };
    Ok(ReplayPolicy::new(fallback))
}

fn session_time(
    config: &dyn ConfigPort,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, SharebookError> {
    match config.get_value("market", key) {
        None => Ok(default),
        Some(s) => NaiveTime::parse_from_str(&s, TIME_FORMAT)
            .map_err(|_| invalid("market", key, format!("{:?} is not HH:MM", s))),
    }
}

pub fn market_session(config: &dyn ConfigPort) -> Result<MarketSession, SharebookError> {
    let defaults = MarketSession::default();
    let open = session_time(config, "open", defaults.open)?;
    let close = session_time(config, "close", defaults.close)?;
    MarketSession::new(open, close)
        .map_err(|_| invalid("market", "open", "open must be before close"))
}

pub fn log_level(config: &dyn ConfigPort) -> String {
    config
        .get_value("logging", "level")
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = make_config("");
        assert!(validate_config(&config).is_ok());
        assert_eq!(storage_backend(&config).unwrap(), StorageBackend::File);
        assert_eq!(storage_dir(&config), PathBuf::from("portfolios"));
        assert_eq!(replay_policy(&config).unwrap(), ReplayPolicy::default());
        assert_eq!(market_session(&config).unwrap(), MarketSession::default());
        assert_eq!(log_level(&config), "warn");
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[data]
prices_dir = /var/lib/prices

[storage]
backend = file
dir = /var/lib/portfolios

[ledger]
sell_fallback = first

[market]
open = 10:00
close = 15:30

[logging]
level = sharebook=debug
"#,
        );
        assert!(validate_config(&config).is_ok());
        assert_eq!(prices_dir(&config).unwrap(), PathBuf::from("/var/lib/prices"));
        assert_eq!(
            replay_policy(&config).unwrap().sell_fallback,
            SellFallback::First
        );
        let session = market_session(&config).unwrap();
        assert_eq!(session.open, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(session.close, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
    }

    #[test]
    fn unknown_backend_fails() {
        let config = make_config("[storage]\nbackend = postgres\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SharebookError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_backend_needs_path() {
        let config = make_config("[storage]\nbackend = sqlite\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SharebookError::ConfigMissing { key, .. } if key == "path"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn pool_size_out_of_range_fails() {
        let config =
            make_config("[storage]\nbackend = sqlite\n[sqlite]\npath = a.db\npool_size = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SharebookError::ConfigInvalid { key, .. } if key == "pool_size"));
    }

    #[test]
    fn unknown_sell_fallback_fails() {
        let config = make_config("[ledger]\nsell_fallback = newest\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, SharebookError::ConfigInvalid { key, .. } if key == "sell_fallback")
        );
    }

    #[test]
    fn malformed_market_time_fails() {
        let config = make_config("[market]\nopen = 9am\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SharebookError::ConfigInvalid { key, .. } if key == "open"));
    }

    #[test]
    fn inverted_session_fails() {
        let config = make_config("[market]\nopen = 16:00\nclose = 09:00\n");
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            SharebookError::ConfigInvalid { .. }
        ));
    }

    #[test]
    fn unknown_log_level_fails() {
        let config = make_config("[logging]\nlevel = loud\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, SharebookError::ConfigInvalid { key, .. } if key == "level"));
    }

    #[test]
    fn missing_prices_dir_is_reported() {
        let config = make_config("[data]\nprices_dir =   \n");
        assert!(matches!(
            prices_dir(&config).unwrap_err(),
            SharebookError::ConfigMissing { key, .. } if key == "prices_dir"
        ));
    }
}
