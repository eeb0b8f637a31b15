//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod file_ledger_adapter;
pub mod logging;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod system_clock;
