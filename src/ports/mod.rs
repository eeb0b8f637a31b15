//! Port traits for the collaborators the core depends on.

pub mod clock_port;
pub mod config_port;
pub mod ledger_store;
pub mod price_port;
