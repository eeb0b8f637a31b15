//! Core domain types and logic.

pub mod error;
pub mod quote;
pub mod share;
pub mod holdings;
pub mod transaction;
pub mod replay;
pub mod ledger;
pub mod valuation;
pub mod bucketer;
pub mod statistics;
pub mod investment;
pub mod strategy;
pub mod portfolio;
pub mod config_validation;
