//! Persistence port for transaction logs and strategies.

use crate::domain::error::SharebookError;
use crate::domain::portfolio::PortfolioKind;
use crate::domain::strategy::Strategy;
use crate::domain::transaction::Transaction;

pub trait LedgerStore {
    /// Stored log in append order. Unknown portfolios are a not-found error.
    fn load_log(&self, name: &str) -> Result<Vec<Transaction>, SharebookError>;

    /// Replace the stored log with `log`.
    fn save_log(&self, name: &str, log: &[Transaction]) -> Result<(), SharebookError>;

    /// Strategies stored for a portfolio; empty when none were saved.
    fn load_strategies(&self, name: &str) -> Result<Vec<Strategy>, SharebookError>;

    fn save_strategies(&self, name: &str, strategies: &[Strategy]) -> Result<(), SharebookError>;

    /// Kind recorded at creation; portfolios saved without one are flexible.
    fn load_kind(&self, name: &str) -> Result<PortfolioKind, SharebookError>;

    fn save_kind(&self, name: &str, kind: PortfolioKind) -> Result<(), SharebookError>;

    fn list_portfolios(&self) -> Result<Vec<String>, SharebookError>;

    fn exists(&self, name: &str) -> Result<bool, SharebookError> {
        Ok(self.list_portfolios()?.iter().any(|n| n == name))
    }
}
