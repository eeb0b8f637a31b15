//! Share records: one holding lot at one ticker and date.

use crate::domain::quote::PriceQuote;
use chrono::NaiveDate;

/// Quantities closer to zero than this are treated as exhausted.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Holdings key. Lots at the same ticker on different dates are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LotKey {
    pub ticker: String,
    pub date: NaiveDate,
}

/// A holding lot. Values are never mutated in place: the `with_*` methods
/// return the updated record and the ledger swaps it into the holdings.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: u64,
    pub quantity: f64,
    pub cost_basis: f64,
}

impl ShareRecord {
    /// New lot bought at the quote's close.
    pub fn open_lot(quote: &PriceQuote, quantity: f64) -> Self {
        Self {
            ticker: quote.ticker.clone(),
            date: quote.date,
            open: quote.open,
            close: quote.close,
            volume: quote.volume,
            quantity,
            cost_basis: quantity * quote.close,
        }
    }

    pub fn key(&self) -> LotKey {
        LotKey {
            ticker: self.ticker.clone(),
            date: self.date,
        }
    }

    pub fn matches(&self, ticker: &str, date: NaiveDate) -> bool {
        self.ticker == ticker && self.date == date
    }

    pub fn with_added(&self, quantity: f64, cost: f64) -> Self {
        Self {
            quantity: self.quantity + quantity,
            cost_basis: self.cost_basis + cost,
            ..self.clone()
        }
    }

    /// Cost basis is left untouched: there is no lot-level cost accounting.
    pub fn with_removed(&self, quantity: f64) -> Self {
        Self {
            quantity: self.quantity - quantity,
            ..self.clone()
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.quantity <= QUANTITY_EPSILON
    }

    /// Room left under the quoted volume.
    pub fn headroom(&self) -> f64 {
        self.volume as f64 - self.quantity
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}
