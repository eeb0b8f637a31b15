//! Price source port.

use crate::domain::error::SharebookError;
use crate::domain::quote::PriceQuote;
use chrono::NaiveDate;

pub trait PricePort {
    /// Quote for `ticker` on exactly `date`, or `None` when there was no trading.
    fn lookup(&self, ticker: &str, date: NaiveDate) -> Result<Option<PriceQuote>, SharebookError>;

    /// Full history for `ticker`, ascending by date.
    fn series(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError>;

    /// Like [`PricePort::lookup`] but a missing quote is a not-found error.
    fn require(&self, ticker: &str, date: NaiveDate) -> Result<PriceQuote, SharebookError> {
        self.lookup(ticker, date)?.ok_or_else(|| {
            SharebookError::not_found(format!(
                "price for {} on {}",
                ticker,
                crate::domain::quote::format_date(date)
            ))
        })
    }
}
