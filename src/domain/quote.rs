//! Daily price quote for a ticker.

use crate::domain::error::SharebookError;
use chrono::NaiveDate;

/// Date format used by every record and argument in the crate.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceQuote {
    pub fn new(
        ticker: impl Into<String>,
        date: NaiveDate,
        open: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            open,
            close,
            volume,
        }
    }

    /// close - open
    pub fn day_change(&self) -> f64 {
        self.close - self.open
    }
}

/// Parse a `YYYY-MM-DD` date, mapping failures to [`SharebookError::DateParse`].
pub fn parse_date(value: &str) -> Result<NaiveDate, SharebookError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| SharebookError::DateParse {
        value: value.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
