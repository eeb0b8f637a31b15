//! Valuation of quantity/price rows.
//!
//! A row is priced at its open while the market session is running on the
//! day being valued and the quote is from that same day; otherwise at close.

use crate::domain::error::SharebookError;
use crate::domain::holdings::Holdings;
use crate::domain::quote::PriceQuote;
use crate::ports::clock_port::Clock;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One line of a valuation: how much is held and the quote it is priced from.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationRow {
    pub ticker: String,
    pub quantity: f64,
    pub open: f64,
    pub close: f64,
    /// Day being valued.
    pub date: NaiveDate,
    /// Day the quote belongs to.
    pub quote_date: NaiveDate,
}

impl ValuationRow {
    pub fn new(quantity: f64, quote: &PriceQuote, date: NaiveDate) -> Self {
        Self {
            ticker: quote.ticker.clone(),
            quantity,
            open: quote.open,
            close: quote.close,
            date,
            quote_date: quote.date,
        }
    }
}

/// Trading-session window used to decide between open and close prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSession {
    pub open: NaiveTime,
    /// Exclusive.
    pub close: NaiveTime,
}

impl Default for MarketSession {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl MarketSession {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, SharebookError> {
        if open >= close {
            return Err(SharebookError::invalid(format!(
                "market session open {} must be before close {}",
                open, close
            )));
        }
        Ok(Self { open, close })
    }

    pub fn is_open_at(&self, time: NaiveTime) -> bool {
        self.open <= time && time < self.close
    }

    pub fn uses_open_price(&self, row: &ValuationRow, now: NaiveDateTime) -> bool {
        self.is_open_at(now.time()) && row.date == row.quote_date && row.date == now.date()
    }

    pub fn price_for(&self, row: &ValuationRow, now: NaiveDateTime) -> f64 {
        if self.uses_open_price(row, now) {
            row.open
        } else {
            row.close
        }
    }
}

/// Sum of `quantity × price` over the rows, reading the clock once.
pub fn total_value(rows: &[ValuationRow], clock: &dyn Clock, session: &MarketSession) -> f64 {
    let now = clock.now();
    rows.iter()
        .map(|row| row.quantity * session.price_for(row, now))
        .sum()
}

/// Build rows for every lot in `holdings` using `quote_for` to price each
/// ticker on `date`. Returns `Ok(None)` when some ticker has no quote.
pub fn rows_for_holdings<F>(
    holdings: &Holdings,
    date: NaiveDate,
    mut quote_for: F,
) -> Result<Option<Vec<ValuationRow>>, SharebookError>
where
    F: FnMut(&str, NaiveDate) -> Result<Option<PriceQuote>, SharebookError>,
{
    let mut rows = Vec::with_capacity(holdings.len());
    for lot in holdings {
        match quote_for(&lot.ticker, date)? {
            Some(quote) => rows.push(ValuationRow::new(lot.quantity, &quote, date)),
            None => return Ok(None),
        }
    }
    Ok(Some(rows))
}
