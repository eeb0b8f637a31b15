#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sharebook::domain::error::SharebookError;
use sharebook::domain::portfolio::PortfolioKind;
pub use sharebook::domain::quote::PriceQuote;
use sharebook::domain::strategy::Strategy;
use sharebook::domain::transaction::Transaction;
use sharebook::ports::clock_port::FixedClock;
use sharebook::ports::ledger_store::LedgerStore;
use sharebook::ports::price_port::PricePort;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PriceQuote>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_quotes(mut self, ticker: &str, mut quotes: Vec<PriceQuote>) -> Self {
        quotes.sort_by_key(|q| q.date);
        self.data.insert(ticker.to_string(), quotes);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn check(&self, ticker: &str) -> Result<(), SharebookError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(SharebookError::Storage {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PricePort for MockPricePort {
    fn lookup(&self, ticker: &str, date: NaiveDate) -> Result<Option<PriceQuote>, SharebookError> {
        self.check(ticker)?;
        Ok(self
            .data
            .get(ticker)
            .and_then(|quotes| quotes.iter().find(|q| q.date == date).cloned()))
    }

    fn series(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError> {
        self.check(ticker)?;
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| SharebookError::not_found(format!("price data for {}", ticker)))
    }
}

#[derive(Default)]
struct Stored {
    log: Vec<Transaction>,
    strategies: Vec<Strategy>,
    kind: Option<PortfolioKind>,
}

/// Ledger store kept in memory.
#[derive(Default)]
pub struct MemoryLedgerStore {
    portfolios: RefCell<HashMap<String, Stored>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_log(&self, name: &str) -> Vec<Transaction> {
        self.portfolios
            .borrow()
            .get(name)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load_log(&self, name: &str) -> Result<Vec<Transaction>, SharebookError> {
        self.portfolios
            .borrow()
            .get(name)
            .map(|s| s.log.clone())
            .ok_or_else(|| SharebookError::not_found(format!("portfolio {}", name)))
    }

    fn save_log(&self, name: &str, log: &[Transaction]) -> Result<(), SharebookError> {
        self.portfolios
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .log = log.to_vec();
        Ok(())
    }

    fn load_strategies(&self, name: &str) -> Result<Vec<Strategy>, SharebookError> {
        Ok(self
            .portfolios
            .borrow()
            .get(name)
            .map(|s| s.strategies.clone())
            .unwrap_or_default())
    }

    fn save_strategies(&self, name: &str, strategies: &[Strategy]) -> Result<(), SharebookError> {
        self.portfolios
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .strategies = strategies.to_vec();
        Ok(())
    }

    fn load_kind(&self, name: &str) -> Result<PortfolioKind, SharebookError> {
        Ok(self
            .portfolios
            .borrow()
            .get(name)
            .and_then(|s| s.kind)
            .unwrap_or_default())
    }

    fn save_kind(&self, name: &str, kind: PortfolioKind) -> Result<(), SharebookError> {
        self.portfolios
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .kind = Some(kind);
        Ok(())
    }

    fn list_portfolios(&self) -> Result<Vec<String>, SharebookError> {
        let mut names: Vec<String> = self.portfolios.borrow().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, minute, 0).unwrap()
}

/// Clock parked after market close on 2030-01-01, so every quote is valued
/// at its close.
pub fn evening_clock() -> FixedClock {
    FixedClock(at(date(2030, 1, 1), 20, 0))
}

pub fn make_quote(ticker: &str, date: &str, close: f64) -> PriceQuote {
    PriceQuote::new(
        ticker,
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        close - 1.0,
        close,
        1000,
    )
}

/// `count` consecutive calendar days of quotes, close rising by one per day.
pub fn generate_quotes(
    ticker: &str,
    start_date: &str,
    count: usize,
    start_price: f64,
) -> Vec<PriceQuote> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let close = start_price + i as f64;
            PriceQuote::new(
                ticker,
                start + chrono::Duration::days(i as i64),
                close - 0.5,
                close,
                1_000_000,
            )
        })
        .collect()
}

/// Quotes from `closes`, one per calendar day from `start_date`.
pub fn quotes_from_closes(ticker: &str, start_date: &str, closes: &[f64]) -> Vec<PriceQuote> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            PriceQuote::new(ticker, start + chrono::Duration::days(i as i64), close, close, 1000)
        })
        .collect()
}
