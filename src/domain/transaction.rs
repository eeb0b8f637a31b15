//! Transaction events and their 8-field record encoding.
//!
//! `ticker,date(yyyy-MM-dd),open,close,volume,quantityDelta,costDelta,action`
//!
//! Numbers are written with Rust's shortest round-trip float formatting so a
//! decoded log replays to exactly the quantities that were encoded.

use crate::domain::error::RecordParseError;
use crate::domain::quote::{format_date, DATE_FORMAT};
use crate::domain::share::ShareRecord;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

pub const RECORD_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            other => Err(format!("unknown action {:?} (expected BUY or SELL)", other)),
        }
    }
}

/// One immutable ledger event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: u64,
    pub quantity_delta: f64,
    pub cost_delta: f64,
    pub action: Action,
}

impl Transaction {
    /// BUY event: quote fields from the lot as stored, deltas from this purchase.
    pub fn buy(lot: &ShareRecord, quantity: f64, cost: f64) -> Self {
        Self {
            ticker: lot.ticker.clone(),
            date: lot.date,
            open: lot.open,
            close: lot.close,
            volume: lot.volume,
            quantity_delta: quantity,
            cost_delta: cost,
            action: Action::Buy,
        }
    }

    /// SELL event dated at the sale, carrying the depleted lot's quote fields.
    pub fn sell(lot: &ShareRecord, quantity: f64, date: NaiveDate) -> Self {
        Self {
            ticker: lot.ticker.clone(),
            date,
            open: lot.open,
            close: lot.close,
            volume: lot.volume,
            quantity_delta: quantity,
            cost_delta: quantity * lot.close,
            action: Action::Sell,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.action == Action::Buy
    }

    /// Lot created when replay finds nothing to merge into.
    pub fn to_lot(&self) -> ShareRecord {
        ShareRecord {
            ticker: self.ticker.clone(),
            date: self.date,
            open: self.open,
            close: self.close,
            volume: self.volume,
            quantity: self.quantity_delta,
            cost_basis: self.cost_delta,
        }
    }

    pub fn fields(&self) -> [String; RECORD_FIELDS] {
        [
            self.ticker.clone(),
            format_date(self.date),
            self.open.to_string(),
            self.close.to_string(),
            self.volume.to_string(),
            self.quantity_delta.to_string(),
            self.cost_delta.to_string(),
            self.action.to_string(),
        ]
    }

    pub fn to_record(&self) -> String {
        self.fields().join(",")
    }

    /// Decode one record. `line` is 1-based and only used for error reporting.
    pub fn from_fields<'a, I>(line: usize, fields: I) -> Result<Self, RecordParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().map(str::trim).collect();
        if fields.len() != RECORD_FIELDS {
            return Err(RecordParseError::new(
                line,
                format!("expected {} fields, found {}", RECORD_FIELDS, fields.len()),
            ));
        }

        let ticker = fields[0];
        if ticker.is_empty() {
            return Err(RecordParseError::new(line, "empty ticker"));
        }
        let date = NaiveDate::parse_from_str(fields[1], DATE_FORMAT).map_err(|_| {
            RecordParseError::new(line, format!("invalid date {:?}", fields[1]))
        })?;
        let open = parse_number(line, "open", fields[2])?;
        let close = parse_number(line, "close", fields[3])?;
        let volume: u64 = fields[4].parse().map_err(|_| {
            RecordParseError::new(line, format!("invalid volume {:?}", fields[4]))
        })?;
        let quantity_delta = parse_number(line, "quantity", fields[5])?;
        let cost_delta = parse_number(line, "cost", fields[6])?;
        let action = fields[7]
            .parse::<Action>()
            .map_err(|e| RecordParseError::new(line, e))?;

        Ok(Self {
            ticker: ticker.to_string(),
            date,
            open,
            close,
            volume,
            quantity_delta,
            cost_delta,
            action,
        })
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_record())
    }
}

fn parse_number(line: usize, field: &str, value: &str) -> Result<f64, RecordParseError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecordParseError::new(
            line,
            format!("invalid {} value {:?}", field, value),
        )),
    }
}

/// Decode a whole log, one record per line. Blank lines are ignored.
pub fn decode_log(content: &str) -> Result<Vec<Transaction>, RecordParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut log = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            let line = e
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 1);
            RecordParseError::new(line, format!("CSV error: {}", e))
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 1);
        log.push(Transaction::from_fields(line, record.iter())?);
    }
    Ok(log)
}

pub fn encode_log(log: &[Transaction]) -> String {
    let mut out = String::new();
    for tx in log {
        out.push_str(&tx.to_record());
        out.push('\n');
    }
    out
}
