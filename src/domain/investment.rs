//! Fixed-amount investing and dollar-cost schedules.
//!
//! An amount is split across tickers by percentage and each share count is
//! the exact quotient `amount × pct / 100 / close`; nothing is rounded, so the
//! legs add back up to `amount × Σpct / 100` up to float error.

use crate::domain::error::SharebookError;
use crate::domain::quote::{format_date, parse_date, PriceQuote};
use crate::ports::price_port::PricePort;
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Slack allowed on the percentage total.
pub const PERCENT_TOLERANCE: f64 = 1e-9;

/// Days searched forward for a trading day when a scheduled date has no quotes.
pub const TRADING_DAY_SEARCH: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub ticker: String,
    pub percent: f64,
}

impl Allocation {
    pub fn new(ticker: impl Into<String>, percent: f64) -> Self {
        Self {
            ticker: ticker.into(),
            percent,
        }
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ticker, self.percent)
    }
}

/// `TICKER=PCT` or `TICKER:PCT`. Tickers are upper-cased.
impl FromStr for Allocation {
    type Err = SharebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ticker, percent) = s
            .split_once('=')
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| {
                SharebookError::invalid(format!("allocation {:?} is not TICKER=PERCENT", s))
            })?;
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(SharebookError::invalid(format!("allocation {:?} has no ticker", s)));
        }
        let percent: f64 = percent.trim().parse().map_err(|_| {
            SharebookError::invalid(format!("allocation {:?} has a non-numeric percentage", s))
        })?;
        Ok(Self { ticker, percent })
    }
}

pub fn validate_amount(amount: f64) -> Result<(), SharebookError> {
    if !(amount > 0.0) || !amount.is_finite() {
        return Err(SharebookError::invalid(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

pub fn validate_allocations(allocations: &[Allocation]) -> Result<(), SharebookError> {
    if allocations.is_empty() {
        return Err(SharebookError::invalid("at least one allocation is required"));
    }
    let mut seen = HashSet::new();
    let mut total = 0.0;
    for a in allocations {
        if !(a.percent > 0.0) || !a.percent.is_finite() {
            return Err(SharebookError::invalid(format!(
                "percentage for {} must be positive, got {}",
                a.ticker, a.percent
            )));
        }
        if !seen.insert(a.ticker.as_str()) {
            return Err(SharebookError::invalid(format!(
                "{} is allocated more than once",
                a.ticker
            )));
        }
        total += a.percent;
    }
    if total > 100.0 + PERCENT_TOLERANCE {
        return Err(SharebookError::invalid(format!(
            "percentages add up to {}, more than 100",
            total
        )));
    }
    Ok(())
}

/// One leg of a fixed-amount investment.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub quote: PriceQuote,
    pub quantity: f64,
}

impl Purchase {
    pub fn cost(&self) -> f64 {
        self.quantity * self.quote.close
    }
}

/// Price every allocation on `date` and work out the share counts.
pub fn split_amount(
    amount: f64,
    allocations: &[Allocation],
    date: NaiveDate,
    prices: &dyn PricePort,
) -> Result<Vec<Purchase>, SharebookError> {
    validate_amount(amount)?;
    validate_allocations(allocations)?;

    allocations
        .iter()
        .map(|a| {
            let quote = prices.require(&a.ticker, date)?;
            if !(quote.close > 0.0) {
                return Err(SharebookError::invalid(format!(
                    "{} has no positive close on {}",
                    a.ticker,
                    format_date(date)
                )));
            }
            let quantity = amount * a.percent / 100.0 / quote.close;
            Ok(Purchase { quote, quantity })
        })
        .collect()
}

/// One scheduled fixed-amount investment.
///
/// Encoded as `yyyy-MM-dd,amount,TICKER:pct;TICKER:pct`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentEntry {
    pub date: NaiveDate,
    pub amount: f64,
    pub allocations: Vec<Allocation>,
}

impl InvestmentEntry {
    pub fn encode(&self) -> String {
        let allocations: Vec<String> = self.allocations.iter().map(|a| a.to_string()).collect();
        format!(
            "{},{},{}",
            format_date(self.date),
            self.amount,
            allocations.join(";")
        )
    }

    pub fn parse(entry: &str) -> Result<Self, SharebookError> {
        let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(SharebookError::invalid(format!(
                "strategy entry {:?} is not date,amount,allocations",
                entry
            )));
        }
        let date = parse_date(fields[0])?;
        let amount: f64 = fields[1].parse().map_err(|_| {
            SharebookError::invalid(format!("strategy entry {:?} has a bad amount", entry))
        })?;
        let allocations = fields[2]
            .split(';')
            .map(str::parse::<Allocation>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            date,
            amount,
            allocations,
        })
    }
}

/// Recurring investment of `amount` every `interval_days` from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct DollarCostPlan {
    pub amount: f64,
    pub allocations: Vec<Allocation>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval_days: u32,
}

impl DollarCostPlan {
    pub fn validate(&self) -> Result<(), SharebookError> {
        validate_amount(self.amount)?;
        validate_allocations(&self.allocations)?;
        if self.interval_days == 0 {
            return Err(SharebookError::invalid("interval must be at least one day"));
        }
        if self.end < self.start {
            return Err(SharebookError::invalid(format!(
                "end date {} is before start date {}",
                format_date(self.end),
                format_date(self.start)
            )));
        }
        Ok(())
    }

    /// Nominal dates `start, start + interval, …` up to `end`.
    pub fn nominal_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut date = self.start;
        while date <= self.end {
            dates.push(date);
            match date.checked_add_signed(Duration::days(self.interval_days as i64)) {
                Some(next) => date = next,
                None => break,
            }
        }
        dates
    }

    /// Resolve each nominal date to the first day (within a week, not past
    /// `end`) on which every allocated ticker has a quote. Dates with no such
    /// day are dropped.
    pub fn schedule(&self, prices: &dyn PricePort) -> Result<Vec<InvestmentEntry>, SharebookError> {
        self.validate()?;

        let mut entries: Vec<InvestmentEntry> = Vec::new();
        for nominal in self.nominal_dates() {
            let Some(date) = self.trading_day(nominal, prices)? else {
                continue;
            };
            if entries.last().is_some_and(|e| e.date == date) {
                continue;
            }
            entries.push(InvestmentEntry {
                date,
                amount: self.amount,
                allocations: self.allocations.clone(),
            });
        }

        if entries.is_empty() {
            return Err(SharebookError::not_found(format!(
                "trading day between {} and {}",
                format_date(self.start),
                format_date(self.end)
            )));
        }
        Ok(entries)
    }

    fn trading_day(
        &self,
        nominal: NaiveDate,
        prices: &dyn PricePort,
    ) -> Result<Option<NaiveDate>, SharebookError> {
        for offset in 0..TRADING_DAY_SEARCH {
            let date = nominal + Duration::days(offset);
            if date > self.end {
                break;
            }
            let mut all_quoted = true;
            for a in &self.allocations {
                if prices.lookup(&a.ticker, date)?.is_none() {
                    all_quoted = false;
                    break;
                }
            }
            if all_quoted {
                return Ok(Some(date));
            }
        }
        Ok(None)
    }
}
