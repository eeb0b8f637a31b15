//! Price-series statistics: trends, N-day moving averages and crossovers.
//!
//! Every function takes a series ordered by ascending date, as the price port
//! returns it. Nothing here looks at holdings.

use crate::domain::bucketer::{self, PerformanceSeries};
use crate::domain::error::SharebookError;
use crate::domain::quote::{format_date, PriceQuote};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

/// Window of the plain crossover scan.
pub const CROSSOVER_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Positive,
    Negative,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Positive => write!(f, "POSITIVE"),
            Signal::Negative => write!(f, "NEGATIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crossover {
    pub date: NaiveDate,
    pub signal: Signal,
}

pub fn trend_for_day(quote: &PriceQuote) -> f64 {
    quote.day_change()
}

pub fn trend_for_period(close_start: f64, close_end: f64) -> f64 {
    close_end - close_start
}

/// Period trend between two dates of a series, by exact date match.
pub fn trend_between(
    series: &[PriceQuote],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, SharebookError> {
    let first = &series[locate(series, start)?];
    let last = &series[locate(series, end)?];
    Ok(trend_for_period(first.close, last.close))
}

fn locate(series: &[PriceQuote], date: NaiveDate) -> Result<usize, SharebookError> {
    series
        .binary_search_by_key(&date, |q| q.date)
        .map_err(|_| SharebookError::not_found(format!("price data on {}", format_date(date))))
}

fn average_close(series: &[PriceQuote], end_index: usize, days: usize) -> Option<f64> {
    if days == 0 || end_index + 1 < days {
        return None;
    }
    let window = &series[end_index + 1 - days..=end_index];
    Some(window.iter().map(|q| q.close).sum::<f64>() / days as f64)
}

/// Average close of the `days` entries ending at (and including) `date`.
pub fn x_day_moving_average(
    series: &[PriceQuote],
    date: NaiveDate,
    days: usize,
) -> Result<f64, SharebookError> {
    if days == 0 {
        return Err(SharebookError::invalid("moving average needs at least one day"));
    }
    let index = locate(series, date)?;
    average_close(series, index, days).ok_or_else(|| SharebookError::InsufficientData {
        ticker: series[index].ticker.clone(),
        date: format_date(date),
        have: index + 1,
        need: days,
    })
}

/// POSITIVE when `previous < average < current`, NEGATIVE when
/// `previous > average > current`.
pub fn classify_crossover(previous_close: f64, average: f64, current_close: f64) -> Option<Signal> {
    if previous_close < average && average < current_close {
        Some(Signal::Positive)
    } else if previous_close > average && average > current_close {
        Some(Signal::Negative)
    } else {
        None
    }
}

/// POSITIVE when X moves from below Y to above it, NEGATIVE for the reverse.
pub fn classify_moving_crossover(
    x_previous: f64,
    y_previous: f64,
    x_current: f64,
    y_current: f64,
) -> Option<Signal> {
    if x_current > y_current && x_previous < y_previous {
        Some(Signal::Positive)
    } else if x_current < y_current && x_previous > y_previous {
        Some(Signal::Negative)
    } else {
        None
    }
}

/// Indices from the entry dated `start` through the one dated `end`. Both
/// dates must be in the series.
fn range_indices(
    series: &[PriceQuote],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<std::ops::Range<usize>, SharebookError> {
    if end < start {
        return Err(SharebookError::invalid(format!(
            "end date {} is before start date {}",
            format_date(end),
            format_date(start)
        )));
    }
    let lo = locate(series, start)?;
    let hi = locate(series, end)?;
    Ok(lo..hi + 1)
}

fn no_crossovers(start: NaiveDate, end: NaiveDate) -> SharebookError {
    SharebookError::not_found(format!(
        "crossovers between {} and {}",
        format_date(start),
        format_date(end)
    ))
}

/// Close crossing its 30-day moving average, for each day in `[start, end]`
/// that has a previous day and a full window. Ascending by date.
pub fn cross_overs(
    series: &[PriceQuote],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Crossover>, SharebookError> {
    let mut found = Vec::new();
    for i in range_indices(series, start, end)?.rev() {
        if i == 0 {
            continue;
        }
        let Some(average) = average_close(series, i, CROSSOVER_WINDOW) else {
            continue;
        };
        if let Some(signal) = classify_crossover(series[i - 1].close, average, series[i].close) {
            found.push(Crossover {
                date: series[i].date,
                signal,
            });
        }
    }
    if found.is_empty() {
        return Err(no_crossovers(start, end));
    }
    found.reverse();
    Ok(found)
}

/// X-day average crossing the Y-day average. Requires `0 < x_days < y_days`.
pub fn moving_crossovers(
    series: &[PriceQuote],
    start: NaiveDate,
    end: NaiveDate,
    x_days: usize,
    y_days: usize,
) -> Result<Vec<Crossover>, SharebookError> {
    if x_days == 0 || x_days >= y_days {
        return Err(SharebookError::invalid(format!(
            "moving crossovers need 0 < x < y, got x={} y={}",
            x_days, y_days
        )));
    }

    let mut found = Vec::new();
    for i in range_indices(series, start, end)?.rev() {
        if i == 0 {
            continue;
        }
        let averages = (
            average_close(series, i - 1, x_days),
            average_close(series, i - 1, y_days),
            average_close(series, i, x_days),
            average_close(series, i, y_days),
        );
        let (Some(x_prev), Some(y_prev), Some(x_cur), Some(y_cur)) = averages else {
            continue;
        };
        if let Some(signal) = classify_moving_crossover(x_prev, y_prev, x_cur, y_cur) {
            found.push(Crossover {
                date: series[i].date,
                signal,
            });
        }
    }
    if found.is_empty() {
        return Err(no_crossovers(start, end));
    }
    found.reverse();
    Ok(found)
}

/// Bucketed closing prices of one stock, indexed by exact date.
pub fn stock_performance(
    series: &[PriceQuote],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PerformanceSeries, SharebookError> {
    let closes: HashMap<NaiveDate, f64> = series.iter().map(|q| (q.date, q.close)).collect();
    bucketer::bucket(start, end, |date| Ok(closes.get(&date).copied()))
}
