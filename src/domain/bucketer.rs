//! Performance bucketing: resample a per-date value source onto day, month or
//! year buckets sized for a chart of roughly thirty bars, and pick a bar scale.
//!
//! Granularity from `days = end - start` and `interval = ceil(days / 30)`:
//! - `interval <= 30`: DAY, step `interval`
//! - `ceil(interval / 30) <= 6`: MONTH, step `ceil(interval / 30)`
//! - otherwise: YEAR, step `ceil(interval / 900)`
//!
//! DAY buckets without data are skipped. MONTH and YEAR anchors (month end,
//! Dec 31) walk back one day at a time to the nearest date with data and fail
//! if that walk would pass `start`.

use crate::domain::error::SharebookError;
use crate::domain::quote::format_date;
use chrono::{Datelike, Duration, Months, NaiveDate};
use std::fmt;
use tracing::debug;

/// Bars a chart should need at most at the chosen scale.
pub const MAX_BAR_UNITS: f64 = 30.0;

const BUCKETS_PER_CHART: u64 = 30;
const MAX_MONTH_STEP: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%d %b %Y").to_string(),
            Granularity::Month => date.format("%b %Y").to_string(),
            Granularity::Year => date.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Month => write!(f, "month"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPlan {
    pub granularity: Granularity,
    pub step: u32,
}

impl BucketPlan {
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Result<Self, SharebookError> {
        let days = (end - start).num_days();
        if days < 0 {
            return Err(SharebookError::invalid(format!(
                "end date {} is before start date {}",
                format_date(end),
                format_date(start)
            )));
        }
        Ok(Self::for_days(days as u64))
    }

    pub fn for_days(days: u64) -> Self {
        let interval = days.div_ceil(BUCKETS_PER_CHART).max(1);
        let (granularity, step) = if interval <= BUCKETS_PER_CHART {
            (Granularity::Day, interval)
        } else {
            let months = interval.div_ceil(BUCKETS_PER_CHART);
            if months <= MAX_MONTH_STEP {
                (Granularity::Month, months)
            } else {
                (
                    Granularity::Year,
                    interval.div_ceil(BUCKETS_PER_CHART * BUCKETS_PER_CHART),
                )
            }
        };
        Self {
            granularity,
            step: step as u32,
        }
    }

    /// Bucket dates from `start` to `end` before data gaps are resolved.
    pub fn anchors(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut anchors = Vec::new();
        let mut next = match self.granularity {
            Granularity::Day => Some(start),
            Granularity::Month => month_end(start),
            Granularity::Year => NaiveDate::from_ymd_opt(start.year(), 12, 31),
        };
        while let Some(date) = next {
            if date > end {
                break;
            }
            anchors.push(date);
            next = match self.granularity {
                Granularity::Day => date.checked_add_signed(Duration::days(self.step as i64)),
                Granularity::Month => date
                    .with_day(1)
                    .and_then(|first| first.checked_add_months(Months::new(self.step)))
                    .and_then(month_end),
                Granularity::Year => NaiveDate::from_ymd_opt(date.year() + self.step as i32, 12, 31),
            };
        }
        anchors
    }
}

fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub label: String,
    pub value: f64,
}

impl PerformancePoint {
    /// `label,value` with the value at two decimals.
    pub fn record(&self) -> String {
        format!("{},{:.2}", self.label, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSeries {
    pub plan: BucketPlan,
    pub points: Vec<PerformancePoint>,
    pub scale: u64,
}

impl PerformanceSeries {
    /// Label to `label,value` record pairs in date order.
    pub fn records(&self) -> Vec<(String, String)> {
        self.points
            .iter()
            .map(|p| (p.label.clone(), p.record()))
            .collect()
    }

    /// Number of whole scale units in `value`.
    pub fn bar_units(&self, value: f64) -> usize {
        if value <= 0.0 {
            return 0;
        }
        (value / self.scale as f64).round() as usize
    }
}

/// Start at `floor(min)` (at least 1) and double while `max / scale` exceeds
/// [`MAX_BAR_UNITS`], stopping at the largest power of two `u64` holds.
pub fn chart_scale(min: f64, max: f64) -> u64 {
    let mut scale = if min.is_finite() && min >= 1.0 {
        min.floor() as u64
    } else {
        1
    };
    while max.is_finite() && max / scale as f64 > MAX_BAR_UNITS {
        match scale.checked_mul(2) {
            Some(doubled) => scale = doubled,
            None => break,
        }
    }
    scale
}

/// Bucket `value_on` over `[start, end]`. `value_on` returns `Ok(None)` for a
/// date without data.
pub fn bucket<F>(
    start: NaiveDate,
    end: NaiveDate,
    mut value_on: F,
) -> Result<PerformanceSeries, SharebookError>
where
    F: FnMut(NaiveDate) -> Result<Option<f64>, SharebookError>,
{
    let plan = BucketPlan::for_range(start, end)?;
    debug!(granularity = %plan.granularity, step = plan.step, "bucketing");

    let mut points: Vec<PerformancePoint> = Vec::new();
    for anchor in plan.anchors(start, end) {
        let resolved = match plan.granularity {
            Granularity::Day => value_on(anchor)?.map(|v| (anchor, v)),
            Granularity::Month | Granularity::Year => {
                Some(walk_back(anchor, start, &mut value_on)?)
            }
        };
        let Some((date, value)) = resolved else {
            continue;
        };
        if points.last().is_some_and(|p| p.date == date) {
            continue;
        }
        debug!(anchor = %anchor, date = %date, value, "bucket resolved");
        points.push(PerformancePoint {
            date,
            label: plan.granularity.label(date),
            value,
        });
    }

    if points.is_empty() {
        return Err(SharebookError::not_found(format!(
            "data between {} and {}",
            format_date(start),
            format_date(end)
        )));
    }

    let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
    Ok(PerformanceSeries {
        plan,
        points,
        scale: chart_scale(min, max),
    })
}

fn walk_back<F>(
    anchor: NaiveDate,
    start: NaiveDate,
    value_on: &mut F,
) -> Result<(NaiveDate, f64), SharebookError>
where
    F: FnMut(NaiveDate) -> Result<Option<f64>, SharebookError>,
{
    let mut date = anchor;
    loop {
        if let Some(value) = value_on(date)? {
            return Ok((date, value));
        }
        match date.pred_opt() {
            Some(prev) if prev >= start => date = prev,
            _ => {
                return Err(SharebookError::InvalidStartDate {
                    date: format_date(anchor),
                    start: format_date(start),
                })
            }
        }
    }
}
