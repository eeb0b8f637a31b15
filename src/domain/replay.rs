//! Ledger replay: rebuild holdings by folding the transaction log oldest first.
//!
//! A BUY merges into the lot with its exact `(ticker, date)` key, or opens a
//! new lot from its own fields. Where a SELL lands depends on [`SellFallback`]:
//! - `First` applies the live ledger's rule: the first lot in insertion order
//!   dated on or before the sale, removed as soon as it is exhausted;
//! - `Latest` prefers the exact-date lot, then the last earlier-dated lot;
//! - `Disabled` accepts only the exact-date lot.
//!
//! A SELL that finds no lot opens one from its own fields. Lots at or below
//! zero are purged once the fold finishes. The fold has no state besides the
//! holdings it builds, so replaying a fixed log always gives the same result.

use crate::domain::error::SharebookError;
use crate::domain::holdings::Holdings;
use crate::domain::quote::format_date;
use crate::domain::transaction::{Action, Transaction};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Which lot a SELL depletes during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SellFallback {
    /// Legacy rule: the exact-date lot, else the last earlier-dated lot seen
    /// in insertion order. Can over- or under-deplete lots when a ticker was
    /// bought on several dates.
    Latest,
    /// First lot in insertion order dated on or before the sale, the same lot
    /// a live sell picks.
    #[default]
    First,
    /// Exact-date lot only. A SELL that would need an earlier lot is a replay
    /// error.
    Disabled,
}

impl fmt::Display for SellFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellFallback::Latest => write!(f, "latest"),
            SellFallback::First => write!(f, "first"),
            SellFallback::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for SellFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(SellFallback::Latest),
            "first" => Ok(SellFallback::First),
            "disabled" | "none" | "off" => Ok(SellFallback::Disabled),
            other => Err(format!(
                "unknown sell fallback {:?} (expected latest, first or disabled)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayPolicy {
    pub sell_fallback: SellFallback,
}

impl ReplayPolicy {
    pub fn new(sell_fallback: SellFallback) -> Self {
        Self { sell_fallback }
    }
}

/// Replay the whole log.
pub fn replay(log: &[Transaction], policy: ReplayPolicy) -> Result<Holdings, SharebookError> {
    replay_events(log.iter(), policy)
}

/// Replay only the events dated on or before `as_of`.
pub fn replay_as_of(
    log: &[Transaction],
    as_of: NaiveDate,
    policy: ReplayPolicy,
) -> Result<Holdings, SharebookError> {
    replay_events(log.iter().filter(|tx| tx.date <= as_of), policy)
}

fn replay_events<'a, I>(events: I, policy: ReplayPolicy) -> Result<Holdings, SharebookError>
where
    I: Iterator<Item = &'a Transaction>,
{
    let mut holdings = events.enumerate().try_fold(Holdings::new(), |holdings, (seq, tx)| {
        apply(holdings, seq, tx, policy)
    })?;

    for lot in holdings.purge_exhausted() {
        if lot.quantity < 0.0 {
            warn!(
                ticker = %lot.ticker,
                date = %lot.date,
                quantity = lot.quantity,
                "replay drove lot below zero; purged"
            );
        }
    }
    Ok(holdings)
}

fn apply(
    mut holdings: Holdings,
    seq: usize,
    tx: &Transaction,
    policy: ReplayPolicy,
) -> Result<Holdings, SharebookError> {
    debug!(seq, record = %tx, "replaying");

    let target = match tx.action {
        Action::Buy => holdings.position_of(&tx.ticker, tx.date),
        Action::Sell => sell_target(&holdings, tx, policy.sell_fallback)?,
    };

    let Some(i) = target else {
        holdings.insert(tx.to_lot());
        return Ok(holdings);
    };

    let lot = holdings.lot(i);
    match tx.action {
        Action::Buy => {
            let merged = lot.with_added(tx.quantity_delta, tx.cost_delta);
            holdings.replace(i, merged);
        }
        Action::Sell => {
            if lot.date != tx.date {
                debug!(
                    ticker = %tx.ticker,
                    sell_date = %tx.date,
                    lot_date = %lot.date,
                    "sell replayed against earlier lot"
                );
            }
            let remaining = lot.with_removed(tx.quantity_delta);
            if policy.sell_fallback == SellFallback::First && remaining.is_exhausted() {
                holdings.remove(i);
            } else {
                holdings.replace(i, remaining);
            }
        }
    }
    Ok(holdings)
}

fn sell_target(
    holdings: &Holdings,
    tx: &Transaction,
    fallback: SellFallback,
) -> Result<Option<usize>, SharebookError> {
    match fallback {
        SellFallback::First => Ok(holdings.first_on_or_before(&tx.ticker, tx.date)),
        SellFallback::Latest => Ok(holdings
            .position_of(&tx.ticker, tx.date)
            .or_else(|| holdings.latest_before(&tx.ticker, tx.date))),
        SellFallback::Disabled => match holdings.position_of(&tx.ticker, tx.date) {
            Some(i) => Ok(Some(i)),
            None if holdings.first_before(&tx.ticker, tx.date).is_some() => {
                Err(SharebookError::not_found(format!(
                    "lot for SELL of {} on {} (earlier-lot fallback disabled)",
                    tx.ticker,
                    format_date(tx.date)
                )))
            }
            None => Ok(None),
        },
    }
}
