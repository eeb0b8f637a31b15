//! Ledger: live holdings plus the append-only transaction log.
//!
//! `buy` and `sell` validate everything before touching state, then update the
//! holdings and append the event together. A rejected call leaves both as
//! they were.

use crate::domain::error::SharebookError;
use crate::domain::holdings::Holdings;
use crate::domain::quote::{format_date, PriceQuote};
use crate::domain::replay::{self, ReplayPolicy};
use crate::domain::share::{ShareRecord, QUANTITY_EPSILON};
use crate::domain::transaction::{Action, Transaction};
use chrono::NaiveDate;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    holdings: Holdings,
    log: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a stored log.
    pub fn from_log(log: Vec<Transaction>, policy: ReplayPolicy) -> Result<Self, SharebookError> {
        let holdings = replay::replay(&log, policy)?;
        Ok(Self { holdings, log })
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    pub fn log(&self) -> &[Transaction] {
        &self.log
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Holdings as they stood at the end of `date`.
    pub fn holdings_as_of(
        &self,
        date: NaiveDate,
        policy: ReplayPolicy,
    ) -> Result<Holdings, SharebookError> {
        replay::replay_as_of(&self.log, date, policy)
    }

    /// Money put in through BUY events dated on or before `date`.
    pub fn total_investment_as_of(&self, date: NaiveDate) -> f64 {
        self.log
            .iter()
            .filter(|tx| tx.action == Action::Buy && tx.date <= date)
            .map(|tx| tx.cost_delta)
            .sum()
    }

    pub fn buy(&mut self, quantity: f64, quote: &PriceQuote) -> Result<Transaction, SharebookError> {
        if !(quantity > 0.0) || !quantity.is_finite() {
            return Err(SharebookError::invalid(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if quantity > quote.volume as f64 {
            return Err(SharebookError::invalid(format!(
                "cannot buy {} shares of {}: only {} traded on {}",
                quantity,
                quote.ticker,
                quote.volume,
                format_date(quote.date)
            )));
        }
        for lot in self.holdings.lots_for(&quote.ticker) {
            if lot.quantity + quantity > lot.volume as f64 {
                return Err(SharebookError::invalid(format!(
                    "cannot buy {} shares of {}: would exceed volume {} of lot dated {} (holding {})",
                    quantity,
                    quote.ticker,
                    lot.volume,
                    format_date(lot.date),
                    lot.quantity
                )));
            }
        }

        let cost = quantity * quote.close;
        let tx = match self.holdings.position_of(&quote.ticker, quote.date) {
            Some(i) => {
                let merged = self.holdings.lot(i).with_added(quantity, cost);
                let tx = Transaction::buy(&merged, quantity, cost);
                self.holdings.replace(i, merged);
                tx
            }
            None => {
                let lot = ShareRecord::open_lot(quote, quantity);
                let tx = Transaction::buy(&lot, quantity, cost);
                self.holdings.insert(lot);
                tx
            }
        };

        info!(
            ticker = %quote.ticker,
            date = %quote.date,
            quantity,
            cost,
            "bought"
        );
        self.log.push(tx.clone());
        Ok(tx)
    }

    /// Sell from the first lot (insertion order) dated on or before `date`.
    pub fn sell(
        &mut self,
        quantity: f64,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Transaction, SharebookError> {
        if !(quantity > 0.0) || !quantity.is_finite() {
            return Err(SharebookError::invalid(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let index = self.holdings.first_on_or_before(ticker, date).ok_or_else(|| {
            SharebookError::TickerNotHeld {
                ticker: ticker.to_string(),
                date: format_date(date),
            }
        })?;

        let lot = self.holdings.lot(index);
        if quantity > lot.quantity + QUANTITY_EPSILON {
            return Err(SharebookError::InsufficientQuantity {
                ticker: ticker.to_string(),
                requested: quantity,
                available: lot.quantity,
            });
        }

        let tx = Transaction::sell(lot, quantity, date);
        let remaining = lot.with_removed(quantity);
        if remaining.is_exhausted() {
            self.holdings.remove(index);
        } else {
            self.holdings.replace(index, remaining);
        }

        info!(ticker, date = %date, quantity, "sold");
        self.log.push(tx.clone());
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn quote(ticker: &str, d: u32, close: f64, volume: u64) -> PriceQuote {
        PriceQuote::new(ticker, date(d), close - 0.5, close, volume)
    }

    #[test]
    fn buy_creates_lot_and_logs() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();

        assert_eq!(ledger.holdings().len(), 1);
        let lot = ledger.holdings().lot(0);
        assert!((lot.quantity - 10.0).abs() < f64::EPSILON);
        assert!((lot.cost_basis - 200.0).abs() < f64::EPSILON);
        assert_eq!(ledger.log().len(), 1);
        assert_eq!(ledger.log()[0].to_record(), "ABC,2023-01-05,19.5,20,1000,10,200,BUY");
    }

    #[test]
    fn buy_rejects_non_positive_quantity() {
        let mut ledger = Ledger::new();
        for q in [0.0, -1.0, f64::NAN] {
            let err = ledger.buy(q, &quote("ABC", 5, 20.0, 1000)).unwrap_err();
            assert!(matches!(err, SharebookError::InvalidInput { .. }));
        }
        assert!(ledger.log().is_empty());
    }

    #[test]
    fn buy_rejects_quantity_above_volume() {
        let mut ledger = Ledger::new();
        let err = ledger.buy(11.0, &quote("ABC", 5, 20.0, 10)).unwrap_err();
        assert!(matches!(err, SharebookError::InvalidInput { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn buy_merges_same_key_without_revalidating_price() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        let tx = ledger.buy(5.0, &quote("ABC", 5, 22.0, 2000)).unwrap();

        assert_eq!(ledger.holdings().len(), 1);
        let lot = ledger.holdings().lot(0);
        assert!((lot.quantity - 15.0).abs() < f64::EPSILON);
        assert!((lot.cost_basis - 310.0).abs() < f64::EPSILON);
        assert_eq!(lot.volume, 1000);
        assert!((tx.close - 20.0).abs() < f64::EPSILON);
        assert!((tx.quantity_delta - 5.0).abs() < f64::EPSILON);
        assert!((tx.cost_delta - 110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_rejects_when_existing_lot_would_exceed_its_volume() {
        let mut ledger = Ledger::new();
        ledger.buy(8.0, &quote("ABC", 5, 20.0, 10)).unwrap();
        let err = ledger.buy(5.0, &quote("ABC", 6, 20.0, 1000)).unwrap_err();
        assert!(matches!(err, SharebookError::InvalidInput { .. }));
        assert_eq!(ledger.holdings().len(), 1);
        assert_eq!(ledger.log().len(), 1);
    }

    #[test]
    fn buy_on_new_date_opens_second_lot() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.buy(2.0, &quote("ABC", 6, 21.0, 1000)).unwrap();
        assert_eq!(ledger.holdings().len(), 2);
    }

    #[test]
    fn sell_decrements_first_eligible_lot() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        let tx = ledger.sell(4.0, "ABC", date(10)).unwrap();

        assert!((ledger.holdings().lot(0).quantity - 6.0).abs() < f64::EPSILON);
        assert_eq!(tx.date, date(10));
        assert_eq!(tx.action, Action::Sell);
    }

    #[test]
    fn sell_exhausting_lot_removes_it() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.sell(10.0, "ABC", date(5)).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.log().len(), 2);
    }

    #[test]
    fn sell_more_than_held_reports_available() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        let before = ledger.clone();

        match ledger.sell(11.0, "ABC", date(10)) {
            Err(SharebookError::InsufficientQuantity { available, .. }) => {
                assert!((available - 10.0).abs() < f64::EPSILON);
            }
            other => panic!("expected InsufficientQuantity, got {other:?}"),
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn sell_before_lot_date_is_not_held() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        let err = ledger.sell(1.0, "ABC", date(4)).unwrap_err();
        assert!(matches!(err, SharebookError::TickerNotHeld { .. }));
        let err = ledger.sell(1.0, "XYZ", date(9)).unwrap_err();
        assert!(matches!(err, SharebookError::TickerNotHeld { .. }));
    }

    #[test]
    fn sell_rejects_non_positive_quantity() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        assert!(matches!(
            ledger.sell(0.0, "ABC", date(6)),
            Err(SharebookError::InvalidInput { .. })
        ));
    }

    #[test]
    fn total_investment_counts_only_buys_up_to_date() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.sell(4.0, "ABC", date(10)).unwrap();
        ledger.buy(1.0, &quote("XYZ", 12, 50.0, 1000)).unwrap();

        assert!((ledger.total_investment_as_of(date(4))).abs() < f64::EPSILON);
        assert!((ledger.total_investment_as_of(date(10)) - 200.0).abs() < f64::EPSILON);
        assert!((ledger.total_investment_as_of(date(12)) - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_log_matches_live_ledger() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.buy(3.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.buy(2.0, &quote("XYZ", 6, 40.0, 1000)).unwrap();
        ledger.sell(4.0, "ABC", date(10)).unwrap();
        ledger.sell(2.0, "XYZ", date(11)).unwrap();

        let rebuilt = Ledger::from_log(ledger.log().to_vec(), ReplayPolicy::default()).unwrap();
        assert_eq!(rebuilt.holdings(), ledger.holdings());
    }

    #[test]
    fn holdings_as_of_before_sale() {
        let mut ledger = Ledger::new();
        ledger.buy(10.0, &quote("ABC", 5, 20.0, 1000)).unwrap();
        ledger.sell(4.0, "ABC", date(10)).unwrap();

        let before = ledger.holdings_as_of(date(9), ReplayPolicy::default()).unwrap();
        assert!((before.lot(0).quantity - 10.0).abs() < f64::EPSILON);
        let none = ledger.holdings_as_of(date(1), ReplayPolicy::default()).unwrap();
        assert!(none.is_empty());
    }
}
