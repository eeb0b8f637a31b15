//! Live holdings set keyed by `(ticker, date)`.
//!
//! Lots keep insertion order. Lookups that can match several lots ("first
//! eligible", "latest earlier") are defined in terms of that order.

use crate::domain::share::{LotKey, ShareRecord};
use chrono::NaiveDate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holdings {
    lots: Vec<ShareRecord>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShareRecord> {
        self.lots.iter()
    }

    pub fn lots(&self) -> &[ShareRecord] {
        &self.lots
    }

    pub fn get(&self, key: &LotKey) -> Option<&ShareRecord> {
        self.lots.iter().find(|lot| lot.matches(&key.ticker, key.date))
    }

    pub fn position_of(&self, ticker: &str, date: NaiveDate) -> Option<usize> {
        self.lots.iter().position(|lot| lot.matches(ticker, date))
    }

    pub fn lots_for<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a ShareRecord> + 'a {
        self.lots.iter().filter(move |lot| lot.ticker == ticker)
    }

    /// First lot in insertion order dated on or before `date`.
    pub fn first_on_or_before(&self, ticker: &str, date: NaiveDate) -> Option<usize> {
        self.lots
            .iter()
            .position(|lot| lot.ticker == ticker && lot.date <= date)
    }

    /// First lot in insertion order dated strictly before `date`.
    pub fn first_before(&self, ticker: &str, date: NaiveDate) -> Option<usize> {
        self.lots
            .iter()
            .position(|lot| lot.ticker == ticker && lot.date < date)
    }

    /// Last lot in insertion order dated strictly before `date`.
    pub fn latest_before(&self, ticker: &str, date: NaiveDate) -> Option<usize> {
        self.lots
            .iter()
            .rposition(|lot| lot.ticker == ticker && lot.date < date)
    }

    pub fn lot(&self, index: usize) -> &ShareRecord {
        &self.lots[index]
    }

    pub fn insert(&mut self, lot: ShareRecord) {
        self.lots.push(lot);
    }

    pub fn replace(&mut self, index: usize, lot: ShareRecord) {
        self.lots[index] = lot;
    }

    pub fn remove(&mut self, index: usize) -> ShareRecord {
        self.lots.remove(index)
    }

    /// Drop every lot whose quantity is zero (or was driven below it),
    /// returning the dropped lots.
    pub fn purge_exhausted(&mut self) -> Vec<ShareRecord> {
        let (kept, purged): (Vec<_>, Vec<_>) =
            self.lots.drain(..).partition(|lot| !lot.is_exhausted());
        self.lots = kept;
        purged
    }

    /// Distinct tickers in first-seen order.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = Vec::new();
        for lot in &self.lots {
            if !tickers.contains(&lot.ticker) {
                tickers.push(lot.ticker.clone());
            }
        }
        tickers
    }

    pub fn quantity_of(&self, ticker: &str) -> f64 {
        self.lots_for(ticker).map(|lot| lot.quantity).sum()
    }
}

impl<'a> IntoIterator for &'a Holdings {
    type Item = &'a ShareRecord;
    type IntoIter = std::slice::Iter<'a, ShareRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.lots.iter()
    }
}
