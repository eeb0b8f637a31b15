//! Portfolio façade: one ledger, its strategies, and the operations offered to
//! the presentation layer.
//!
//! The capability set depends on [`PortfolioKind`]. Basic portfolios are
//! fixed once created; flexible ones accept buys, sells and investments.

use crate::domain::bucketer::{self, PerformanceSeries};
use crate::domain::error::SharebookError;
use crate::domain::holdings::Holdings;
use crate::domain::investment::{self, Allocation, DollarCostPlan, InvestmentEntry};
use crate::domain::ledger::Ledger;
use crate::domain::quote::{format_date, PriceQuote};
use crate::domain::replay::ReplayPolicy;
use crate::domain::strategy::Strategy;
use crate::domain::transaction::Transaction;
use crate::domain::valuation::{self, MarketSession};
use crate::ports::clock_port::Clock;
use crate::ports::ledger_store::LedgerStore;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortfolioKind {
    Basic,
    #[default]
    Flexible,
}

impl fmt::Display for PortfolioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortfolioKind::Basic => write!(f, "basic"),
            PortfolioKind::Flexible => write!(f, "flexible"),
        }
    }
}

impl FromStr for PortfolioKind {
    type Err = SharebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "inflexible" => Ok(PortfolioKind::Basic),
            "flexible" => Ok(PortfolioKind::Flexible),
            other => Err(SharebookError::invalid(format!(
                "unknown portfolio kind {:?} (expected basic or flexible)",
                other
            ))),
        }
    }
}

/// Evaluation context for valuations: where prices come from, what time it
/// is, and the session window that decides open versus close.
pub struct Pricing<'a> {
    pub prices: &'a dyn PricePort,
    pub clock: &'a dyn Clock,
    pub session: MarketSession,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    name: String,
    kind: PortfolioKind,
    ledger: Ledger,
    strategies: Vec<Strategy>,
    policy: ReplayPolicy,
}

pub fn validate_name(name: &str) -> Result<(), SharebookError> {
    let bad = name.trim().is_empty()
        || name.trim() != name
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ',' | '|' | '.') || c.is_control());
    if bad {
        return Err(SharebookError::invalid(format!(
            "portfolio name {:?} must be non-empty with no surrounding spaces or / \\ , | . characters",
            name
        )));
    }
    Ok(())
}

impl Portfolio {
    /// New portfolio holding `purchases`. Any rejected purchase rejects the
    /// whole portfolio.
    pub fn create(
        name: &str,
        kind: PortfolioKind,
        purchases: &[(f64, PriceQuote)],
        policy: ReplayPolicy,
    ) -> Result<Self, SharebookError> {
        validate_name(name)?;
        if kind == PortfolioKind::Basic && purchases.is_empty() {
            return Err(SharebookError::invalid(
                "a basic portfolio must be created with at least one holding",
            ));
        }

        let mut ledger = Ledger::new();
        for (quantity, quote) in purchases {
            ledger.buy(*quantity, quote)?;
        }
        info!(name, %kind, holdings = ledger.holdings().len(), "portfolio created");
        Ok(Self {
            name: name.to_string(),
            kind,
            ledger,
            strategies: Vec::new(),
            policy,
        })
    }

    pub fn load(
        name: &str,
        store: &dyn LedgerStore,
        policy: ReplayPolicy,
    ) -> Result<Self, SharebookError> {
        validate_name(name)?;
        let log = store.load_log(name)?;
        let events = log.len();
        let ledger = Ledger::from_log(log, policy)?;
        let strategies = store.load_strategies(name)?;
        let kind = store.load_kind(name)?;
        info!(name, events, lots = ledger.holdings().len(), "portfolio loaded");
        Ok(Self {
            name: name.to_string(),
            kind,
            ledger,
            strategies,
            policy,
        })
    }

    pub fn save(&self, store: &dyn LedgerStore) -> Result<(), SharebookError> {
        store.save_kind(&self.name, self.kind)?;
        store.save_log(&self.name, self.ledger.log())?;
        store.save_strategies(&self.name, &self.strategies)?;
        info!(name = %self.name, events = self.ledger.log().len(), "portfolio saved");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PortfolioKind {
        self.kind
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn transaction_history(&self) -> &[Transaction] {
        self.ledger.log()
    }

    fn require_flexible(&self, operation: &str) -> Result<(), SharebookError> {
        match self.kind {
            PortfolioKind::Flexible => Ok(()),
            PortfolioKind::Basic => Err(SharebookError::Unsupported {
                operation: operation.to_string(),
                kind: self.kind.to_string(),
            }),
        }
    }

    pub fn buy(&mut self, quantity: f64, quote: &PriceQuote) -> Result<Transaction, SharebookError> {
        self.require_flexible("buy")?;
        self.ledger.buy(quantity, quote)
    }

    pub fn sell(
        &mut self,
        quantity: f64,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Transaction, SharebookError> {
        self.require_flexible("sell")?;
        self.ledger.sell(quantity, ticker, date)
    }

    /// Current lots. Fails when nothing is held.
    pub fn total_composition(&self) -> Result<&Holdings, SharebookError> {
        if self.ledger.is_empty() {
            return Err(SharebookError::EmptyPortfolio);
        }
        Ok(self.ledger.holdings())
    }

    /// Lots held at the end of `date`.
    pub fn composition_as_of(&self, date: NaiveDate) -> Result<Holdings, SharebookError> {
        self.ledger.holdings_as_of(date, self.policy)
    }

    pub fn total_investment_as_of(&self, date: NaiveDate) -> f64 {
        self.ledger.total_investment_as_of(date)
    }

    /// Value of the holdings as of `date`, or `None` when a held ticker has
    /// no quote that day.
    pub fn value_on(
        &self,
        date: NaiveDate,
        pricing: &Pricing<'_>,
    ) -> Result<Option<f64>, SharebookError> {
        let holdings = self.composition_as_of(date)?;
        let rows = valuation::rows_for_holdings(&holdings, date, |ticker, day| {
            pricing.prices.lookup(ticker, day)
        })?;
        Ok(rows.map(|rows| valuation::total_value(&rows, pricing.clock, &pricing.session)))
    }

    pub fn total_value(
        &self,
        date: NaiveDate,
        pricing: &Pricing<'_>,
    ) -> Result<f64, SharebookError> {
        if self.ledger.log().is_empty() {
            return Err(SharebookError::EmptyPortfolio);
        }
        self.value_on(date, pricing)?.ok_or_else(|| {
            SharebookError::not_found(format!(
                "prices for every holding of {} on {}",
                self.name,
                format_date(date)
            ))
        })
    }

    pub fn performance_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        pricing: &Pricing<'_>,
    ) -> Result<PerformanceSeries, SharebookError> {
        if self.ledger.log().is_empty() {
            return Err(SharebookError::EmptyPortfolio);
        }
        bucketer::bucket(start, end, |date| self.value_on(date, pricing))
    }

    /// Split `amount` across `allocations` at the prices of `date` and buy
    /// every leg, or none of them.
    pub fn invest_fixed_amount(
        &mut self,
        amount: f64,
        allocations: &[Allocation],
        date: NaiveDate,
        prices: &dyn PricePort,
    ) -> Result<Vec<Transaction>, SharebookError> {
        self.require_flexible("invest")?;
        let entry = InvestmentEntry {
            date,
            amount,
            allocations: allocations.to_vec(),
        };
        let mut scratch = self.ledger.clone();
        let applied = apply_investment(&mut scratch, &entry, prices)?;
        self.ledger = scratch;
        Ok(applied)
    }

    /// Build a strategy from `plan`, apply it and store it.
    pub fn dollar_cost_strategy(
        &mut self,
        name: &str,
        plan: &DollarCostPlan,
        prices: &dyn PricePort,
    ) -> Result<Strategy, SharebookError> {
        self.require_flexible("dollar-cost strategy")?;
        let entries = plan.schedule(prices)?;
        let strategy = Strategy::from_investments(name, &entries)?;
        self.add_strategy(strategy.clone(), prices)?;
        Ok(strategy)
    }

    /// Apply every investment in `strategy` and store it. Either all entries
    /// are applied or none.
    pub fn add_strategy(
        &mut self,
        strategy: Strategy,
        prices: &dyn PricePort,
    ) -> Result<Vec<Transaction>, SharebookError> {
        self.require_flexible("add strategy")?;
        if self.strategies.iter().any(|s| s.name == strategy.name) {
            return Err(SharebookError::invalid(format!(
                "strategy {:?} already exists",
                strategy.name
            )));
        }

        let mut scratch = self.ledger.clone();
        let mut applied = Vec::new();
        for entry in strategy.investments()? {
            applied.extend(apply_investment(&mut scratch, &entry, prices)?);
        }
        info!(
            portfolio = %self.name,
            strategy = %strategy.name,
            transactions = applied.len(),
            "strategy applied"
        );
        self.ledger = scratch;
        self.strategies.push(strategy);
        Ok(applied)
    }
}

fn apply_investment(
    ledger: &mut Ledger,
    entry: &InvestmentEntry,
    prices: &dyn PricePort,
) -> Result<Vec<Transaction>, SharebookError> {
    let legs = investment::split_amount(entry.amount, &entry.allocations, entry.date, prices)?;
    let mut applied = Vec::with_capacity(legs.len());
    for leg in &legs {
        applied.push(ledger.buy(leg.quantity, &leg.quote)?);
    }
    info!(
        date = %entry.date,
        amount = entry.amount,
        legs = legs.len(),
        "fixed amount invested"
    );
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock_port::FixedClock;
    use std::collections::HashMap;

    struct Prices(HashMap<(String, NaiveDate), PriceQuote>);

    impl PricePort for Prices {
        fn lookup(
            &self,
            ticker: &str,
            date: NaiveDate,
        ) -> Result<Option<PriceQuote>, SharebookError> {
            Ok(self.0.get(&(ticker.to_string(), date)).cloned())
        }

        fn series(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError> {
            let mut quotes: Vec<_> =
                self.0.values().filter(|q| q.ticker == ticker).cloned().collect();
            quotes.sort_by_key(|q| q.date);
            Ok(quotes)
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn quote(ticker: &str, d: u32, close: f64) -> PriceQuote {
        PriceQuote::new(ticker, date(d), close - 1.0, close, 1000)
    }

    fn prices(quotes: Vec<PriceQuote>) -> Prices {
        Prices(
            quotes
                .into_iter()
                .map(|q| ((q.ticker.clone(), q.date), q))
                .collect(),
        )
    }

    fn evening() -> FixedClock {
        FixedClock(date(31).and_hms_opt(20, 0, 0).unwrap())
    }

    fn flexible() -> Portfolio {
        Portfolio::create("retire", PortfolioKind::Flexible, &[], ReplayPolicy::default()).unwrap()
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("Basic".parse::<PortfolioKind>().unwrap(), PortfolioKind::Basic);
        assert_eq!("flexible".parse::<PortfolioKind>().unwrap(), PortfolioKind::Flexible);
        assert!("rigid".parse::<PortfolioKind>().is_err());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("retire").is_ok());
        assert!(validate_name("my savings").is_ok());
        for bad in ["", " lead", "a/b", "a,b", "a.b", "a|b"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn basic_portfolio_is_fixed_after_creation() {
        let mut p = Portfolio::create(
            "fixed",
            PortfolioKind::Basic,
            &[(10.0, quote("ABC", 5, 20.0))],
            ReplayPolicy::default(),
        )
        .unwrap();
        assert!(matches!(
            p.buy(1.0, &quote("ABC", 6, 20.0)),
            Err(SharebookError::Unsupported { .. })
        ));
        assert!(matches!(
            p.sell(1.0, "ABC", date(6)),
            Err(SharebookError::Unsupported { .. })
        ));
        assert_eq!(p.total_composition().unwrap().len(), 1);
    }

    #[test]
    fn basic_portfolio_needs_holdings() {
        let err = Portfolio::create("fixed", PortfolioKind::Basic, &[], ReplayPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SharebookError::InvalidInput { .. }));
    }

    #[test]
    fn create_is_all_or_nothing() {
        let err = Portfolio::create(
            "fixed",
            PortfolioKind::Basic,
            &[(10.0, quote("ABC", 5, 20.0)), (0.0, quote("XYZ", 5, 20.0))],
            ReplayPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SharebookError::InvalidInput { .. }));
    }

    #[test]
    fn empty_portfolio_conditions() {
        let p = flexible();
        let prices = prices(vec![]);
        let clock = evening();
        let pricing = Pricing {
            prices: &prices,
            clock: &clock,
            session: MarketSession::default(),
        };
        assert!(matches!(p.total_composition(), Err(SharebookError::EmptyPortfolio)));
        assert!(matches!(
            p.total_value(date(5), &pricing),
            Err(SharebookError::EmptyPortfolio)
        ));
    }

    #[test]
    fn value_uses_holdings_as_of_date() {
        let mut p = flexible();
        p.buy(10.0, &quote("ABC", 5, 20.0)).unwrap();
        p.sell(4.0, "ABC", date(10)).unwrap();

        let prices = prices(vec![quote("ABC", 9, 25.0), quote("ABC", 10, 30.0)]);
        let clock = evening();
        let pricing = Pricing {
            prices: &prices,
            clock: &clock,
            session: MarketSession::default(),
        };
        assert!((p.total_value(date(9), &pricing).unwrap() - 250.0).abs() < 1e-9);
        assert!((p.total_value(date(10), &pricing).unwrap() - 180.0).abs() < 1e-9);
        assert!(p.total_value(date(11), &pricing).unwrap_err().is_not_found());
        assert!((p.value_on(date(4), &pricing).unwrap().unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn invest_fixed_amount_buys_every_leg() {
        let mut p = flexible();
        let prices = prices(vec![quote("ABC", 5, 20.0), quote("XYZ", 5, 50.0)]);
        let txs = p
            .invest_fixed_amount(
                1000.0,
                &[Allocation::new("ABC", 40.0), Allocation::new("XYZ", 60.0)],
                date(5),
                &prices,
            )
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert!((p.ledger().holdings().quantity_of("ABC") - 20.0).abs() < 1e-9);
        assert!((p.ledger().holdings().quantity_of("XYZ") - 12.0).abs() < 1e-9);
        assert!((p.total_investment_as_of(date(5)) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn invest_fixed_amount_is_atomic() {
        let mut p = flexible();
        // XYZ volume is too small for its leg.
        let prices = prices(vec![
            quote("ABC", 5, 20.0),
            PriceQuote::new("XYZ", date(5), 1.0, 1.0, 10),
        ]);
        let err = p
            .invest_fixed_amount(
                1000.0,
                &[Allocation::new("ABC", 50.0), Allocation::new("XYZ", 50.0)],
                date(5),
                &prices,
            )
            .unwrap_err();
        assert!(matches!(err, SharebookError::InvalidInput { .. }));
        assert!(p.transaction_history().is_empty());
    }

    #[test]
    fn dollar_cost_strategy_stores_and_applies() {
        let mut p = flexible();
        let prices = prices(vec![
            quote("ABC", 2, 10.0),
            quote("ABC", 9, 20.0),
            quote("ABC", 16, 40.0),
        ]);
        let plan = DollarCostPlan {
            amount: 100.0,
            allocations: vec![Allocation::new("ABC", 100.0)],
            start: date(2),
            end: date(16),
            interval_days: 7,
        };
        let strategy = p.dollar_cost_strategy("weekly", &plan, &prices).unwrap();
        assert_eq!(strategy.entries.len(), 3);
        assert_eq!(p.strategies().len(), 1);
        assert_eq!(p.transaction_history().len(), 3);
        assert!((p.ledger().holdings().quantity_of("ABC") - 17.5).abs() < 1e-9);

        let again = p.add_strategy(strategy, &prices).unwrap_err();
        assert!(matches!(again, SharebookError::InvalidInput { .. }));
    }

    #[test]
    fn strategy_with_untradable_entry_is_rejected_whole() {
        let mut p = flexible();
        let prices = prices(vec![quote("ABC", 2, 10.0)]);
        let strategy = Strategy::new(
            "broken",
            vec![
                "2023-01-02,100,ABC:100".to_string(),
                "2023-01-03,100,ABC:100".to_string(),
            ],
        )
        .unwrap();
        assert!(p.add_strategy(strategy, &prices).unwrap_err().is_not_found());
        assert!(p.transaction_history().is_empty());
        assert!(p.strategies().is_empty());
    }

    #[test]
    fn basic_portfolio_rejects_investing() {
        let mut p = Portfolio::create(
            "fixed",
            PortfolioKind::Basic,
            &[(1.0, quote("ABC", 5, 20.0))],
            ReplayPolicy::default(),
        )
        .unwrap();
        let prices = prices(vec![quote("ABC", 5, 20.0)]);
        let err = p
            .invest_fixed_amount(100.0, &[Allocation::new("ABC", 100.0)], date(5), &prices)
            .unwrap_err();
        assert!(matches!(err, SharebookError::Unsupported { .. }));
    }
}
