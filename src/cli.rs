//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_ledger_adapter::FileLedgerStore;
use crate::adapters::logging;
use crate::adapters::system_clock::SystemClock;
use crate::domain::bucketer::PerformanceSeries;
use crate::domain::config_validation::{self, StorageBackend};
use crate::domain::error::SharebookError;
use crate::domain::holdings::Holdings;
use crate::domain::investment::{Allocation, DollarCostPlan};
use crate::domain::portfolio::{Portfolio, PortfolioKind, Pricing};
use crate::domain::quote::{format_date, parse_date, PriceQuote};
use crate::domain::replay::ReplayPolicy;
use crate::domain::statistics;
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_store::LedgerStore;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(name = "sharebook", about = "Share portfolio ledger and price analytics")]
pub struct Cli {
    /// INI configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a portfolio, optionally with initial holdings bought on --date
    Create {
        name: String,
        #[arg(long, default_value = "flexible", value_parser = parse_kind)]
        kind: PortfolioKind,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// Initial holdings as TICKER=QUANTITY
        #[arg(value_parser = parse_holding)]
        holdings: Vec<(String, f64)>,
    },
    /// List stored portfolios
    List,
    /// Buy shares at the quote of DATE
    Buy {
        name: String,
        ticker: String,
        quantity: f64,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Sell shares from the first lot bought on or before DATE
    Sell {
        name: String,
        ticker: String,
        quantity: f64,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Market value of the holdings as of DATE
    Value {
        name: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Current lots
    Composition { name: String },
    /// Money invested through buys up to DATE
    Invested {
        name: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Bar chart of portfolio value between START and END
    Performance {
        name: String,
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: NaiveDate,
    },
    /// Transaction log in append order
    History { name: String },
    /// Split AMOUNT across TICKER=PERCENT allocations at the prices of DATE
    Invest {
        name: String,
        amount: f64,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(required = true, value_parser = parse_allocation)]
        allocations: Vec<Allocation>,
    },
    /// Invest AMOUNT every --every days from --start to --end and store it as a strategy
    DollarCost {
        name: String,
        strategy: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date_arg)]
        end: NaiveDate,
        #[arg(long, default_value_t = 30)]
        every: u32,
        #[arg(required = true, value_parser = parse_allocation)]
        allocations: Vec<Allocation>,
    },
    /// Apply a strategy stored in another portfolio
    ApplyStrategy {
        name: String,
        from: String,
        strategy: String,
    },
    /// Stored strategies
    Strategies { name: String },
    /// Bar chart of a ticker's close between START and END
    StockPerformance {
        ticker: String,
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: NaiveDate,
    },
    /// Close minus open on DATE, or close change from DATE to END
    Trend {
        ticker: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: Option<NaiveDate>,
    },
    /// Average close over the DAYS entries ending at DATE
    MovingAverage {
        ticker: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
        days: usize,
    },
    /// Close crossing its 30-day moving average
    Crossovers {
        ticker: String,
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: NaiveDate,
    },
    /// X-day moving average crossing the Y-day one
    MovingCrossovers {
        ticker: String,
        #[arg(value_parser = parse_date_arg)]
        start: NaiveDate,
        #[arg(value_parser = parse_date_arg)]
        end: NaiveDate,
        x: usize,
        y: usize,
    },
    /// Copy CSV quotes for TICKERS from [data] prices_dir into the SQLite database
    #[cfg(feature = "sqlite")]
    ImportQuotes {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Check the configuration file and exit
    ValidateConfig,
}

pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

pub fn parse_kind(s: &str) -> Result<PortfolioKind, String> {
    s.parse().map_err(|e: SharebookError| e.to_string())
}

pub fn parse_allocation(s: &str) -> Result<Allocation, String> {
    s.parse().map_err(|e: SharebookError| e.to_string())
}

/// `TICKER=QUANTITY`, ticker upper-cased.
pub fn parse_holding(s: &str) -> Result<(String, f64), String> {
    let (ticker, quantity) = s
        .split_once('=')
        .ok_or_else(|| format!("holding {:?} is not TICKER=QUANTITY", s))?;
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(format!("holding {:?} has no ticker", s));
    }
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("holding {:?} has a non-numeric quantity", s))?;
    Ok((ticker, quantity))
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    logging::init(&config);

    if let Err(e) = config_validation::validate_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    match execute(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    match path {
        None => Ok(FileConfigAdapter::empty()),
        Some(path) => FileConfigAdapter::from_file(path).map_err(|err| {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }),
    }
}

pub fn build_store(config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, SharebookError> {
    match config_validation::storage_backend(config)? {
        StorageBackend::File => Ok(Box::new(FileLedgerStore::new(
            config_validation::storage_dir(config),
        ))),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(SharebookError::ConfigInvalid {
            section: "storage".into(),
            key: "backend".into(),
            reason: "sqlite feature is required for the sqlite backend".into(),
        }),
    }
}

/// CSV files when `[data] prices_dir` is set, otherwise the SQLite quotes table
/// for the sqlite backend.
pub fn build_prices(config: &dyn ConfigPort) -> Result<Box<dyn PricePort>, SharebookError> {
    match config_validation::prices_dir(config) {
        Ok(dir) => Ok(Box::new(CsvPriceAdapter::new(dir))),
        #[cfg(feature = "sqlite")]
        Err(_)
            if matches!(
                config_validation::storage_backend(config),
                Ok(StorageBackend::Sqlite)
            ) =>
        {
            Ok(Box::new(
                crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
            ))
        }
        Err(e) => Err(e),
    }
}

struct Session<'a> {
    config: &'a dyn ConfigPort,
    policy: ReplayPolicy,
}

impl Session<'_> {
    fn load(&self, store: &dyn LedgerStore, name: &str) -> Result<Portfolio, SharebookError> {
        Portfolio::load(name, store, self.policy)
    }

    fn with_pricing<T>(
        &self,
        f: impl FnOnce(&Pricing<'_>) -> Result<T, SharebookError>,
    ) -> Result<T, SharebookError> {
        let prices = build_prices(self.config)?;
        let pricing = Pricing {
            prices: prices.as_ref(),
            clock: &SystemClock,
            session: config_validation::market_session(self.config)?,
        };
        f(&pricing)
    }
}

pub fn execute(command: Command, config: &dyn ConfigPort) -> Result<(), SharebookError> {
    let session = Session {
        config,
        policy: config_validation::replay_policy(config)?,
    };

    match command {
        Command::Create {
            name,
            kind,
            date,
            holdings,
        } => run_create(&session, &name, kind, date, &holdings),
        Command::List => {
            for name in build_store(config)?.list_portfolios()? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Buy {
            name,
            ticker,
            quantity,
            date,
        } => {
            let store = build_store(config)?;
            let mut portfolio = session.load(store.as_ref(), &name)?;
            let quote = build_prices(config)?.require(&ticker.to_uppercase(), date)?;
            let tx = portfolio.buy(quantity, &quote)?;
            portfolio.save(store.as_ref())?;
            println!("{}", tx);
            Ok(())
        }
        Command::Sell {
            name,
            ticker,
            quantity,
            date,
        } => {
            let store = build_store(config)?;
            let mut portfolio = session.load(store.as_ref(), &name)?;
            let tx = portfolio.sell(quantity, &ticker.to_uppercase(), date)?;
            portfolio.save(store.as_ref())?;
            println!("{}", tx);
            Ok(())
        }
        Command::Value { name, date } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            let value = session.with_pricing(|p| portfolio.total_value(date, p))?;
            println!("{:.2}", value);
            Ok(())
        }
        Command::Composition { name } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            print!("{}", render_composition(portfolio.total_composition()?));
            Ok(())
        }
        Command::Invested { name, date } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            println!("{:.2}", portfolio.total_investment_as_of(date));
            Ok(())
        }
        Command::Performance { name, start, end } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            let series = session.with_pricing(|p| portfolio.performance_series(start, end, p))?;
            print!("{}", render_performance(&series));
            Ok(())
        }
        Command::History { name } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            for tx in portfolio.transaction_history() {
                println!("{}", tx);
            }
            Ok(())
        }
        Command::Invest {
            name,
            amount,
            date,
            allocations,
        } => {
            let store = build_store(config)?;
            let mut portfolio = session.load(store.as_ref(), &name)?;
            let prices = build_prices(config)?;
            let txs = portfolio.invest_fixed_amount(amount, &allocations, date, prices.as_ref())?;
            portfolio.save(store.as_ref())?;
            for tx in &txs {
                println!("{}", tx);
            }
            Ok(())
        }
        Command::DollarCost {
            name,
            strategy,
            amount,
            start,
            end,
            every,
            allocations,
        } => {
            let plan = DollarCostPlan {
                amount,
                allocations,
                start,
                end,
                interval_days: every,
            };
            let store = build_store(config)?;
            let mut portfolio = session.load(store.as_ref(), &name)?;
            let prices = build_prices(config)?;
            let created = portfolio.dollar_cost_strategy(&strategy, &plan, prices.as_ref())?;
            portfolio.save(store.as_ref())?;
            eprintln!(
                "Strategy {} applied: {} investments",
                created.name,
                created.entries.len()
            );
            println!("{}", created.encode_line());
            Ok(())
        }
        Command::ApplyStrategy {
            name,
            from,
            strategy,
        } => {
            let store = build_store(config)?;
            let source = find_strategy(store.load_strategies(&from)?, &from, &strategy)?;
            let mut portfolio = session.load(store.as_ref(), &name)?;
            let prices = build_prices(config)?;
            let txs = portfolio.add_strategy(source, prices.as_ref())?;
            portfolio.save(store.as_ref())?;
            for tx in &txs {
                println!("{}", tx);
            }
            Ok(())
        }
        Command::Strategies { name } => {
            let portfolio = session.load(build_store(config)?.as_ref(), &name)?;
            for s in portfolio.strategies() {
                println!("{}", s.encode_line());
            }
            Ok(())
        }
        Command::StockPerformance { ticker, start, end } => {
            let series = build_prices(config)?.series(&ticker.to_uppercase())?;
            let performance = statistics::stock_performance(&series, start, end)?;
            print!("{}", render_performance(&performance));
            Ok(())
        }
        Command::Trend { ticker, date, end } => {
            let prices = build_prices(config)?;
            let ticker = ticker.to_uppercase();
            let trend = match end {
                None => statistics::trend_for_day(&prices.require(&ticker, date)?),
                Some(end) => statistics::trend_between(&prices.series(&ticker)?, date, end)?,
            };
            println!("{:.4}", trend);
            Ok(())
        }
        Command::MovingAverage { ticker, date, days } => {
            let series = build_prices(config)?.series(&ticker.to_uppercase())?;
            println!("{:.4}", statistics::x_day_moving_average(&series, date, days)?);
            Ok(())
        }
        Command::Crossovers { ticker, start, end } => {
            let series = build_prices(config)?.series(&ticker.to_uppercase())?;
            for c in statistics::cross_overs(&series, start, end)? {
                println!("{},{}", format_date(c.date), c.signal);
            }
            Ok(())
        }
        Command::MovingCrossovers {
            ticker,
            start,
            end,
            x,
            y,
        } => {
            let series = build_prices(config)?.series(&ticker.to_uppercase())?;
            for c in statistics::moving_crossovers(&series, start, end, x, y)? {
                println!("{},{}", format_date(c.date), c.signal);
            }
            Ok(())
        }
        #[cfg(feature = "sqlite")]
        Command::ImportQuotes { tickers } => run_import_quotes(config, &tickers),
        Command::ValidateConfig => {
            eprintln!("Configuration is valid");
            Ok(())
        }
    }
}

fn run_create(
    session: &Session<'_>,
    name: &str,
    kind: PortfolioKind,
    date: Option<NaiveDate>,
    holdings: &[(String, f64)],
) -> Result<(), SharebookError> {
    let store = build_store(session.config)?;
    if store.exists(name)? {
        return Err(SharebookError::invalid(format!(
            "portfolio {} already exists",
            name
        )));
    }

    let purchases: Vec<(f64, PriceQuote)> = if holdings.is_empty() {
        Vec::new()
    } else {
        let date = date.ok_or_else(|| {
            SharebookError::invalid("--date is required when initial holdings are given")
        })?;
        let prices = build_prices(session.config)?;
        holdings
            .iter()
            .map(|(ticker, quantity)| Ok((*quantity, prices.require(ticker, date)?)))
            .collect::<Result<_, SharebookError>>()?
    };

    let portfolio = Portfolio::create(name, kind, &purchases, session.policy)?;
    portfolio.save(store.as_ref())?;
    eprintln!(
        "Created {} portfolio {} with {} lots",
        kind,
        name,
        portfolio.ledger().holdings().len()
    );
    Ok(())
}

fn find_strategy(
    strategies: Vec<Strategy>,
    portfolio: &str,
    name: &str,
) -> Result<Strategy, SharebookError> {
    strategies
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| SharebookError::not_found(format!("strategy {} in {}", name, portfolio)))
}

#[cfg(feature = "sqlite")]
fn run_import_quotes(config: &dyn ConfigPort, tickers: &[String]) -> Result<(), SharebookError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let csv = CsvPriceAdapter::new(config_validation::prices_dir(config)?);
    let db = SqliteAdapter::from_config(config)?;
    for ticker in tickers {
        let quotes = csv.series(&ticker.to_uppercase())?;
        db.insert_quotes(&quotes)?;
        eprintln!("{}: {} quotes imported", ticker.to_uppercase(), quotes.len());
    }
    Ok(())
}

/// One line per lot: ticker, purchase date, quantity, cost basis.
pub fn render_composition(holdings: &Holdings) -> String {
    let mut out = String::new();
    for lot in holdings {
        out.push_str(&format!(
            "{:<8} {} {:>14.4} {:>14.2}\n",
            lot.ticker,
            format_date(lot.date),
            lot.quantity,
            lot.cost_basis
        ));
    }
    out
}

/// `label: ***` per bucket, then the scale legend.
pub fn render_performance(series: &PerformanceSeries) -> String {
    let width = series
        .points
        .iter()
        .map(|p| p.label.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for point in &series.points {
        out.push_str(&format!(
            "{:<width$}: {}\n",
            point.label,
            "*".repeat(series.bar_units(point.value)),
            width = width
        ));
    }
    out.push_str(&format!("\nScale: * = {}\n", series.scale));
    out
}
