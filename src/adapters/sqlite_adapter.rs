//! SQLite price source and ledger store.

use crate::domain::config_validation;
use crate::domain::error::SharebookError;
use crate::domain::portfolio::PortfolioKind;
use crate::domain::quote::{format_date, PriceQuote, DATE_FORMAT};
use crate::domain::strategy::Strategy;
use crate::domain::transaction::{Action, Transaction};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_store::LedgerStore;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> SharebookError {
    SharebookError::Storage {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> SharebookError {
    SharebookError::StorageQuery {
        reason: e.to_string(),
    }
}

fn conversion_error(
    column: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
}

fn date_column(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_error(column, e))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SharebookError> {
        let db_path = config_validation::sqlite_path(config)?;
        let pool_size = config_validation::pool_size(config)?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, SharebookError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SharebookError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), SharebookError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS quotes (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE TABLE IF NOT EXISTS portfolios (
                    name TEXT PRIMARY KEY,
                    kind TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS transactions (
                    portfolio TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    quantity REAL NOT NULL,
                    cost REAL NOT NULL,
                    action TEXT NOT NULL,
                    PRIMARY KEY (portfolio, seq)
                );
                CREATE TABLE IF NOT EXISTS strategies (
                    portfolio TEXT NOT NULL,
                    name TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    entry TEXT NOT NULL,
                    PRIMARY KEY (portfolio, name, seq)
                );",
            )
            .map_err(query_error)
    }

    pub fn insert_quotes(&self, quotes: &[PriceQuote]) -> Result<(), SharebookError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for q in quotes {
            tx.execute(
                "INSERT OR REPLACE INTO quotes (ticker, date, open, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    q.ticker,
                    format_date(q.date),
                    q.open,
                    q.close,
                    q.volume as i64
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(rows = quotes.len(), "inserted quotes");
        Ok(())
    }

    fn registered(&self, name: &str) -> Result<Option<String>, SharebookError> {
        self.conn()?
            .query_row(
                "SELECT kind FROM portfolios WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)
    }
}

fn quote_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceQuote> {
    let volume: i64 = row.get(4)?;
    Ok(PriceQuote::new(
        row.get::<_, String>(0)?,
        date_column(row, 1)?,
        row.get(2)?,
        row.get(3)?,
        volume.max(0) as u64,
    ))
}

impl PricePort for SqliteAdapter {
    fn lookup(&self, ticker: &str, date: NaiveDate) -> Result<Option<PriceQuote>, SharebookError> {
        self.conn()?
            .query_row(
                "SELECT ticker, date, open, close, volume FROM quotes
                 WHERE ticker = ?1 AND date = ?2",
                params![ticker.to_uppercase(), format_date(date)],
                quote_from_row,
            )
            .optional()
            .map_err(query_error)
    }

    fn series(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticker, date, open, close, volume FROM quotes
                 WHERE ticker = ?1 ORDER BY date ASC",
            )
            .map_err(query_error)?;
        let quotes = stmt
            .query_map(params![ticker.to_uppercase()], quote_from_row)
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;

        if quotes.is_empty() {
            return Err(SharebookError::not_found(format!("price data for {}", ticker)));
        }
        Ok(quotes)
    }
}

impl LedgerStore for SqliteAdapter {
    fn load_log(&self, name: &str) -> Result<Vec<Transaction>, SharebookError> {
        if self.registered(name)?.is_none() {
            return Err(SharebookError::not_found(format!("portfolio {}", name)));
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticker, date, open, close, volume, quantity, cost, action
                 FROM transactions WHERE portfolio = ?1 ORDER BY seq ASC",
            )
            .map_err(query_error)?;
        let log = stmt
            .query_map(params![name], |row| {
                let volume: i64 = row.get(4)?;
                let action: String = row.get(7)?;
                Ok(Transaction {
                    ticker: row.get(0)?,
                    date: date_column(row, 1)?,
                    open: row.get(2)?,
                    close: row.get(3)?,
                    volume: volume.max(0) as u64,
                    quantity_delta: row.get(5)?,
                    cost_delta: row.get(6)?,
                    action: action.parse::<Action>().map_err(|e| conversion_error(7, e))?,
                })
            })
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;
        Ok(log)
    }

    fn save_log(&self, name: &str, log: &[Transaction]) -> Result<(), SharebookError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute(
            "INSERT OR IGNORE INTO portfolios (name, kind) VALUES (?1, ?2)",
            params![name, PortfolioKind::default().to_string()],
        )
        .map_err(query_error)?;
        tx.execute("DELETE FROM transactions WHERE portfolio = ?1", params![name])
            .map_err(query_error)?;
        for (seq, t) in log.iter().enumerate() {
            tx.execute(
                "INSERT INTO transactions
                 (portfolio, seq, ticker, date, open, close, volume, quantity, cost, action)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    name,
                    seq as i64,
                    t.ticker,
                    format_date(t.date),
                    t.open,
                    t.close,
                    t.volume as i64,
                    t.quantity_delta,
                    t.cost_delta,
                    t.action.to_string()
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(portfolio = name, events = log.len(), "saved log");
        Ok(())
    }

    fn load_strategies(&self, name: &str) -> Result<Vec<Strategy>, SharebookError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT name, entry FROM strategies
                 WHERE portfolio = ?1 ORDER BY rowid ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_error)?;

        let mut strategies: Vec<Strategy> = Vec::new();
        for (strategy_name, entry) in rows {
            match strategies.iter_mut().find(|s| s.name == strategy_name) {
                Some(s) => s.entries.push(entry),
                None => strategies.push(Strategy::new(strategy_name, vec![entry])?),
            }
        }
        Ok(strategies)
    }

    fn save_strategies(&self, name: &str, strategies: &[Strategy]) -> Result<(), SharebookError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute("DELETE FROM strategies WHERE portfolio = ?1", params![name])
            .map_err(query_error)?;
        for s in strategies {
            for (seq, entry) in s.entries.iter().enumerate() {
                tx.execute(
                    "INSERT INTO strategies (portfolio, name, seq, entry)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, s.name, seq as i64, entry],
                )
                .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)
    }

    fn load_kind(&self, name: &str) -> Result<PortfolioKind, SharebookError> {
        match self.registered(name)? {
            Some(kind) => kind.parse(),
            None => Ok(PortfolioKind::default()),
        }
    }

    fn save_kind(&self, name: &str, kind: PortfolioKind) -> Result<(), SharebookError> {
        self.conn()?
            .execute(
                "INSERT INTO portfolios (name, kind) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET kind = excluded.kind",
                params![name, kind.to_string()],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn list_portfolios(&self) -> Result<Vec<String>, SharebookError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM portfolios ORDER BY name")
            .map_err(query_error)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(query_error)?;
        Ok(names)
    }
}
