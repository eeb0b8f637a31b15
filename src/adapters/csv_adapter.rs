//! CSV price source: one `<TICKER>.csv` file per ticker.

use crate::domain::error::{RecordParseError, SharebookError};
use crate::domain::quote::{parse_date, PriceQuote};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
    cache: RefCell<HashMap<String, Vec<PriceQuote>>>,
}

struct Columns {
    date: usize,
    open: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, RecordParseError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
                .ok_or_else(|| {
                    RecordParseError::new(1, format!("missing {} column", names.join("/")))
                })
        };
        Ok(Self {
            date: find(&["timestamp", "date"])?,
            open: find(&["open"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn read_quotes(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SharebookError::not_found(format!("price data for {} ({})", ticker, path.display()))
            }
            _ => SharebookError::Io(e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| RecordParseError::new(1, format!("unreadable header: {}", e)))?
            .clone();
        let columns = Columns::from_headers(&headers)?;

        let mut quotes = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record =
                result.map_err(|e| RecordParseError::new(line, format!("CSV parse error: {}", e)))?;
            quotes.push(parse_row(ticker, line, &record, &columns)?);
        }

        quotes.sort_by_key(|q| q.date);
        debug!(ticker, rows = quotes.len(), path = %path.display(), "loaded price file");
        Ok(quotes)
    }

    fn with_series<T>(
        &self,
        ticker: &str,
        f: impl FnOnce(&[PriceQuote]) -> T,
    ) -> Result<T, SharebookError> {
        let ticker = ticker.to_uppercase();
        if let Some(quotes) = self.cache.borrow().get(&ticker) {
            return Ok(f(quotes));
        }
        let quotes = self.read_quotes(&ticker)?;
        let out = f(&quotes);
        self.cache.borrow_mut().insert(ticker, quotes);
        Ok(out)
    }
}

fn parse_row(
    ticker: &str,
    line: usize,
    record: &csv::StringRecord,
    columns: &Columns,
) -> Result<PriceQuote, RecordParseError> {
    let field = |index: usize, name: &str| {
        record
            .get(index)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RecordParseError::new(line, format!("missing {} value", name)))
    };
    let number = |index: usize, name: &str| -> Result<f64, RecordParseError> {
        field(index, name)?
            .parse::<f64>()
            .map_err(|e| RecordParseError::new(line, format!("invalid {} value: {}", name, e)))
    };

    let date = parse_date(field(columns.date, "date")?)
        .map_err(|e| RecordParseError::new(line, e.to_string()))?;
    let volume_text = field(columns.volume, "volume")?;
    let volume = match volume_text.parse::<u64>() {
        Ok(v) => v,
        Err(_) => match volume_text.parse::<f64>() {
            Ok(v) if v >= 0.0 && v.is_finite() => v as u64,
            _ => {
                return Err(RecordParseError::new(
                    line,
                    format!("invalid volume value {:?}", volume_text),
                ))
            }
        },
    };

    Ok(PriceQuote::new(
        ticker,
        date,
        number(columns.open, "open")?,
        number(columns.close, "close")?,
        volume,
    ))
}

impl PricePort for CsvPriceAdapter {
    fn lookup(&self, ticker: &str, date: NaiveDate) -> Result<Option<PriceQuote>, SharebookError> {
        self.with_series(ticker, |quotes| {
            quotes
                .binary_search_by_key(&date, |q| q.date)
                .ok()
                .map(|i| quotes[i].clone())
        })
    }

    fn series(&self, ticker: &str) -> Result<Vec<PriceQuote>, SharebookError> {
        self.with_series(ticker, |quotes| quotes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        // Newest first, the way most download sources deliver it.
        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n";
        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(
            path.join("CBA.csv"),
            "date,open,high,low,close,volume\n2024-01-15,1,2,0.5,1.5,100.0\n",
        )
        .unwrap();
        fs::write(
            path.join("BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-15,1,2,0.5,abc,100\n",
        )
        .unwrap();

        (dir, path)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn series_is_sorted_ascending() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        let quotes = adapter.series("BHP").unwrap();
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].date, date(15));
        assert_eq!(quotes[0].open, 100.0);
        assert_eq!(quotes[0].close, 105.0);
        assert_eq!(quotes[0].volume, 50000);
        assert_eq!(quotes[2].date, date(17));
    }

    #[test]
    fn lookup_hits_exact_date_only() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        assert_eq!(adapter.lookup("bhp", date(16)).unwrap().unwrap().close, 110.0);
        assert!(adapter.lookup("BHP", date(18)).unwrap().is_none());
        assert!(adapter.require("BHP", date(14)).unwrap_err().is_not_found());
    }

    #[test]
    fn date_header_and_float_volume_accepted() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert_eq!(adapter.lookup("CBA", date(15)).unwrap().unwrap().volume, 100);
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert!(adapter.series("XYZ").unwrap_err().is_not_found());
    }

    #[test]
    fn malformed_row_reports_line() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        match adapter.series("BAD").unwrap_err() {
            SharebookError::RecordParse(e) => assert_eq!(e.line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
