//! Directory-backed ledger store.
//!
//! Layout under the store directory, per portfolio `name`:
//! `name.csv` transaction log (8-field records, no header),
//! `name.strategies` one strategy per line,
//! `name.meta` holding `kind=basic|flexible`.

use crate::domain::error::SharebookError;
use crate::domain::portfolio::PortfolioKind;
use crate::domain::strategy::{self, Strategy};
use crate::domain::transaction::{self, Transaction};
use crate::ports::ledger_store::LedgerStore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const LOG_EXT: &str = "csv";
const STRATEGY_EXT: &str = "strategies";
const META_EXT: &str = "meta";

pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, ext))
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>, SharebookError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SharebookError::Io(e)),
        }
    }

    /// Written to a sibling temp file, then renamed over `path`.
    fn write_atomic(&self, path: &Path, content: &str) -> Result<(), SharebookError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = temp_path(path);
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), bytes = content.len(), "wrote ledger file");
        Ok(())
    }
}

/// `name.csv` becomes `name.csv.tmp`, so each file gets its own temp file.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl LedgerStore for FileLedgerStore {
    fn load_log(&self, name: &str) -> Result<Vec<Transaction>, SharebookError> {
        let path = self.path(name, LOG_EXT);
        let content = self
            .read_optional(&path)?
            .ok_or_else(|| SharebookError::not_found(format!("portfolio {}", name)))?;
        Ok(transaction::decode_log(&content)?)
    }

    fn save_log(&self, name: &str, log: &[Transaction]) -> Result<(), SharebookError> {
        self.write_atomic(&self.path(name, LOG_EXT), &transaction::encode_log(log))
    }

    fn load_strategies(&self, name: &str) -> Result<Vec<Strategy>, SharebookError> {
        match self.read_optional(&self.path(name, STRATEGY_EXT))? {
            Some(content) => Ok(strategy::decode_strategies(&content)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_strategies(&self, name: &str, strategies: &[Strategy]) -> Result<(), SharebookError> {
        self.write_atomic(
            &self.path(name, STRATEGY_EXT),
            &strategy::encode_strategies(strategies),
        )
    }

    fn load_kind(&self, name: &str) -> Result<PortfolioKind, SharebookError> {
        let Some(content) = self.read_optional(&self.path(name, META_EXT))? else {
            return Ok(PortfolioKind::default());
        };
        content
            .lines()
            .filter_map(|line| line.split_once('='))
            .find(|(key, _)| key.trim() == "kind")
            .map(|(_, value)| value.parse())
            .unwrap_or(Ok(PortfolioKind::default()))
    }

    fn save_kind(&self, name: &str, kind: PortfolioKind) -> Result<(), SharebookError> {
        self.write_atomic(&self.path(name, META_EXT), &format!("kind={}\n", kind))
    }

    fn list_portfolios(&self) -> Result<Vec<String>, SharebookError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SharebookError::Io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
