//! Domain error types.

/// A transaction or strategy record that does not match its encoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("record parse error at line {line}: {message}")]
pub struct RecordParseError {
    pub message: String,
    pub line: usize,
}

impl RecordParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    /// Format the error followed by the offending record.
    pub fn display_with_context(&self, record: &str) -> String {
        format!("{err}\n  {record}", err = self, record = record)
    }
}

/// Top-level error type for sharebook.
#[derive(Debug, thiserror::Error)]
pub enum SharebookError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("ticker {ticker} is not held on or before {date}")]
    TickerNotHeld { ticker: String, date: String },

    #[error("cannot sell {requested} shares of {ticker}: only {available} available")]
    InsufficientQuantity {
        ticker: String,
        requested: f64,
        available: f64,
    },

    #[error("insufficient data for {ticker}: have {have} entries ending at {date}, need {need}")]
    InsufficientData {
        ticker: String,
        date: String,
        have: usize,
        need: usize,
    },

    #[error("invalid start date {date}: no data found on or after {start}")]
    InvalidStartDate { date: String, start: String },

    #[error("portfolio is empty: create or load a portfolio with holdings first")]
    EmptyPortfolio,

    #[error("{operation} is not supported by {kind} portfolios")]
    Unsupported { operation: String, kind: String },

    #[error(transparent)]
    RecordParse(#[from] RecordParseError),

    #[error("invalid date {value:?} (expected YYYY-MM-DD)")]
    DateParse { value: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SharebookError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SharebookError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        SharebookError::NotFound { what: what.into() }
    }

    /// True for conditions the caller can recover from by asking for a different
    /// date, ticker or range.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SharebookError::NotFound { .. }
                | SharebookError::TickerNotHeld { .. }
                | SharebookError::InvalidStartDate { .. }
                | SharebookError::InsufficientData { .. }
        )
    }
}

impl From<&SharebookError> for std::process::ExitCode {
    fn from(err: &SharebookError) -> Self {
        let code: u8 = match err {
            SharebookError::Io(_) => 1,
            SharebookError::ConfigParse { .. }
            | SharebookError::ConfigMissing { .. }
            | SharebookError::ConfigInvalid { .. } => 2,
            SharebookError::Storage { .. } | SharebookError::StorageQuery { .. } => 3,
            SharebookError::RecordParse(_) | SharebookError::DateParse { .. } => 4,
            SharebookError::NotFound { .. }
            | SharebookError::TickerNotHeld { .. }
            | SharebookError::InsufficientData { .. }
            | SharebookError::InvalidStartDate { .. }
            | SharebookError::EmptyPortfolio => 5,
            SharebookError::InvalidInput { .. }
            | SharebookError::InsufficientQuantity { .. }
            | SharebookError::Unsupported { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parse_error_display() {
        let err = RecordParseError::new(3, "expected 8 fields, found 7");
        assert_eq!(
            err.to_string(),
            "record parse error at line 3: expected 8 fields, found 7"
        );
    }

    #[test]
    fn display_with_context_appends_record() {
        let err = RecordParseError::new(1, "bad action");
        let out = err.display_with_context("ABC,2023-01-05,1,2,3,4,5,HOLD");
        assert!(out.ends_with("  ABC,2023-01-05,1,2,3,4,5,HOLD"));
    }

    #[test]
    fn insufficient_quantity_reports_available() {
        let err = SharebookError::InsufficientQuantity {
            ticker: "ABC".into(),
            requested: 12.0,
            available: 10.0,
        };
        assert!(err.to_string().contains("only 10 available"));
    }

    #[test]
    fn not_found_family() {
        assert!(SharebookError::not_found("x").is_not_found());
        assert!(
            SharebookError::TickerNotHeld {
                ticker: "ABC".into(),
                date: "2023-01-01".into()
            }
            .is_not_found()
        );
        assert!(!SharebookError::EmptyPortfolio.is_not_found());
        assert!(!SharebookError::invalid("x").is_not_found());
    }
}
