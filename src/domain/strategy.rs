//! Stored recurring-investment strategies.
//!
//! A strategy is a name plus a list of opaque entry strings, each of which
//! decodes to one [`InvestmentEntry`]. Stored one per line as
//! `name|entry|entry|...`.

use crate::domain::error::{RecordParseError, SharebookError};
use crate::domain::investment::InvestmentEntry;

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub entries: Vec<String>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, entries: Vec<String>) -> Result<Self, SharebookError> {
        let name = name.into();
        if name.trim().is_empty() || name.contains(SEPARATOR) || name.contains('\n') {
            return Err(SharebookError::invalid(format!(
                "strategy name {:?} must be non-empty and contain no '|' or newline",
                name
            )));
        }
        Ok(Self { name, entries })
    }

    pub fn from_investments(
        name: impl Into<String>,
        investments: &[InvestmentEntry],
    ) -> Result<Self, SharebookError> {
        Self::new(name, investments.iter().map(InvestmentEntry::encode).collect())
    }

    pub fn investments(&self) -> Result<Vec<InvestmentEntry>, SharebookError> {
        self.entries
            .iter()
            .map(|e| InvestmentEntry::parse(e))
            .collect()
    }

    pub fn encode_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.entries.len() + 1);
        parts.push(self.name.as_str());
        parts.extend(self.entries.iter().map(String::as_str));
        parts.join(&SEPARATOR.to_string())
    }

    pub fn parse_line(line_no: usize, line: &str) -> Result<Self, RecordParseError> {
        let mut parts = line.split(SEPARATOR);
        let name = parts
            .next()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| RecordParseError::new(line_no, "strategy line has no name"))?;
        Ok(Self {
            name: name.to_string(),
            entries: parts.map(|e| e.trim().to_string()).collect(),
        })
    }
}

pub fn decode_strategies(content: &str) -> Result<Vec<Strategy>, RecordParseError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| Strategy::parse_line(i + 1, line))
        .collect()
}

pub fn encode_strategies(strategies: &[Strategy]) -> String {
    let mut out = String::new();
    for s in strategies {
        out.push_str(&s.encode_line());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::investment::Allocation;
    use chrono::NaiveDate;

    fn sample_strategy() -> Strategy {
        Strategy::new(
            "monthly",
            vec![
                "2023-01-05,100,ABC:40;XYZ:60".to_string(),
                "2023-02-06,100,ABC:40;XYZ:60".to_string(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn name_validation() {
        assert!(Strategy::new("", vec![]).is_err());
        assert!(Strategy::new("a|b", vec![]).is_err());
        assert!(Strategy::new("ok name", vec![]).is_ok());
    }

    #[test]
    fn line_encoding() {
        assert_eq!(
            sample_strategy().encode_line(),
            "monthly|2023-01-05,100,ABC:40;XYZ:60|2023-02-06,100,ABC:40;XYZ:60"
        );
        let parsed = Strategy::parse_line(1, &sample_strategy().encode_line()).unwrap();
        assert_eq!(parsed, sample_strategy());
    }

    #[test]
    fn strategy_without_entries() {
        let parsed = Strategy::parse_line(1, "empty").unwrap();
        assert!(parsed.entries.is_empty());
        assert!(Strategy::parse_line(2, "|x").is_err());
    }

    #[test]
    fn investments_decode_entries() {
        let investments = sample_strategy().investments().unwrap();
        assert_eq!(investments.len(), 2);
        assert_eq!(investments[1].date, NaiveDate::from_ymd_opt(2023, 2, 6).unwrap());
        assert_eq!(investments[0].allocations[1], Allocation::new("XYZ", 60.0));
    }

    #[test]
    fn from_investments_encodes_each() {
        let investments = sample_strategy().investments().unwrap();
        let rebuilt = Strategy::from_investments("monthly", &investments).unwrap();
        assert_eq!(rebuilt, sample_strategy());
    }

    #[test]
    fn file_encoding_skips_blank_lines() {
        let content = format!("{}\n\nsecond\n", sample_strategy().encode_line());
        let strategies = decode_strategies(&content).unwrap();
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[1].name, "second");
        assert_eq!(decode_strategies(&encode_strategies(&strategies)).unwrap(), strategies);
    }
}
