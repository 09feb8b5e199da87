//! Price records and the delimited-line parser.
//!
//! A source is a header line followed by one record per line. The header is
//! skipped by the caller; `parse` only ever sees record lines.

use crate::decimal::Price;
use crate::error::{ParseError, ParseResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field delimiter for every supported layout.
pub const DELIMITER: char = ',';

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Column layout of a price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    /// `identifier,price,timestamp,...`
    #[default]
    Compact,
    /// `Ticker,TradeDate,Open,High,Low,Close,Volume,Change,ChangePercent`
    ///
    /// The close price is used as the record price.
    Quote,
}

impl RecordLayout {
    /// Minimum number of fields a line must have.
    pub fn min_fields(&self) -> usize {
        match self {
            Self::Compact => 3,
            Self::Quote => 9,
        }
    }

    fn identifier_col(&self) -> usize {
        0
    }

    fn price_col(&self) -> usize {
        match self {
            Self::Compact => 1,
            Self::Quote => 5,
        }
    }

    fn timestamp_col(&self) -> usize {
        match self {
            Self::Compact => 2,
            Self::Quote => 1,
        }
    }
}

impl fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Quote => write!(f, "quote"),
        }
    }
}

impl FromStr for RecordLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "quote" => Ok(Self::Quote),
            other => Err(format!("unknown record layout: {other}")),
        }
    }
}

/// One parsed row of a price source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub identifier: String,
    pub price: Price,
    /// Raw text of the timestamp column.
    pub timestamp: String,
    /// Remaining columns, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl PriceRecord {
    pub fn new(identifier: impl Into<String>, price: Price, timestamp: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            price,
            timestamp: timestamp.into(),
            extra: Vec::new(),
        }
    }

    /// Interpret the timestamp column, if it is in a recognised format.
    ///
    /// Date-only values resolve to midnight.
    pub fn trade_time(&self) -> Option<NaiveDateTime> {
        let ts = self.timestamp.as_str();
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(ts, fmt).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

impl fmt::Display for PriceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.identifier, self.price, self.timestamp)
    }
}

/// Parse a line in the default (`Compact`) layout.
pub fn parse(line: &str) -> ParseResult<PriceRecord> {
    parse_with(line, RecordLayout::Compact)
}

/// Parse a line in the given layout.
pub fn parse_with(line: &str, layout: RecordLayout) -> ParseResult<PriceRecord> {
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let fields: Vec<&str> = line.split(DELIMITER).map(clean_field).collect();
    if fields.len() < layout.min_fields() {
        return Err(ParseError::FieldCount {
            expected: layout.min_fields(),
            found: fields.len(),
        });
    }

    let identifier = fields[layout.identifier_col()];
    if identifier.is_empty() {
        return Err(ParseError::EmptyIdentifier);
    }

    let raw_price = fields[layout.price_col()];
    let price = raw_price
        .parse::<Price>()
        .map_err(|e| ParseError::InvalidPrice {
            value: raw_price.to_string(),
            reason: e.to_string(),
        })?;

    let used = [
        layout.identifier_col(),
        layout.price_col(),
        layout.timestamp_col(),
    ];
    let extra = fields
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .map(|(_, f)| (*f).to_string())
        .collect();

    Ok(PriceRecord {
        identifier: identifier.to_string(),
        price,
        timestamp: fields[layout.timestamp_col()].to_string(),
        extra,
    })
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches(|c: char| c == '\'' || c == '"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_compact_line() {
        let record = parse("AAPL,100,t1").unwrap();
        assert_eq!(record.identifier, "AAPL");
        assert_eq!(record.price, Price::new(dec!(100)));
        assert_eq!(record.timestamp, "t1");
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_parse_keeps_trailing_fields() {
        let record = parse("MSFT,90.5,2024-01-02,1200,buy").unwrap();
        assert_eq!(record.extra, vec!["1200".to_string(), "buy".to_string()]);
    }

    #[test]
    fn test_parse_strips_quotes_and_whitespace() {
        let record = parse(" 'AAPL' , \"101.25\" ,t3 ").unwrap();
        assert_eq!(record.identifier, "AAPL");
        assert_eq!(record.price, Price::new(dec!(101.25)));
        assert_eq!(record.timestamp, "t3");
    }

    #[test]
    fn test_parse_bad_line() {
        assert_eq!(
            parse("BAD_LINE"),
            Err(ParseError::FieldCount {
                expected: 3,
                found: 1
            })
        );
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_parse_empty_identifier() {
        assert_eq!(parse(",100,t1"), Err(ParseError::EmptyIdentifier));
    }

    #[test]
    fn test_parse_invalid_price() {
        match parse("AAPL,abc,t1") {
            Err(ParseError::InvalidPrice { value, .. }) => assert_eq!(value, "abc"),
            other => panic!("expected InvalidPrice, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_quote_layout() {
        let line = "MSFT,1/2/2020 12:00:00 AM,158.78,160.73,158.33,160.62,22622100,1.84,1.16";
        let record = parse_with(line, RecordLayout::Quote).unwrap();

        assert_eq!(record.identifier, "MSFT");
        assert_eq!(record.price, Price::new(dec!(160.62)));
        assert_eq!(record.timestamp, "1/2/2020 12:00:00 AM");
        assert_eq!(
            record.extra,
            vec!["158.78", "160.73", "158.33", "22622100", "1.84", "1.16"]
        );
    }

    #[test]
    fn test_parse_quote_layout_rejects_compact_line() {
        assert_eq!(
            parse_with("AAPL,100,t1", RecordLayout::Quote),
            Err(ParseError::FieldCount {
                expected: 9,
                found: 3
            })
        );
    }

    #[test]
    fn test_trade_time_formats() {
        let iso = PriceRecord::new("A", Price::new(dec!(0)), "2024-03-01T09:30:00");
        assert_eq!(
            iso.trade_time().map(|t| t.to_string()),
            Some("2024-03-01 09:30:00".to_string())
        );

        let us = PriceRecord::new("A", Price::new(dec!(0)), "1/2/2020 1:05:00 PM");
        assert_eq!(
            us.trade_time().map(|t| t.to_string()),
            Some("2020-01-02 13:05:00".to_string())
        );

        let date_only = PriceRecord::new("A", Price::new(dec!(0)), "2024-03-01");
        assert_eq!(
            date_only.trade_time().map(|t| t.to_string()),
            Some("2024-03-01 00:00:00".to_string())
        );

        assert!(PriceRecord::new("A", Price::new(dec!(0)), "t1").trade_time().is_none());
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("Quote".parse::<RecordLayout>(), Ok(RecordLayout::Quote));
        assert_eq!("compact".parse::<RecordLayout>(), Ok(RecordLayout::Compact));
        assert!("tsv".parse::<RecordLayout>().is_err());
    }

    #[test]
    fn test_record_serializes_price_as_string() {
        let record = parse("AAPL,100.50,t1").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["price"], "100.50");
        assert!(json.get("extra").is_none());
    }
}
