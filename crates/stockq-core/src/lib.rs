//! Core domain types for stockq.
//!
//! This crate provides the types shared by every other stockq crate:
//! - `Price`: precision-safe decimal price
//! - `PriceRecord`: one parsed row of a price source
//! - `RecordLayout`: which columns carry identifier, price and timestamp
//! - `parse` / `parse_with`: the line parser

pub mod decimal;
pub mod error;
pub mod record;

pub use decimal::Price;
pub use error::{ParseError, ParseResult};
pub use record::{parse, parse_with, PriceRecord, RecordLayout, DELIMITER};
