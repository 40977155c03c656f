//! Wire models for the blocklist backend.
//!
//! - `IndicatorType`, `BlocklistEntry`: the blocklist itself
//! - `IndicatorChange`, `BlockOutcome`, `UnblockOutcome`: block/unblock round trips
//! - `AuditEntry`: the block/unblock audit trail
//! - `ApiKey`, `ApiLogEntry`: administrator views

pub mod api_key;
pub mod api_log;
pub mod audit;
pub mod indicator;

pub use api_key::{ApiKey, NewApiKey};
pub use api_log::{ApiLogEntry, StatusClass};
pub use audit::{AuditAction, AuditEntry};
pub use indicator::{
    parse_indicator_lines, BlockOutcome, BlocklistEntry, IndicatorChange, IndicatorType,
    InvalidIndicator, ParseIndicatorTypeError, UnblockOutcome,
};
