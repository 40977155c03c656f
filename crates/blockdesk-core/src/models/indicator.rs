use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::contains_ignore_case;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown indicator type '{0}' (expected ip, domain or url)")]
pub struct ParseIndicatorTypeError(pub String);

/// Kind of indicator a blocklist holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Ip,
    Domain,
    Url,
}

impl IndicatorType {
    pub const ALL: [IndicatorType; 3] = [IndicatorType::Ip, IndicatorType::Domain, IndicatorType::Url];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Ip => "ip",
            IndicatorType::Domain => "domain",
            IndicatorType::Url => "url",
        }
    }

    /// Label used in the console.
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorType::Ip => "IP Address",
            IndicatorType::Domain => "Domain",
            IndicatorType::Url => "URL",
        }
    }

    /// Path of the authenticated JSON list for this type.
    pub fn list_path(&self) -> String {
        format!("/{}-blocklist/", self.as_str())
    }

    /// Path of the unauthenticated plain-text list for this type.
    pub fn raw_path(&self) -> String {
        format!("/raw/{}-blocklist/", self.as_str())
    }

    pub fn next(&self) -> Self {
        match self {
            IndicatorType::Ip => IndicatorType::Domain,
            IndicatorType::Domain => IndicatorType::Url,
            IndicatorType::Url => IndicatorType::Ip,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorType {
    type Err = ParseIndicatorTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" => Ok(IndicatorType::Ip),
            "domain" => Ok(IndicatorType::Domain),
            "url" => Ok(IndicatorType::Url),
            _ => Err(ParseIndicatorTypeError(s.to_string())),
        }
    }
}

/// One row of the combined blocklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub indicator: String,
    #[serde(rename = "type")]
    pub indicator_type: String,
    #[serde(default)]
    pub added_by: String,
    #[serde(default)]
    pub added_at: String,
    #[serde(default)]
    pub reason: String,
}

impl BlocklistEntry {
    pub fn matches_search(&self, query: &str) -> bool {
        query.is_empty()
            || contains_ignore_case(&self.indicator, query)
            || contains_ignore_case(&self.reason, query)
            || contains_ignore_case(&self.indicator_type, query)
    }
}

/// Body of `POST /block/` and `POST /unblock/`.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorChange {
    pub indicator_type: IndicatorType,
    /// Newline-separated; the backend splits and trims.
    pub indicators: String,
    pub reason: String,
}

impl IndicatorChange {
    pub fn new(indicator_type: IndicatorType, indicators: &[String], reason: &str) -> Self {
        Self {
            indicator_type,
            indicators: indicators.join("\n"),
            reason: reason.to_string(),
        }
    }
}

/// An indicator the backend refused, with its sanitized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidIndicator {
    pub original: String,
    #[serde(default)]
    pub sanitized: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockOutcome {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "added_indicators")]
    pub blocked: Vec<String>,
    #[serde(default, alias = "existing_indicators")]
    pub existing: Vec<String>,
    #[serde(default, alias = "invalid_indicators")]
    pub invalid: Vec<InvalidIndicator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnblockOutcome {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "removed_indicators")]
    pub unblocked: Vec<String>,
    #[serde(default, alias = "non_existent_indicators")]
    pub not_found: Vec<String>,
}

/// Split free-form input into indicators, one per non-blank line.
pub fn parse_indicator_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
