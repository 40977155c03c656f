use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Block,
    Unblock,
    Other,
}

/// One line of the block/unblock audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub indicator_type: String,
    #[serde(default)]
    pub indicator: String,
    #[serde(default)]
    pub reason: String,
}

impl AuditEntry {
    pub fn action_kind(&self) -> AuditAction {
        if self.action.eq_ignore_ascii_case("block") {
            AuditAction::Block
        } else if self.action.eq_ignore_ascii_case("unblock") {
            AuditAction::Unblock
        } else {
            AuditAction::Other
        }
    }

    pub fn matches_search(&self, query: &str) -> bool {
        query.is_empty()
            || contains_ignore_case(&self.indicator, query)
            || contains_ignore_case(&self.reason, query)
            || contains_ignore_case(&self.indicator_type, query)
            || contains_ignore_case(&self.action, query)
            || contains_ignore_case(&self.username, query)
    }
}

/// `GET /logs/` answers either a bare array or an `entries` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AuditLogResponse {
    Entries(Vec<AuditEntry>),
    Wrapped { entries: Vec<AuditEntry> },
}

impl AuditLogResponse {
    pub(crate) fn into_entries(self) -> Vec<AuditEntry> {
        match self {
            AuditLogResponse::Entries(entries) | AuditLogResponse::Wrapped { entries } => entries,
        }
    }
}
