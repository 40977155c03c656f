use serde::{Deserialize, Serialize};

/// A long-lived API key as listed by `/api-keys/`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

impl ApiKey {
    /// Key with all but the first few characters hidden, for list views.
    pub fn masked_key(&self) -> String {
        let visible: String = self.key.chars().take(6).collect();
        if self.key.chars().count() <= 6 {
            visible
        } else {
            format!("{visible}••••••••")
        }
    }

    pub fn access_label(&self) -> &'static str {
        if self.read_only {
            "Read-only"
        } else {
            "Read/write"
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("key", &self.masked_key())
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("is_active", &self.is_active)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Body of `POST /api-keys/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewApiKey {
    pub name: String,
    pub read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_and_mask() {
        let key: ApiKey = serde_json::from_value(json!({
            "id": 3,
            "key": "abcdefghijklmnopqrstuvwxyz0123456789ABCD",
            "name": "siem",
            "created_at": "2024-02-02T10:00:00Z",
            "is_active": true,
            "read_only": false
        }))
        .unwrap();
        assert_eq!(key.masked_key(), "abcdef••••••••");
        assert_eq!(key.access_label(), "Read/write");
        assert!(!format!("{key:?}").contains("ghijkl"));
    }

    #[test]
    fn test_defaults() {
        let key: ApiKey = serde_json::from_value(json!({"id": 1, "key": "abc", "name": "n"})).unwrap();
        assert!(key.is_active);
        assert!(key.read_only);
        assert_eq!(key.masked_key(), "abc");
    }
}
