use serde::{Deserialize, Serialize};

/// Session metadata that survives restarts. Only these two fields are
/// persisted for a session: identity tokens and credentials never are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPrefs {
    pub sync_enabled: bool,
    pub last_synced_at: Option<i64>,
}

impl Default for SessionPrefs {
    fn default() -> Self {
        Self {
            sync_enabled: true,
            last_synced_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionPrefs;

    #[test]
    fn defaults_to_sync_enabled() {
        let prefs = SessionPrefs::default();
        assert!(prefs.sync_enabled);
        assert_eq!(prefs.last_synced_at, None);
    }

    #[test]
    fn decodes_from_partial_document() {
        let prefs: SessionPrefs = serde_json::from_str(r#"{"lastSyncedAt": 99}"#).expect("decode");
        assert!(prefs.sync_enabled);
        assert_eq!(prefs.last_synced_at, Some(99));
    }

    #[test]
    fn round_trips_with_camel_case_keys() {
        let prefs = SessionPrefs {
            sync_enabled: false,
            last_synced_at: Some(1_700_000_000_000),
        };
        let value = serde_json::to_value(&prefs).expect("encode");
        assert_eq!(value["syncEnabled"], false);
        assert_eq!(value["lastSyncedAt"], 1_700_000_000_000_i64);
    }
}
