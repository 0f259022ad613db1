// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sidecar metadata written next to every trashed payload directory.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brainsurgeon_core::BrainsurgeonError;

/// Contents of `<agent>/<session>.meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashEntry {
    pub original_agent: String,
    pub original_session_id: String,
    /// Directory the payloads were moved out of.
    pub original_path: String,
    pub trashed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TrashEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub(crate) async fn read(path: &Path) -> Result<Self, BrainsurgeonError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| BrainsurgeonError::trash(format!("read {}", path.display()), e))?;
        serde_json::from_slice(&raw).map_err(|e| BrainsurgeonError::Trash {
            message: format!("corrupt metadata {}", path.display()),
            source: Some(Box::new(e)),
        })
    }

    pub(crate) async fn write(&self, path: &Path) -> Result<(), BrainsurgeonError> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| BrainsurgeonError::Internal(format!("serialize trash metadata: {e}")))?;
        tokio::fs::write(path, body)
            .await
            .map_err(|e| BrainsurgeonError::trash(format!("write {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(expires_at: DateTime<Utc>) -> TrashEntry {
        TrashEntry {
            original_agent: "main".into(),
            original_session_id: "s1".into(),
            original_path: "/root/agents/main/sessions/extracted/s1".into(),
            trashed_at: expires_at - Duration::days(14),
            expires_at,
        }
    }

    #[test]
    fn expiry_is_strictly_after() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let e = entry(at);
        assert!(!e.is_expired(at));
        assert!(e.is_expired(at + Duration::seconds(1)));
        assert!(!e.is_expired(at - Duration::days(1)));
    }

    #[test]
    fn metadata_uses_snake_case_keys() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(entry(at)).unwrap();
        assert_eq!(json["original_agent"], "main");
        assert_eq!(json["original_session_id"], "s1");
        assert!(json["expires_at"].as_str().unwrap().starts_with("2026-03-01T12:00:00"));
    }

    #[tokio::test]
    async fn corrupt_metadata_is_a_trash_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.meta.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = TrashEntry::read(&path).await.unwrap_err();
        assert!(matches!(err, BrainsurgeonError::Trash { .. }));
    }
}
