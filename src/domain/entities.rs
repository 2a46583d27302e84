//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::scope::Scope;

/// One cached item of a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_object: Option<String>,
    pub content_id: String,
    pub creation_dt: OffsetDateTime,
    pub last_update_dt: OffsetDateTime,
    pub content_data: Value,
    pub channel_ref: Option<String>,
    pub content_ref: Option<String>,
}

impl ContentRecord {
    pub fn scope(&self) -> Scope {
        Scope::from_parts(
            self.app.clone(),
            self.content_type.clone(),
            self.channel.clone(),
            self.channel_object.clone(),
        )
    }

    pub fn in_scope(&self, scope: &Scope) -> bool {
        scope.matches(
            &self.app,
            Some(&self.content_type),
            self.channel.as_deref(),
            self.channel_object.as_deref(),
        )
    }
}

/// Last successful fetch of a scope. A null `content_type` covers every
/// content type of the app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchHistoryRecord {
    pub id: Uuid,
    pub app: String,
    pub content_type: Option<String>,
    pub channel: Option<String>,
    pub channel_object: Option<String>,
    pub last_fetch_dt: OffsetDateTime,
}

impl FetchHistoryRecord {
    pub fn in_scope(&self, scope: &Scope) -> bool {
        scope.matches(
            &self.app,
            self.content_type.as_deref(),
            self.channel.as_deref(),
            self.channel_object.as_deref(),
        )
    }

    /// `true` while `now - last_fetch_dt` is strictly below `ttl`.
    pub fn is_fresh(&self, now: OffsetDateTime, ttl: std::time::Duration) -> bool {
        match std::time::Duration::try_from(now - self.last_fetch_dt) {
            Ok(elapsed) => elapsed < ttl,
            // stamped ahead of the local clock
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    fn history(at: OffsetDateTime) -> FetchHistoryRecord {
        FetchHistoryRecord {
            id: Uuid::new_v4(),
            app: "gitlab".into(),
            content_type: Some("issue".into()),
            channel: None,
            channel_object: None,
            last_fetch_dt: at,
        }
    }

    #[test]
    fn freshness_is_strict() {
        let fetched = datetime!(2024-05-01 12:00:00 UTC);
        let record = history(fetched);
        let ttl = Duration::from_secs(900);

        assert!(record.is_fresh(datetime!(2024-05-01 12:14:59 UTC), ttl));
        assert!(!record.is_fresh(datetime!(2024-05-01 12:15:00 UTC), ttl));
        assert!(!record.is_fresh(fetched, Duration::ZERO));
        assert!(record.is_fresh(datetime!(2024-05-01 11:59:00 UTC), ttl));
    }

    #[test]
    fn history_with_null_content_type_does_not_match_typed_scope() {
        let mut record = history(datetime!(2024-05-01 12:00:00 UTC));
        assert!(record.in_scope(&Scope::new("gitlab", "issue")));
        record.content_type = None;
        assert!(!record.in_scope(&Scope::new("gitlab", "issue")));
    }
}
