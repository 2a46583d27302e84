//! Scope keys identifying one cached content stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Maximum length of `app`, `content_type`, `channel` and `channel_object`.
pub const MAX_SCOPE_FIELD_LEN: usize = 50;

/// Composite key `(app, content_type, channel, channel_object)`.
///
/// A scope without `channel_object` never matches records that carry one,
/// and likewise for `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_object: Option<String>,
}

impl Scope {
    pub fn new(app: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            content_type: content_type.into(),
            channel: None,
            channel_object: None,
        }
    }

    pub fn from_parts(
        app: impl Into<String>,
        content_type: impl Into<String>,
        channel: Option<String>,
        channel_object: Option<String>,
    ) -> Self {
        Self {
            app: app.into(),
            content_type: content_type.into(),
            channel,
            channel_object,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_channel_object(mut self, channel_object: impl Into<String>) -> Self {
        self.channel_object = Some(channel_object.into());
        self
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn channel_object(&self) -> Option<&str> {
        self.channel_object.as_deref()
    }

    /// Exact, null-aware comparison against stored key columns.
    pub fn matches(
        &self,
        app: &str,
        content_type: Option<&str>,
        channel: Option<&str>,
        channel_object: Option<&str>,
    ) -> bool {
        self.app == app
            && content_type == Some(self.content_type.as_str())
            && channel == self.channel()
            && channel_object == self.channel_object()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.app.trim().is_empty() {
            return Err(DomainError::validation("app must not be empty"));
        }
        check_len("app", &self.app)?;
        check_len("content_type", &self.content_type)?;
        if let Some(channel) = self.channel() {
            check_len("channel", channel)?;
        }
        if let Some(channel_object) = self.channel_object() {
            check_len("channel_object", channel_object)?;
        }
        Ok(())
    }
}

fn check_len(field: &str, value: &str) -> Result<(), DomainError> {
    let len = value.chars().count();
    if len > MAX_SCOPE_FIELD_LEN {
        return Err(DomainError::validation(format!(
            "{field} is {len} characters long, at most {MAX_SCOPE_FIELD_LEN} allowed"
        )));
    }
    Ok(())
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.content_type)?;
        if let Some(channel) = self.channel() {
            write!(f, "/{channel}")?;
        }
        if let Some(channel_object) = self.channel_object() {
            write!(f, "[{channel_object}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_channel_never_matches_a_set_one() {
        let scope = Scope::new("gitlab", "issue");
        assert!(scope.matches("gitlab", Some("issue"), None, None));
        assert!(!scope.matches("gitlab", Some("issue"), Some("project"), None));
        assert!(!scope.matches("gitlab", None, None, None));

        let scoped = Scope::new("gitlab", "issue")
            .with_channel("project")
            .with_channel_object("42");
        assert!(!scoped.matches("gitlab", Some("issue"), Some("project"), None));
        assert!(scoped.matches("gitlab", Some("issue"), Some("project"), Some("42")));
    }

    #[test]
    fn rejects_oversized_fields() {
        let scope = Scope::new("gitlab", "issue").with_channel("x".repeat(51));
        let err = scope.validate().expect_err("channel too long");
        assert!(err.to_string().contains("channel"));

        assert!(Scope::new(" ", "issue").validate().is_err());
        assert!(Scope::new("a".repeat(50), "issue").validate().is_ok());
    }

    #[test]
    fn display_lists_present_parts() {
        let scope = Scope::new("example", "hour")
            .with_channel("quarter")
            .with_channel_object("2024-01-01");
        assert_eq!(scope.to_string(), "example/hour/quarter[2024-01-01]");
        assert_eq!(Scope::new("example", "hour").to_string(), "example/hour");
    }
}
