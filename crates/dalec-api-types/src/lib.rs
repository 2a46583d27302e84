//! Request and response documents of the dalec content endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Optional JSON body of a `POST` to the content endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchContentBody {
    pub channel_objects: Option<Vec<String>>,
    pub ordered_by: Option<String>,
}

/// Body of a `200` answer: what a widget needs to render itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentListResponse {
    pub context: WidgetContext,
    pub items: Vec<ContentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetContext {
    /// Stable identifier of the widget, derived from its scope.
    pub id: String,
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_objects: Vec<String>,
    pub ordered_by: Option<String>,
    /// Endpoint the widget polls to refresh itself.
    pub url: String,
    /// Candidate list templates, highest priority first.
    pub templates: Vec<String>,
    pub item_templates: Vec<String>,
    pub ajax_refresh: bool,
    pub css_framework: Option<String>,
    pub is_fetch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: Uuid,
    pub content_id: String,
    pub channel_object: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_dt: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update_dt: OffsetDateTime,
    pub content_data: Value,
}
