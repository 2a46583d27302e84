//! Raw items handed over by providers, normalized before they reach storage.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::domain::error::DomainError;

pub const MAX_CONTENT_ID_LEN: usize = 255;

pub const ID_KEY: &str = "id";
pub const CREATION_DT_KEY: &str = "creation_dt";
pub const LAST_UPDATE_DT_KEY: &str = "last_update_dt";

/// Items of one fetch, keyed by their content id.
pub type FetchedContents = BTreeMap<String, ContentItem>;

const OFFSET_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    ),
];

// Naive values are read as UTC.
const UTC_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]Z"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]Z"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// One item returned by a provider.
///
/// The payload always carries `id`, `creation_dt` and `last_update_dt`
/// consistent with the typed fields; everything else is provider defined.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    id: String,
    creation_dt: OffsetDateTime,
    last_update_dt: OffsetDateTime,
    payload: Map<String, Value>,
}

impl ContentItem {
    pub fn new(
        id: impl Into<String>,
        creation_dt: OffsetDateTime,
        last_update_dt: OffsetDateTime,
    ) -> Self {
        let id = id.into();
        let creation_dt = creation_dt.to_offset(UtcOffset::UTC);
        let last_update_dt = last_update_dt.to_offset(UtcOffset::UTC);

        let mut payload = Map::new();
        payload.insert(ID_KEY.to_string(), Value::String(id.clone()));
        payload.insert(
            CREATION_DT_KEY.to_string(),
            Value::String(format_timestamp(creation_dt)),
        );
        payload.insert(
            LAST_UPDATE_DT_KEY.to_string(),
            Value::String(format_timestamp(last_update_dt)),
        );

        Self {
            id,
            creation_dt,
            last_update_dt,
            payload,
        }
    }

    /// Adds a provider-specific field. The three identity keys are left untouched.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_identity_key(&key) {
            self.payload.insert(key, value.into());
        }
        self
    }

    /// Normalizes a raw JSON object coming from a source.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, DomainError> {
        let id = match payload.get(ID_KEY) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(other) => {
                return Err(DomainError::validation(format!(
                    "`id` must be a string or a number, got {other}"
                )));
            }
            None => return Err(DomainError::validation("item has no `id`")),
        };
        validate_content_id(&id)?;

        let creation_dt = timestamp_field(&payload, CREATION_DT_KEY)?;
        let last_update_dt = timestamp_field(&payload, LAST_UPDATE_DT_KEY)?;

        Ok(Self {
            id,
            creation_dt,
            last_update_dt,
            payload,
        })
    }

    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(payload) => Self::from_payload(payload),
            other => Err(DomainError::validation(format!(
                "item must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creation_dt(&self) -> OffsetDateTime {
        self.creation_dt
    }

    pub fn last_update_dt(&self) -> OffsetDateTime {
        self.last_update_dt
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }
}

/// Keys a list of items by id. Later duplicates replace earlier ones.
pub fn index_items(items: impl IntoIterator<Item = ContentItem>) -> FetchedContents {
    items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect()
}

pub fn validate_content_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::validation("content id must not be empty"));
    }
    let len = id.chars().count();
    if len > MAX_CONTENT_ID_LEN {
        return Err(DomainError::validation(format!(
            "content id is {len} characters long, at most {MAX_CONTENT_ID_LEN} allowed"
        )));
    }
    Ok(())
}

/// Parses the timestamp shapes sources commonly emit; the result is in UTC.
///
/// Values without an offset are taken as UTC; a bare date resolves to
/// midnight UTC.
pub fn parse_source_datetime(field: &str, value: &str) -> Result<OffsetDateTime, DomainError> {
    let value = value.trim();

    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed.to_offset(UtcOffset::UTC));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = OffsetDateTime::parse(value, *format) {
            return Ok(parsed.to_offset(UtcOffset::UTC));
        }
    }
    for format in UTC_FORMATS {
        if let Ok(parsed) = PrimitiveDateTime::parse(value, *format) {
            return Ok(parsed.assume_utc());
        }
    }
    if let Ok(date) = Date::parse(value, DATE_ONLY) {
        return Ok(date.midnight().assume_utc());
    }

    Err(DomainError::invalid_timestamp(field, value))
}

fn timestamp_field(payload: &Map<String, Value>, key: &str) -> Result<OffsetDateTime, DomainError> {
    match payload.get(key) {
        Some(Value::String(raw)) => parse_source_datetime(key, raw),
        Some(other) => Err(DomainError::invalid_timestamp(key, other.to_string())),
        None => Err(DomainError::validation(format!("item has no `{key}`"))),
    }
}

fn is_identity_key(key: &str) -> bool {
    matches!(key, ID_KEY | CREATION_DT_KEY | LAST_UPDATE_DT_KEY)
}

fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}
