//! Demonstration provider bound to the `example` app.
//!
//! * `hour`: the last quarters (`quarter` channel) or halves (`half`
//!   channel) of an hour, counted back from now or from the datetime given
//!   as channel object.
//! * `french_educ`: recently updated establishments of the French national
//!   education directory, optionally for one academy (`academy` channel).

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset, macros::format_description};
use tracing::debug;

use crate::{
    application::provider::{FetchRequest, Provider, ProviderError},
    config::ProviderSettings,
    domain::{
        error::DomainError,
        items::{ContentItem, FetchedContents, index_items, parse_source_datetime},
    },
};

pub const APP: &str = "example";

const FRENCH_EDUC_ID_FIELD: &str = "identifiant_de_l_etablissement";
const FRENCH_EDUC_UPDATED_FIELD: &str = "date_maj_ligne";
const FRENCH_EDUC_OPENED_FIELD: &str = "date_ouverture";

pub struct ExampleProvider {
    client: Client,
    french_educ_endpoint: String,
}

impl ExampleProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("dalec/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            french_educ_endpoint: settings.french_educ_endpoint.clone(),
        })
    }

    async fn fetch_french_educ(
        &self,
        request: FetchRequest<'_>,
    ) -> Result<FetchedContents, ProviderError> {
        let url = french_educ_url(&self.french_educ_endpoint, request)?;
        debug!(target = "dalec::providers::example", url = %url, "querying establishment directory");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::upstream(APP, err.to_string()))?;
        let page: RecordsPage = response
            .json()
            .await
            .map_err(|err| ProviderError::upstream(APP, err.to_string()))?;

        page.records
            .into_iter()
            .map(|envelope| establishment_item(envelope.record.fields))
            .collect::<Result<Vec<_>, _>>()
            .map(index_items)
            .map_err(|err| ProviderError::invalid_item(APP, err))
    }
}

#[async_trait]
impl Provider for ExampleProvider {
    fn app(&self) -> &str {
        APP
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedContents, ProviderError> {
        match request.content_type {
            "hour" => hour_items(
                request.limit,
                request.channel,
                request.channel_object,
                OffsetDateTime::now_utc(),
            ),
            "french_educ" => self.fetch_french_educ(request).await,
            other => Err(ProviderError::unsupported(
                APP,
                format!("content type `{other}`"),
            )),
        }
    }
}

fn hour_items(
    limit: usize,
    channel: Option<&str>,
    channel_object: Option<&str>,
    now: OffsetDateTime,
) -> Result<FetchedContents, ProviderError> {
    let step: i64 = match channel {
        Some("quarter") => 15,
        Some("half") => 30,
        _ => {
            return Err(ProviderError::unsupported(
                APP,
                "`hour` without a `quarter` or `half` channel",
            ));
        }
    };

    let anchor = match channel_object.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_anchor(raw).map_err(|_| {
            ProviderError::unsupported(APP, format!("channel object `{raw}` is not a datetime"))
        })?,
        None => now,
    };
    let anchor = anchor.to_offset(UtcOffset::UTC);
    let last = anchor
        - Duration::minutes(i64::from(anchor.minute()) % step)
        - Duration::seconds(i64::from(anchor.second()))
        - Duration::nanoseconds(i64::from(anchor.nanosecond()));

    let items = (0..limit as i64).map(|index| {
        let at = last - Duration::minutes(step * index);
        let id = format!("{:02}h{:02}", at.hour(), at.minute());
        ContentItem::new(id, at, at)
            .with_field("full_representation", at.to_string())
            .with_field(
                "french_date",
                format!("{:02}/{:02}/{}", at.day(), u8::from(at.month()), at.year()),
            )
            .with_field(
                "french_datetime",
                format!(
                    "{:02}/{:02}/{} {:02}:{:02}",
                    at.day(),
                    u8::from(at.month()),
                    at.year(),
                    at.hour(),
                    at.minute()
                ),
            )
            .with_field("night", at.hour() < 6 || at.hour() > 22)
    });
    Ok(index_items(items))
}

/// `dd/mm/YYYY HH:MM` in UTC, or any shape [`parse_source_datetime`] accepts.
fn parse_anchor(raw: &str) -> Result<OffsetDateTime, DomainError> {
    if raw.contains('/') {
        return PrimitiveDateTime::parse(
            raw,
            format_description!("[day]/[month]/[year] [hour]:[minute]"),
        )
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| DomainError::invalid_timestamp("channel_object", raw));
    }
    parse_source_datetime("channel_object", raw)
}

fn french_educ_url(endpoint: &str, request: FetchRequest<'_>) -> Result<Url, ProviderError> {
    let academy = match request.channel {
        None => None,
        Some("academy") => Some(
            request
                .channel_object
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    ProviderError::unsupported(APP, "`academy` channel without an academy name")
                })?,
        ),
        Some(other) => {
            return Err(ProviderError::unsupported(
                APP,
                format!("channel `{other}` of `french_educ`"),
            ));
        }
    };

    let mut url = Url::parse(endpoint).map_err(|err| ProviderError::upstream(APP, err.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("order_by", "date_maj_ligne desc")
            .append_pair("limit", &request.limit.to_string())
            .append_pair("offset", "0");
        if let Some(academy) = academy {
            query.append_pair("where", &format!("libelle_academie =\"{academy}\""));
        }
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    records: Vec<RecordEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    record: RecordBody,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    fields: Map<String, Value>,
}

fn establishment_item(fields: Map<String, Value>) -> Result<ContentItem, DomainError> {
    let text = |key: &str| -> Result<&str, DomainError> {
        fields
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::validation(format!("establishment has no `{key}`")))
    };

    let id = text(FRENCH_EDUC_ID_FIELD)?.to_string();
    let last_update_dt =
        parse_source_datetime(FRENCH_EDUC_UPDATED_FIELD, text(FRENCH_EDUC_UPDATED_FIELD)?)?;
    let creation_dt =
        parse_source_datetime(FRENCH_EDUC_OPENED_FIELD, text(FRENCH_EDUC_OPENED_FIELD)?)?;

    Ok(fields
        .into_iter()
        .fold(ContentItem::new(id, creation_dt, last_update_dt), |item, (key, value)| {
            item.with_field(key, value)
        }))
}
