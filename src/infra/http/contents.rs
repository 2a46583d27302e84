//! Content endpoint polled by widgets.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use dalec_api_types::{ContentEntry, ContentListResponse, FetchContentBody, WidgetContext};
use serde::Deserialize;

use crate::{
    application::{
        error::AppError,
        listing::{ContentListingService, ListingRequest},
        refresh::{BatchRefresh, RefreshEngine},
    },
    domain::entities::ContentRecord,
    infra::db::PostgresRepositories,
    presentation::{TemplateKind, fetch_url, template_candidates, widget_id},
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub engine: Arc<RefreshEngine>,
    pub listing: Arc<ContentListingService>,
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/{app}/{content_type}",
            get(fetch_contents).post(fetch_contents),
        )
        .route(
            "/{app}/{content_type}/{channel}",
            get(fetch_contents).post(fetch_contents),
        )
        .route(
            "/{app}/{content_type}/{channel}/{channel_object}",
            get(fetch_contents).post(fetch_contents),
        )
        .route(
            "/{app}/{content_type}/{channel}/{channel_object}/{ordered_by}",
            get(fetch_contents).post(fetch_contents),
        )
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Deserialize)]
struct ContentPath {
    app: String,
    content_type: String,
    channel: Option<String>,
    channel_object: Option<String>,
    ordered_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateQuery {
    template: Option<String>,
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Refreshes the requested scopes, then answers `204` when nothing changed
/// or `200` with the cached contents otherwise.
async fn fetch_contents(
    State(state): State<HttpState>,
    Path(path): Path<ContentPath>,
    Query(query): Query<TemplateQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match respond(&state, path, query, &headers, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn respond(
    state: &HttpState,
    path: ContentPath,
    query: TemplateQuery,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, AppError> {
    let body: FetchContentBody = if body.is_empty() {
        FetchContentBody::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|err| AppError::validation(format!("invalid request body: {err}")))?
    };

    let channel_objects = match path.channel_object {
        Some(object) => vec![object],
        None => body.channel_objects.unwrap_or_default(),
    };
    let ordered_by = body.ordered_by.or(path.ordered_by);

    let batch = BatchRefresh::new(path.app.clone(), path.content_type.clone())
        .channel(path.channel.clone())
        .channel_objects(channel_objects.clone());
    let outcome = state.engine.refresh_batch(&batch).await?;
    if !outcome.changed() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let records = state
        .listing
        .list(&ListingRequest {
            app: path.app.clone(),
            content_type: path.content_type.clone(),
            channel: path.channel.clone(),
            channel_objects: channel_objects.clone(),
            ordered_by: ordered_by.clone(),
        })
        .await?;

    let settings = state.engine.settings();
    let css_framework = settings.css_framework()?;
    let ajax_refresh = settings.ajax_refresh(&path.app, &path.content_type)?;
    let custom = query.template.as_deref().filter(|name| !name.is_empty());
    let channel = path.channel.as_deref();
    let candidates = |kind| {
        template_candidates(
            &path.app,
            &path.content_type,
            channel,
            kind,
            css_framework.as_deref(),
            custom,
        )
    };

    let url = fetch_url(&path.app, &path.content_type, channel, custom)
        .map_err(|err| AppError::unexpected(format!("failed to build refresh url: {err}")))?;

    let context = WidgetContext {
        id: widget_id(&path.app, &path.content_type, channel, &channel_objects),
        url,
        templates: candidates(TemplateKind::List),
        item_templates: candidates(TemplateKind::Item),
        is_fetch: is_json_request(headers),
        app: path.app,
        content_type: path.content_type,
        channel: path.channel,
        channel_objects,
        ordered_by,
        ajax_refresh,
        css_framework,
    };

    let items = records.into_iter().map(content_entry).collect();
    Ok(Json(ContentListResponse { context, items }).into_response())
}

fn content_entry(record: ContentRecord) -> ContentEntry {
    ContentEntry {
        id: record.id,
        content_id: record.content_id,
        channel_object: record.channel_object,
        creation_dt: record.creation_dt,
        last_update_dt: record.last_update_dt,
        content_data: record.content_data,
    }
}

fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}
