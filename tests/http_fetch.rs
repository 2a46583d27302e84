use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use dalec::{
    application::{
        listing::ContentListingService, refresh::RefreshEngine, registry::ProviderRegistry,
    },
    config::{ContentSettings, ProviderSettings},
    infra::{
        http::{HttpState, build_router},
        memory::MemoryRepositories,
        providers,
    },
};
use dalec_api_types::ContentListResponse;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn router(settings: ContentSettings) -> Router {
    let repo = Arc::new(MemoryRepositories::new());
    let registry = Arc::new(ProviderRegistry::new());
    providers::install_loaders(&registry, &ProviderSettings::default());

    let settings = Arc::new(settings);
    let engine = Arc::new(RefreshEngine::new(
        registry,
        repo.clone(),
        repo.clone(),
        Arc::clone(&settings),
    ));
    let listing = Arc::new(ContentListingService::new(repo, settings));

    build_router(HttpState {
        engine,
        listing,
        db: None,
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn read_listing(response: axum::response::Response) -> ContentListResponse {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("listing document")
}

#[tokio::test]
async fn first_request_lists_then_fresh_request_is_empty() {
    let app = router(ContentSettings::new());

    let response = app
        .clone()
        .oneshot(get("/example/hour/quarter"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let listing = read_listing(response).await;
    assert_eq!(listing.items.len(), 10);
    assert_eq!(listing.context.url, "/example/hour/quarter");
    assert!(!listing.context.is_fetch);
    assert!(listing.context.ajax_refresh);
    assert_eq!(
        listing.context.templates.first().map(String::as_str),
        Some("dalec/example/hour-quarter-list.html")
    );
    assert_eq!(
        listing.context.item_templates.last().map(String::as_str),
        Some("dalec/default/item.html")
    );

    let again = app
        .oneshot(get("/example/hour/quarter"))
        .await
        .expect("response");
    assert_eq!(again.status(), StatusCode::NO_CONTENT);
    let bytes = again.into_body().collect().await.expect("body").to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn posted_channel_objects_and_ordering_are_honoured() {
    let app = router(ContentSettings::new().with_global("NB_CONTENTS_KEPT", 4_i64));
    let body = r#"{"channelObjects": ["2024-03-15T10:20:00Z"], "orderedBy": "-id"}"#;

    let response = app
        .clone()
        .oneshot(post_json("/example/hour/quarter", body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let listing = read_listing(response).await;
    assert!(listing.context.is_fetch);
    assert_eq!(listing.context.channel_objects, ["2024-03-15T10:20:00Z"]);
    assert_eq!(listing.context.ordered_by.as_deref(), Some("-id"));
    let ids: Vec<&str> = listing
        .items
        .iter()
        .map(|item| item.content_id.as_str())
        .collect();
    assert_eq!(ids, ["10h15", "10h00", "09h45", "09h30"]);

    let again = app
        .oneshot(post_json("/example/hour/quarter", body))
        .await
        .expect("response");
    assert_eq!(again.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn custom_template_is_carried_in_the_context() {
    let app = router(ContentSettings::new().with_global("CSS_FRAMEWORK", "bootstrap"));

    let response = app
        .oneshot(get("/example/hour/half?template=compact"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let listing = read_listing(response).await;
    assert_eq!(listing.context.url, "/example/hour/half?template=compact");
    assert_eq!(listing.context.css_framework.as_deref(), Some("bootstrap"));
    assert_eq!(
        &listing.context.templates[..2],
        [
            "dalec/example/compact-list.html",
            "dalec/example/bootstrap/hour-half-list.html",
        ]
    );
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let app = router(ContentSettings::new());

    let unknown = app.clone().oneshot(get("/nope/issue")).await.expect("response");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let unsupported = app.clone().oneshot(get("/example/hour")).await.expect("response");
    assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .clone()
        .oneshot(post_json("/example/hour/quarter", "{not json"))
        .await
        .expect("response");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let ordering = app
        .oneshot(post_json(
            "/example/hour/half",
            r#"{"orderedBy": "content_data->>'id'"}"#,
        ))
        .await
        .expect("response");
    assert_eq!(ordering.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_answers_without_a_database() {
    let response = router(ContentSettings::new())
        .oneshot(get("/health"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
