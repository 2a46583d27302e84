use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        listing::ListingError,
        provider::ProviderError,
        refresh::{RefreshError, RefreshFailure},
        registry::RegistryError,
        repos::RepoError,
    },
    config::SettingsError,
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            source,
            status,
            messages: error_chain(error),
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Messages of `error` followed by those of its sources.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Refresh(err) => refresh_status(&err.failure),
            AppError::Listing(ListingError::InvalidOrdering(_)) => StatusCode::BAD_REQUEST,
            AppError::Listing(ListingError::Repo(err)) => repo_status(err),
            AppError::Listing(ListingError::Settings(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Registry(err) => registry_status(err),
            AppError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "Unknown content provider",
            StatusCode::BAD_REQUEST => "Request could not be processed",
            StatusCode::BAD_GATEWAY => "Content source unavailable",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Unexpected error occurred",
        }
    }
}

fn refresh_status(failure: &RefreshFailure) -> StatusCode {
    match failure {
        RefreshFailure::Registry(err) => registry_status(err),
        RefreshFailure::Provider(ProviderError::UnsupportedScope { .. }) => StatusCode::BAD_REQUEST,
        RefreshFailure::Provider(ProviderError::Upstream { .. })
        | RefreshFailure::Provider(ProviderError::InvalidItem { .. }) => StatusCode::BAD_GATEWAY,
        RefreshFailure::Provider(ProviderError::NotImplemented { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        RefreshFailure::Repo(err) => repo_status(err),
        RefreshFailure::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn registry_status(err: &RegistryError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn repo_status(err: &RepoError) -> StatusCode {
    match err {
        RepoError::Persistence(_) | RepoError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        RepoError::Validation { .. } | RepoError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RepoError::NotFound | RepoError::Duplicate { .. } | RepoError::Integrity { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::scope::Scope;

    use super::*;

    fn refresh_error(failure: RefreshFailure) -> AppError {
        AppError::Refresh(RefreshError {
            scope: Scope::new("example", "hour"),
            failure,
        })
    }

    #[test]
    fn refresh_failures_map_to_statuses() {
        let unknown = refresh_error(RefreshFailure::Registry(
            RegistryError::ProviderNotFound {
                app: "nope".into(),
            },
        ));
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

        let unsupported = refresh_error(RefreshFailure::Provider(ProviderError::unsupported(
            "example", "content type `minute`",
        )));
        assert_eq!(unsupported.status_code(), StatusCode::BAD_REQUEST);

        let upstream = refresh_error(RefreshFailure::Provider(ProviderError::upstream(
            "example", "timeout",
        )));
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);

        let storage = refresh_error(RefreshFailure::Repo(RepoError::Timeout));
        assert_eq!(storage.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn report_walks_the_source_chain() {
        let error = refresh_error(RefreshFailure::Provider(ProviderError::invalid_item(
            "example",
            DomainError::validation("item has no `id`"),
        )));
        let report = ErrorReport::from_error("tests", error.status_code(), &error);

        assert_eq!(report.messages.len(), 3);
        assert!(report.messages[0].contains("example/hour"));
        assert!(report.messages[2].contains("item has no `id`"));
    }
}
