use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::refresh::{
        METRIC_CONTENTS_CREATED_TOTAL, METRIC_CONTENTS_PRUNED_TOTAL,
        METRIC_CONTENTS_UPDATED_TOTAL, METRIC_PROVIDER_FETCH_MS, METRIC_REFRESH_SKIPPED_TOTAL,
        METRIC_REFRESH_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REFRESH_TOTAL,
            Unit::Count,
            "Refresh attempts, fresh or not."
        );
        describe_counter!(
            METRIC_REFRESH_SKIPPED_TOTAL,
            Unit::Count,
            "Refreshes short-circuited because the scope was fetched within its TTL."
        );
        describe_counter!(
            METRIC_CONTENTS_CREATED_TOTAL,
            Unit::Count,
            "Content records created by refreshes."
        );
        describe_counter!(
            METRIC_CONTENTS_UPDATED_TOTAL,
            Unit::Count,
            "Content records whose payload changed during a refresh."
        );
        describe_counter!(
            METRIC_CONTENTS_PRUNED_TOTAL,
            Unit::Count,
            "Content records deleted by retention pruning."
        );
        describe_histogram!(
            METRIC_PROVIDER_FETCH_MS,
            Unit::Milliseconds,
            "Provider fetch latency in milliseconds."
        );
    });
}
