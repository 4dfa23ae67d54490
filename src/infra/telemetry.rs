use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "songstudio_cache_hit_total",
            Unit::Count,
            "Total number of resident-collection cache hits, labeled by entity."
        );
        describe_counter!(
            "songstudio_cache_miss_total",
            Unit::Count,
            "Total number of resident-collection cache misses, labeled by entity."
        );
        describe_counter!(
            "songstudio_cache_invalidate_total",
            Unit::Count,
            "Total number of explicit cache invalidations, labeled by entity."
        );
        describe_counter!(
            "songstudio_export_bundle_rebuild_total",
            Unit::Count,
            "Total number of export bundle rebuilds, labeled by entity."
        );
        describe_histogram!(
            "songstudio_export_bundle_build_ms",
            Unit::Milliseconds,
            "Export bundle assembly latency in milliseconds."
        );
        describe_counter!(
            "songstudio_session_sweep_removed_total",
            Unit::Count,
            "Total number of expired sessions removed by the background sweep."
        );
        describe_gauge!(
            "songstudio_session_cache_len",
            Unit::Count,
            "Current number of sessions resident in the TTL cache."
        );
        describe_histogram!(
            "songstudio_cache_warm_ms",
            Unit::Milliseconds,
            "Cache warmup latency in milliseconds."
        );
        describe_counter!(
            "songstudio_cache_lock_poison_total",
            Unit::Count,
            "Cache locks recovered after being poisoned by a panicked thread."
        );
    });
}
