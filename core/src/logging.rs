//! Logging initialisation.
//!
//! Structured logs via `tracing`, filterable with `RUST_LOG`. Both
//! initialisers suppress the heartbeat span's own events — heartbeats
//! fire every few seconds per account and would otherwise drown out the
//! decisions the Replicator actually makes.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Span name the Stream Consumer opens around each heartbeat tick.
pub const HEARTBEAT_SPAN_NAME: &str = "heartbeat_tick";

pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(HeartbeatSpanFilter)
        .init()
}

pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .with(HeartbeatSpanFilter)
        .init()
}

struct HeartbeatSpanFilter;

impl<S> tracing_subscriber::layer::Layer<S> for HeartbeatSpanFilter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn event_enabled(
        &self,
        _: &tracing::Event<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        match ctx.lookup_current() {
            Some(span) => span.name() != HEARTBEAT_SPAN_NAME,
            None => true,
        }
    }
}
