//! Telemetry helpers for structured logging and tracing.

/// Install a default env-filtered subscriber unless one is already set.
///
/// Engine events are emitted under the `prometheus_qos` target, so
/// `RUST_LOG=prometheus_qos=debug` shows every open, update, close and
/// target change.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
