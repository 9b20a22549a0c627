//! Metrics hooks.
//!
//! Key/value pairs are emitted as debug events inside a `jtree` span; export
//! them from the subscriber installed by the binary.

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::DEBUG, "jtree", event);
    let _guard = span.enter();
    for (k, v) in key_values {
        tracing::debug!(%event, %k, %v, "metric");
    }
}
