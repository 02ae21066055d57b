//! Minimal logging initializer for standalone use (tests, examples).
//!
//! The surrounding node owns the real observability stack; this crate only
//! uses the `log` facade at its call sites (spec §4's `info!`/`debug!`/
//! `trace!`/`warn!` calls) and provides this `env_logger` wiring so the
//! crate is useful on its own without pulling in `logforth`/OpenTelemetry.

/// Initializes `env_logger` from `RUST_LOG`, defaulting to `info`. Safe to
/// call more than once; subsequent calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
