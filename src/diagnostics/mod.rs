//! Diagnostic logging capability.
//!
//! The filter never calls `tracing` directly; it logs through a
//! [`DiagnosticLog`] so hosts can route reports elsewhere and tests can
//! record what was emitted.

/// Log sink used by the error-reporting filter.
pub trait DiagnosticLog: Send + Sync + 'static {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink: forwards to `tracing` under the `faultline` target.
#[derive(Clone, Default)]
pub struct TracingLog;

impl DiagnosticLog for TracingLog {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "faultline", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "faultline", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "faultline", "{}", message);
    }
}
