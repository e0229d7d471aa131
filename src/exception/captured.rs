use crate::exception::ErrorKind;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::backtrace::Backtrace;
use std::error::Error;

/// An error raised while serving a request, classified for reporting.
///
/// Handlers return it (or anything converted into it) and the reporting
/// layer picks it up from the response extensions.
///
/// # Example
/// ```
/// use faultline::exception::{CapturedError, ErrorKind};
///
/// async fn show_invoice() -> Result<String, CapturedError> {
///     Err(CapturedError::new(ErrorKind::NotFound).with_message("invoice 42"))
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}{}", message_suffix(.message))]
pub struct CapturedError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub trace: Option<String>,
    /// Rust type the error was wrapped from, if known.
    pub type_name: Option<String>,
    /// Explicit status, used by `ErrorKind::Http`.
    pub status: Option<StatusCode>,
    /// Messages of the `source()` chain, outermost first.
    pub chain: Vec<String>,
}

impl CapturedError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            trace: None,
            type_name: None,
            status: None,
            chain: Vec::new(),
        }
    }

    /// Wrap any error, keeping its type name and source chain.
    pub fn from_error<E>(kind: ErrorKind, error: &E) -> Self
    where
        E: Error + 'static,
    {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind,
            message: Some(error.to_string()),
            trace: None,
            type_name: Some(std::any::type_name::<E>().to_string()),
            status: None,
            chain,
        }
    }

    /// An error carrying its own HTTP status.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorKind::Http).with_message(message);
        error.status = Some(status);
        error
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorKind::Unauthenticated).with_message("Unauthenticated.")
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Capture the current backtrace as trace text.
    ///
    /// Honours `RUST_BACKTRACE`; when capturing is disabled no trace is set.
    pub fn with_backtrace(mut self) -> Self {
        let backtrace = Backtrace::capture();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            self.trace = Some(backtrace.to_string());
        }
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Name used in mail subjects and error pages.
    pub fn class_name(&self) -> String {
        match &self.type_name {
            Some(name) => name.clone(),
            None => self.kind.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.kind.status_code())
    }

    pub fn flatten(&self) -> FlattenedError {
        FlattenedError {
            kind: self.kind,
            class: self.class_name(),
            message: self.message.clone().unwrap_or_default(),
            status: self.status_code().as_u16(),
            trace: self
                .trace
                .as_deref()
                .map(|t| t.lines().map(str::to_string).collect())
                .unwrap_or_default(),
            chain: self.chain.clone(),
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {}", message))
        .unwrap_or_default()
}

impl IntoResponse for CapturedError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("Error").to_string();
        let mut response = (status, reason).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Framework-independent view of a [`CapturedError`], ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct FlattenedError {
    pub kind: ErrorKind,
    pub class: String,
    pub message: String,
    pub status: u16,
    pub trace: Vec<String>,
    pub chain: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("ledger unavailable")]
    struct LedgerError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_from_error_keeps_type_and_chain() {
        let err = LedgerError {
            source: std::io::Error::other("disk full"),
        };
        let captured = CapturedError::from_error(ErrorKind::Generic, &err);

        assert_eq!(captured.message.as_deref(), Some("ledger unavailable"));
        assert!(captured.class_name().ends_with("LedgerError"));
        assert_eq!(captured.chain, vec!["disk full".to_string()]);
    }

    #[test]
    fn test_http_error_uses_carried_status() {
        let captured = CapturedError::http(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
        assert_eq!(captured.kind, ErrorKind::Http);
        assert_eq!(captured.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_flatten_splits_trace_lines() {
        let flat = CapturedError::generic("boom")
            .with_trace("at a\nat b")
            .flatten();
        assert_eq!(flat.class, "Generic");
        assert_eq!(flat.status, 500);
        assert_eq!(flat.trace, vec!["at a", "at b"]);
    }

    #[test]
    fn test_into_response_carries_error() {
        let response = CapturedError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let carried = response.extensions().get::<CapturedError>().unwrap();
        assert_eq!(carried.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_display() {
        assert_eq!(CapturedError::generic("boom").to_string(), "Generic: boom");
        assert_eq!(CapturedError::new(ErrorKind::Fatal).to_string(), "Fatal");

        let boxed: Box<dyn Error + Send + Sync> = Box::new(CapturedError::generic("boom"));
        assert_eq!(boxed.to_string(), "Generic: boom");
        assert!(boxed.source().is_none());
    }
}
