//! # Faultline
//!
//! Error reporting for axum services.
//!
//! Faultline sits between your router and the response that reaches the
//! caller. Every unhandled error is classified once, then:
//!
//! - **Reported**: captured kinds (panics, generic failures) are rendered to an
//!   HTML page and mailed to an operator. Mail failures are logged, never
//!   surfaced.
//! - **Suppressed**: noisy kinds (404s, auth failures, validation) never reach
//!   the operator. 404s leave a single debug line with the request details.
//! - **Rendered**: unauthenticated callers are redirected to the login page, or
//!   get a `401 {"error":"Unauthenticated."}` when they asked for JSON.
//!   Everything else goes through the default responder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use faultline::prelude::*;
//! use axum::routing::get;
//!
//! async fn show_invoice(Path(id): Path<u32>) -> Result<String, CapturedError> {
//!     if id == 0 {
//!         return Err(CapturedError::not_found(format!("invoice {}", id)));
//!     }
//!     Err(CapturedError::generic("ledger offline"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> faultline::Result<()> {
//!     let (mailer, _worker) = QueuedMailer::spawn(LogMailer, 64);
//!     let filter = ErrorReportingFilter::builder()
//!         .config(ReporterConfig::from_env()?)
//!         .mailer(mailer)
//!         .build()?;
//!
//!     let app: Router = Router::new()
//!         .route("/invoices/{id}", get(show_invoice))
//!         .layer(ErrorReportingLayer::new(filter).catch_panics(true));
//!
//!     // Serve your app...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exception;
pub mod layer;
pub mod mail;
pub mod render;
pub mod request;

// Re-export core types
pub use error::{CapabilityError, ReporterError, Result};
pub use exception::{
    CapturedError, ErrorKind, ErrorReportingFilter, ExceptionHandler, ReportingPolicy,
    ResponseDecision,
};
pub use layer::ErrorReportingLayer;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use faultline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, ReporterConfig};
    pub use crate::diagnostics::{DiagnosticLog, TracingLog};
    pub use crate::error::{CapabilityError, ReporterError};
    pub use crate::exception::{
        CapturedError, DefaultResponder, ErrorKind, ErrorReportingFilter, ExceptionHandler,
        FlattenedError, KindPattern, ReportingPolicy, ResponseDecision,
    };
    pub use crate::layer::ErrorReportingLayer;
    pub use crate::mail::{LogMailer, Mailer, NotificationPayload, QueuedMailer};
    pub use crate::render::{ErrorRenderer, HtmlErrorRenderer};
    pub use crate::request::{RequestRecord, RequestSnapshot};
    pub use async_trait::async_trait;
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
