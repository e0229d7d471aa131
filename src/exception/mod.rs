use crate::request::{RequestRecord, RequestSnapshot};
use async_trait::async_trait;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

mod captured;
mod filter;
pub mod http;
mod kind;
mod policy;

pub use captured::{CapturedError, FlattenedError};
pub use filter::{ErrorReportingFilter, FilterBuilder};
pub use http::DefaultResponder;
pub use kind::{ErrorKind, KindPattern};
pub use policy::ReportingPolicy;

/// How the caller should be answered for a given error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDecision {
    /// Hand the error to the default responder unchanged.
    Delegate,
    Redirect { location: String },
    Json {
        status: StatusCode,
        body: serde_json::Value,
    },
}

impl ResponseDecision {
    pub fn respond(
        self,
        error: &CapturedError,
        request: &RequestRecord,
        responder: &DefaultResponder,
    ) -> Response {
        match self {
            ResponseDecision::Delegate => responder.respond(error, request),
            ResponseDecision::Redirect { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            ResponseDecision::Json { status, body } => (status, Json(body)).into_response(),
        }
    }
}

/// The hook pair a host calls once per unhandled error.
///
/// `report` runs first and must never fail; `render` decides the response.
#[async_trait]
pub trait ExceptionHandler: Send + Sync + 'static {
    fn should_report(&self, error: &CapturedError) -> bool;

    async fn report(&self, error: &CapturedError, ctx: &RequestSnapshot);

    fn render(&self, error: &CapturedError, request: &RequestRecord) -> ResponseDecision;
}
