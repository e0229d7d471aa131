use crate::exception::CapturedError;
use crate::render::ErrorRenderer;
use crate::request::RequestRecord;
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

/// The default rendering step the filter delegates to.
///
/// JSON callers get `{statusCode, message, timestamp}`. Everyone else gets an
/// HTML page: the full error page in debug mode, a bare status page otherwise.
#[derive(Clone)]
pub struct DefaultResponder {
    renderer: Arc<dyn ErrorRenderer>,
    debug: bool,
}

impl DefaultResponder {
    pub fn new(renderer: Arc<dyn ErrorRenderer>, debug: bool) -> Self {
        Self { renderer, debug }
    }

    pub fn respond(&self, error: &CapturedError, request: &RequestRecord) -> Response {
        let status = error.status_code();

        if request.expects_json {
            return (
                status,
                Json(json!({
                    "statusCode": status.as_u16(),
                    "message": self.public_message(error, status),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
                .into_response();
        }

        if self.debug {
            match self.renderer.render_html(&error.flatten()) {
                Ok(page) => return (status, Html(page)).into_response(),
                Err(e) => tracing::warn!("Falling back to plain error page: {}", e),
            }
        }

        (status, Html(plain_page(status))).into_response()
    }

    /// Server errors hide their message unless debugging.
    fn public_message(&self, error: &CapturedError, status: StatusCode) -> String {
        let reason = status.canonical_reason().unwrap_or("Error").to_string();
        if status.is_server_error() && !self.debug {
            return reason;
        }
        error.message.clone().unwrap_or(reason)
    }
}

fn plain_page(status: StatusCode) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{code}</title></head>\
         <body><h1>{code} {reason}</h1></body></html>\n",
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
    )
}
