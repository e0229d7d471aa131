//! Tower layer that runs every unhandled error through an
//! [`ErrorReportingFilter`].

use crate::exception::{CapturedError, ErrorKind, ErrorReportingFilter};
use crate::request::{IncompleteCapture, RequestRecord};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Tower Layer for error reporting
///
/// # Example
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use faultline::exception::{CapturedError, ErrorReportingFilter};
/// use faultline::layer::ErrorReportingLayer;
///
/// async fn boom() -> Result<&'static str, CapturedError> {
///     Err(CapturedError::generic("ledger offline"))
/// }
///
/// # fn build() -> faultline::Result<Router> {
/// let filter = ErrorReportingFilter::builder().build()?;
/// let app = Router::new()
///     .route("/boom", get(boom))
///     .layer(ErrorReportingLayer::new(filter).catch_panics(true));
/// # Ok(app)
/// # }
/// ```
#[derive(Clone)]
pub struct ErrorReportingLayer {
    filter: Arc<ErrorReportingFilter>,
    catch_panics: bool,
}

impl ErrorReportingLayer {
    pub fn new(filter: ErrorReportingFilter) -> Self {
        Self::shared(Arc::new(filter))
    }

    pub fn shared(filter: Arc<ErrorReportingFilter>) -> Self {
        Self {
            filter,
            catch_panics: false,
        }
    }

    /// Run each request on its own task so a panicking handler becomes a
    /// `Fatal` error instead of tearing down the connection.
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }
}

impl<S> Layer<S> for ErrorReportingLayer {
    type Service = ErrorReportingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorReportingMiddleware {
            inner,
            filter: self.filter.clone(),
            catch_panics: self.catch_panics,
        }
    }
}

#[derive(Clone)]
pub struct ErrorReportingMiddleware<S> {
    inner: S,
    filter: Arc<ErrorReportingFilter>,
    catch_panics: bool,
}

impl<S> Service<Request<Body>> for ErrorReportingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Backpressure is applied per call: `oneshot` waits for the cloned
        // inner service to be ready before calling it.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let filter = self.filter.clone();
        let inner = self.inner.clone();
        let catch_panics = self.catch_panics;

        Box::pin(async move {
            let limit = filter.config().input_body_limit;
            let (record, request) = match RequestRecord::capture(request, limit).await {
                Ok(captured) => captured,
                Err(IncompleteCapture { record, error }) => {
                    filter.log().error(&format!(
                        "Could not read request for error reporting: {}",
                        error
                    ));
                    let error = CapturedError::http(StatusCode::BAD_REQUEST, error.to_string());
                    return Ok(filter.handle(&error, &record).await);
                }
            };

            let response = if catch_panics {
                match tokio::spawn(inner.oneshot(request)).await {
                    Ok(result) => result.unwrap_or_else(service_error),
                    Err(join_error) if join_error.is_panic() => {
                        panic_error(join_error.into_panic()).into_response()
                    }
                    Err(join_error) => CapturedError::new(ErrorKind::Fatal)
                        .with_message(join_error.to_string())
                        .into_response(),
                }
            } else {
                inner.oneshot(request).await.unwrap_or_else(service_error)
            };

            let captured = response.extensions().get::<CapturedError>().cloned();
            match captured {
                Some(error) => {
                    drop(response);
                    Ok(filter.handle(&error, &record).await)
                }
                // Unmatched routes and handlers answering a bare 404.
                None if response.status() == StatusCode::NOT_FOUND => {
                    let error = CapturedError::not_found(format!(
                        "{} {}",
                        record.snapshot.method, record.snapshot.url
                    ));
                    Ok(filter.handle_or(&error, &record, response).await)
                }
                None => Ok(response),
            }
        })
    }
}

fn service_error<E>(error: E) -> Response
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let error: Box<dyn std::error::Error + Send + Sync> = error.into();
    CapturedError::generic(error.to_string()).into_response()
}

fn panic_error(payload: Box<dyn Any + Send>) -> CapturedError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };

    CapturedError::new(ErrorKind::Fatal)
        .with_message(message)
        .with_type_name("panic")
}
