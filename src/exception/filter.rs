use crate::config::ReporterConfig;
use crate::diagnostics::{DiagnosticLog, TracingLog};
use crate::error::{ReporterError, Result};
use crate::exception::{
    CapturedError, DefaultResponder, ErrorKind, ExceptionHandler, ResponseDecision,
};
use crate::mail::{LogMailer, Mailer, NotificationPayload};
use crate::render::{ErrorRenderer, HtmlErrorRenderer};
use crate::request::{RequestRecord, RequestSnapshot};
use async_trait::async_trait;
use axum::{http::StatusCode, response::Response};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Decides, per unhandled error, whether to mail an operator, what to log and
/// how to answer the caller.
///
/// The renderer, mailer and log are injected so each can be swapped for a
/// test double or a host-specific implementation.
///
/// # Example
/// ```rust,no_run
/// use faultline::config::ReporterConfig;
/// use faultline::exception::ErrorReportingFilter;
/// use faultline::mail::{LogMailer, QueuedMailer};
///
/// # async fn run() -> faultline::Result<()> {
/// let (mailer, _worker) = QueuedMailer::spawn(LogMailer, 64);
/// let filter = ErrorReportingFilter::builder()
///     .config(ReporterConfig::from_env()?)
///     .mailer(mailer)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ErrorReportingFilter {
    config: Arc<ReporterConfig>,
    renderer: Arc<dyn ErrorRenderer>,
    mailer: Arc<dyn Mailer>,
    log: Arc<dyn DiagnosticLog>,
    responder: DefaultResponder,
}

impl ErrorReportingFilter {
    pub fn new(
        config: ReporterConfig,
        renderer: Arc<dyn ErrorRenderer>,
        mailer: Arc<dyn Mailer>,
        log: Arc<dyn DiagnosticLog>,
    ) -> Self {
        let responder = DefaultResponder::new(Arc::clone(&renderer), config.debug);
        Self {
            config: Arc::new(config),
            renderer,
            mailer,
            log,
            responder,
        }
    }

    pub fn builder() -> FilterBuilder {
        FilterBuilder::new()
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn responder(&self) -> &DefaultResponder {
        &self.responder
    }

    /// Report the error, then turn it into the response the caller receives.
    pub async fn handle(&self, error: &CapturedError, request: &RequestRecord) -> Response {
        self.report(error, &request.snapshot).await;
        self.render(error, request)
            .respond(error, request, &self.responder)
    }

    /// Like [`handle`](Self::handle), but keeps `fallback` when the filter
    /// leaves rendering to the default.
    pub async fn handle_or(
        &self,
        error: &CapturedError,
        request: &RequestRecord,
        fallback: Response,
    ) -> Response {
        self.report(error, &request.snapshot).await;
        match self.render(error, request) {
            ResponseDecision::Delegate => fallback,
            decision => decision.respond(error, request, &self.responder),
        }
    }

    pub fn log(&self) -> &dyn DiagnosticLog {
        self.log.as_ref()
    }

    fn subject(&self, error: &CapturedError) -> String {
        format!("{} - {}", self.config.app_name, error.class_name())
    }

    fn build_payload(
        &self,
        error: &CapturedError,
        ctx: &RequestSnapshot,
    ) -> Result<NotificationPayload> {
        let html_body = self
            .renderer
            .render_html(&error.flatten())
            .map_err(ReporterError::render)?;

        Ok(NotificationPayload {
            incident_id: Uuid::new_v4(),
            recipients: self.config.recipients.clone(),
            subject: self.subject(error),
            html_body,
            request: self.config.attach_request.then(|| ctx.clone()),
            occurred_at: chrono::Utc::now(),
        })
    }

    /// Returns the incident id of the sent notification, or `None` when there
    /// is nobody to send it to.
    async fn send_notification(
        &self,
        error: &CapturedError,
        ctx: &RequestSnapshot,
    ) -> Result<Option<Uuid>> {
        if self.config.recipients.is_empty() {
            return Ok(None);
        }

        let payload = self.build_payload(error, ctx)?;
        self.mailer
            .send(&payload)
            .await
            .map_err(ReporterError::mail)?;
        Ok(Some(payload.incident_id))
    }

    /// The host's own reporting path: every non-suppressed error is logged.
    fn report_to_log(&self, error: &CapturedError) {
        if self.config.policy.is_suppressed(error.kind) {
            return;
        }

        let mut line = format!("{} [{}]", error, error.class_name());
        for cause in &error.chain {
            line.push_str("\n  caused by: ");
            line.push_str(cause);
        }
        if let Some(trace) = &error.trace {
            line.push('\n');
            line.push_str(trace);
        }
        self.log.error(&line);
    }

    fn log_not_found(&self, request: &RequestSnapshot) {
        #[derive(Serialize)]
        struct NotFoundRecord<'a> {
            url: &'a str,
            method: &'a str,
            inputs: &'a BTreeMap<String, String>,
        }

        let record = NotFoundRecord {
            url: &request.url,
            method: &request.method,
            inputs: &request.inputs,
        };
        let details = serde_json::to_string_pretty(&record).unwrap_or_default();
        self.log.debug(&format!("404: {}\n{}", request.url, details));
    }

    fn unauthenticated(&self, request: &RequestRecord) -> ResponseDecision {
        if request.expects_json {
            ResponseDecision::Json {
                status: StatusCode::UNAUTHORIZED,
                body: json!({ "error": "Unauthenticated." }),
            }
        } else {
            ResponseDecision::Redirect {
                location: self.config.login_path.clone(),
            }
        }
    }
}

#[async_trait]
impl ExceptionHandler for ErrorReportingFilter {
    fn should_report(&self, error: &CapturedError) -> bool {
        self.config.policy.should_report(error.kind)
    }

    async fn report(&self, error: &CapturedError, ctx: &RequestSnapshot) {
        if self.should_report(error) {
            match self.send_notification(error, ctx).await {
                Ok(Some(incident_id)) => self.log.info(&format!(
                    "Error notification {} sent for {}",
                    incident_id,
                    error.class_name()
                )),
                Ok(None) => self.log.info(&format!(
                    "No recipients configured, skipping notification for {}",
                    error.class_name()
                )),
                Err(e) => self.log.error(&format!(
                    "Could not notify about {}: {}",
                    error.class_name(),
                    e
                )),
            }
        }

        self.report_to_log(error);
    }

    fn render(&self, error: &CapturedError, request: &RequestRecord) -> ResponseDecision {
        match error.kind {
            ErrorKind::NotFound => {
                self.log_not_found(&request.snapshot);
                ResponseDecision::Delegate
            }
            ErrorKind::Unauthenticated => self.unauthenticated(request),
            _ => ResponseDecision::Delegate,
        }
    }
}

/// Builder for [`ErrorReportingFilter`]; unset capabilities get defaults.
pub struct FilterBuilder {
    config: ReporterConfig,
    renderer: Option<Arc<dyn ErrorRenderer>>,
    mailer: Option<Arc<dyn Mailer>>,
    log: Option<Arc<dyn DiagnosticLog>>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self {
            config: ReporterConfig::default(),
            renderer: None,
            mailer: None,
            log: None,
        }
    }

    pub fn config(mut self, config: ReporterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn renderer(mut self, renderer: impl ErrorRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn mailer(mut self, mailer: impl Mailer) -> Self {
        self.mailer = Some(Arc::new(mailer));
        self
    }

    pub fn log(mut self, log: impl DiagnosticLog) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    /// Fails only if the default HTML renderer cannot be built.
    pub fn build(self) -> Result<ErrorReportingFilter> {
        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(HtmlErrorRenderer::new()?),
        };
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer));
        let log = self.log.unwrap_or_else(|| Arc::new(TracingLog));

        Ok(ErrorReportingFilter::new(self.config, renderer, mailer, log))
    }
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
