use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::{get, post},
};
use faultline::prelude::*;
use std::sync::Mutex;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<NotificationPayload>>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CapabilityError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingLog {
    lines: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl RecordingLog {
    fn lines(&self, level: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl DiagnosticLog for RecordingLog {
    fn debug(&self, message: &str) {
        self.lines.lock().unwrap().push(("debug", message.to_string()));
    }
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(("info", message.to_string()));
    }
    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(("error", message.to_string()));
    }
}

async fn ok() -> &'static str {
    "fine"
}

async fn boom() -> Result<&'static str, CapturedError> {
    Err(CapturedError::generic("ledger offline"))
}

async fn missing() -> Result<&'static str, CapturedError> {
    Err(CapturedError::not_found("no such invoice"))
}

async fn private() -> Result<&'static str, CapturedError> {
    Err(CapturedError::unauthenticated())
}

async fn explode() -> &'static str {
    panic!("invariant broken")
}

async fn echo(body: String) -> String {
    body
}

async fn gone() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn app(mailer: RecordingMailer) -> Router {
    app_with(mailer, RecordingLog::default())
}

fn app_with(mailer: RecordingMailer, log: RecordingLog) -> Router {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config = ReporterConfig {
        app_name: "Billing".to_string(),
        recipients: vec!["ops@example.com".to_string()],
        ..ReporterConfig::default()
    };
    let filter = ErrorReportingFilter::builder()
        .config(config)
        .mailer(mailer)
        .log(log)
        .build()
        .unwrap();

    Router::new()
        .route("/ok", get(ok))
        .route("/boom", get(boom))
        .route("/missing", get(missing))
        .route("/private", get(private))
        .route("/explode", get(explode))
        .route("/echo", post(echo))
        .route("/gone", get(gone))
        .layer(ErrorReportingLayer::new(filter).catch_panics(true))
        .layer(TraceLayer::new_for_http())
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "billing.local")
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_success_passes_through() {
    let mailer = RecordingMailer::default();
    let response = app(mailer.clone()).oneshot(get_request("/ok")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "fine");
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generic_error_is_mailed_once() {
    let mailer = RecordingMailer::default();
    let response = app(mailer.clone())
        .oneshot(get_request("/boom?page=2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Billing - Generic");
    let request = sent[0].request.as_ref().unwrap();
    assert_eq!(request.url, "http://billing.local/boom");
    assert_eq!(request.inputs.get("page").map(String::as_str), Some("2"));
    assert_eq!(request.client_ip, "UNKNOWN");
}

#[tokio::test]
async fn test_not_found_is_not_mailed() {
    let mailer = RecordingMailer::default();
    let log = RecordingLog::default();
    let response = app_with(mailer.clone(), log.clone())
        .oneshot(get_request("/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(mailer.sent.lock().unwrap().is_empty());
    assert_eq!(log.lines("debug").len(), 1);
}

#[tokio::test]
async fn test_unrouted_path_logs_one_not_found_line() {
    let mailer = RecordingMailer::default();
    let log = RecordingLog::default();
    let response = app_with(mailer.clone(), log.clone())
        .oneshot(get_request("/nope?ref=mail"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let debug = log.lines("debug");
    assert_eq!(debug.len(), 1);
    assert!(debug[0].starts_with("404: http://billing.local/nope\n"));
    assert!(debug[0].contains(r#""ref": "mail""#));
    assert!(log.lines("error").is_empty());
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bare_not_found_keeps_handler_response() {
    let log = RecordingLog::default();
    let response = app_with(RecordingMailer::default(), log.clone())
        .oneshot(get_request("/gone"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "");
    assert_eq!(log.lines("debug").len(), 1);
}

#[tokio::test]
async fn test_unreadable_body_goes_through_filter() {
    // Declared length is within the input limit, the body is not.
    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, "4")
        .body(Body::from("x".repeat(128 * 1024)))
        .unwrap();
    let log = RecordingLog::default();
    let response = app_with(RecordingMailer::default(), log.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["statusCode"], 400);
    assert!(body["timestamp"].is_string());
    assert_eq!(log.lines("error").len(), 1);
}

#[tokio::test]
async fn test_unauthenticated_browser_is_redirected() {
    let response = app(RecordingMailer::default())
        .oneshot(get_request("/private"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_unauthenticated_api_client_gets_401() {
    let request = Request::builder()
        .uri("/private")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = app(RecordingMailer::default())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, r#"{"error":"Unauthenticated."}"#);
}

#[tokio::test]
async fn test_panic_is_reported_as_fatal() {
    let mailer = RecordingMailer::default();
    let response = app(mailer.clone())
        .oneshot(get_request("/explode"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html_body.contains("invariant broken"));
}

#[tokio::test]
async fn test_form_body_still_reaches_handler() {
    let body = "name=Ada&amount=12";
    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app(RecordingMailer::default())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, body);
}
