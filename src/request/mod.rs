//! Request context captured for error reports.

use crate::error::ReporterError;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, Uri, header, request::Parts},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Client address lookups, highest precedence first.
///
/// Each entry pairs the CGI server variable name with the header it maps to.
pub const CLIENT_IP_HEADERS: [(&str, &str); 5] = [
    ("HTTP_CLIENT_IP", "client-ip"),
    ("HTTP_X_FORWARDED_FOR", "x-forwarded-for"),
    ("HTTP_X_FORWARDED", "x-forwarded"),
    ("HTTP_FORWARDED_FOR", "forwarded-for"),
    ("HTTP_FORWARDED", "forwarded"),
];

pub const UNKNOWN_CLIENT_IP: &str = "UNKNOWN";

/// Immutable view of the request an error happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    pub inputs: BTreeMap<String, String>,
    pub client_ip: String,
}

/// What `render` needs to know about the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub snapshot: RequestSnapshot,
    pub expects_json: bool,
}

/// A request whose body could not be read.
///
/// `record` still carries the URL, method, headers and query inputs.
#[derive(Debug)]
pub struct IncompleteCapture {
    pub record: RequestRecord,
    pub error: ReporterError,
}

impl RequestRecord {
    /// Capture the record from a request, handing the request back intact.
    ///
    /// Form and JSON bodies are buffered to collect their fields when the
    /// declared `Content-Length` fits in `body_limit`; other bodies are left
    /// untouched.
    pub async fn capture(
        request: Request<Body>,
        body_limit: usize,
    ) -> Result<(Self, Request<Body>), IncompleteCapture> {
        let (parts, body) = request.into_parts();
        let mut record = Self::from_parts(&parts, query_inputs(&parts.uri));

        let body = match body_format(&parts.headers) {
            Some(format) if declared_length(&parts.headers).is_some_and(|n| n <= body_limit) => {
                let bytes = match axum::body::to_bytes(body, body_limit).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return Err(IncompleteCapture {
                            record,
                            error: ReporterError::Request(e.to_string()),
                        });
                    }
                };
                record.snapshot.inputs.extend(body_inputs(format, &bytes));
                Body::from(bytes)
            }
            _ => body,
        };

        Ok((record, Request::from_parts(parts, body)))
    }

    pub fn from_parts(parts: &Parts, inputs: BTreeMap<String, String>) -> Self {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Self {
            snapshot: RequestSnapshot {
                url: request_url(&parts.uri, &parts.headers),
                method: parts.method.to_string(),
                inputs,
                client_ip: client_ip(&parts.headers, remote_addr),
            },
            expects_json: expects_json(&parts.headers),
        }
    }
}

/// Client address, by header precedence, then the socket peer, then `"UNKNOWN"`.
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .find_map(|(_, name)| header_str(headers, name))
        .map(str::to_string)
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT_IP.to_string())
}

/// Whether the caller wants a structured (JSON) reply rather than a page.
pub fn expects_json(headers: &HeaderMap) -> bool {
    let ajax = header_str(headers, "x-requested-with")
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    let pjax = headers.contains_key("x-pjax");

    (ajax && !pjax && accepts_any_content_type(headers)) || wants_json(headers)
}

fn wants_json(headers: &HeaderMap) -> bool {
    first_accepted(headers).is_some_and(|media| media.contains("/json") || media.contains("+json"))
}

fn accepts_any_content_type(headers: &HeaderMap) -> bool {
    match first_accepted(headers) {
        None => true,
        Some(media) => media == "*/*" || media == "*",
    }
}

fn first_accepted(headers: &HeaderMap) -> Option<String> {
    let accept = header_str(headers, header::ACCEPT.as_str())?;
    let first = accept.split(',').next()?;
    let media = first.split(';').next()?.trim().to_ascii_lowercase();
    (!media.is_empty()).then_some(media)
}

/// Non-empty, trimmed header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// URL without the query string.
fn request_url(uri: &Uri, headers: &HeaderMap) -> String {
    let path = uri.path();
    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| header_str(headers, header::HOST.as_str()));

    match host {
        Some(host) => {
            let scheme = uri.scheme_str().unwrap_or("http");
            format!("{}://{}{}", scheme, host, path)
        }
        None => path.to_string(),
    }
}

fn query_inputs(uri: &Uri) -> BTreeMap<String, String> {
    uri.query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Form,
    Json,
}

fn body_format(headers: &HeaderMap) -> Option<BodyFormat> {
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str())?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();

    if mime == "application/x-www-form-urlencoded" {
        Some(BodyFormat::Form)
    } else if mime == "application/json" || mime.ends_with("+json") {
        Some(BodyFormat::Json)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    header_str(headers, header::CONTENT_LENGTH.as_str())?
        .parse()
        .ok()
}

fn body_inputs(format: BodyFormat, bytes: &[u8]) -> BTreeMap<String, String> {
    match format {
        BodyFormat::Form => url::form_urlencoded::parse(bytes).into_owned().collect(),
        BodyFormat::Json => match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(serde_json::Value::Object(fields)) => fields
                .into_iter()
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => (key, s),
                    other => (key, other.to_string()),
                })
                .collect(),
            _ => BTreeMap::new(),
        },
    }
}
