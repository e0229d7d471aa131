use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Closed taxonomy of errors the filter knows how to classify.
///
/// The kind is decided once, by whoever raises or wraps the error, and every
/// policy decision afterwards is a `match` on it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ErrorKind {
    /// Missing route or missing record.
    NotFound,
    /// No authenticated user on a route that needs one.
    Unauthenticated,
    /// Authenticated, but not allowed.
    Unauthorized,
    /// CSRF token did not match the session.
    TokenMismatch,
    ValidationFailed,
    /// Error raised with an explicit HTTP status.
    Http,
    /// Unrecoverable failure (panic, fatal runtime error).
    Fatal,
    CommandNotFound,
    Generic,
}

impl ErrorKind {
    /// Status the default responder uses for this kind.
    ///
    /// `Http` has no fixed status; callers should prefer the status carried
    /// by the error itself.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            // 419 "Page Expired" is not in the IANA registry.
            ErrorKind::TokenMismatch => {
                StatusCode::from_u16(419).unwrap_or(StatusCode::BAD_REQUEST)
            }
            ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Http
            | ErrorKind::Fatal
            | ErrorKind::CommandNotFound
            | ErrorKind::Generic => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One entry of a kind set: either a concrete kind or the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KindPattern {
    Any,
    Kind(ErrorKind),
}

impl KindPattern {
    pub fn matches(&self, kind: ErrorKind) -> bool {
        match self {
            KindPattern::Any => true,
            KindPattern::Kind(k) => *k == kind,
        }
    }
}

impl From<ErrorKind> for KindPattern {
    fn from(kind: ErrorKind) -> Self {
        KindPattern::Kind(kind)
    }
}

impl FromStr for KindPattern {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(KindPattern::Any),
            other => other.parse().map(KindPattern::Kind),
        }
    }
}

impl TryFrom<String> for KindPattern {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KindPattern> for String {
    fn from(pattern: KindPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for KindPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindPattern::Any => f.write_str("*"),
            KindPattern::Kind(kind) => write!(f, "{}", kind),
        }
    }
}
