use crate::exception::{ErrorKind, KindPattern};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which error kinds are never reported and which ones trigger a notification.
///
/// `suppressed` always wins over `captured`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPolicy {
    #[serde(default = "default_suppressed")]
    suppressed: HashSet<ErrorKind>,
    #[serde(default = "default_captured")]
    captured: HashSet<KindPattern>,
}

fn default_suppressed() -> HashSet<ErrorKind> {
    HashSet::from([
        ErrorKind::NotFound,
        ErrorKind::Unauthenticated,
        ErrorKind::Unauthorized,
        ErrorKind::Http,
        ErrorKind::TokenMismatch,
        ErrorKind::ValidationFailed,
    ])
}

fn default_captured() -> HashSet<KindPattern> {
    HashSet::from([
        KindPattern::Kind(ErrorKind::Fatal),
        KindPattern::Kind(ErrorKind::CommandNotFound),
        KindPattern::Kind(ErrorKind::Generic),
    ])
}

impl Default for ReportingPolicy {
    fn default() -> Self {
        Self {
            suppressed: default_suppressed(),
            captured: default_captured(),
        }
    }
}

impl ReportingPolicy {
    pub fn new(
        suppressed: impl IntoIterator<Item = ErrorKind>,
        captured: impl IntoIterator<Item = KindPattern>,
    ) -> Self {
        Self {
            suppressed: suppressed.into_iter().collect(),
            captured: captured.into_iter().collect(),
        }
    }

    pub fn is_suppressed(&self, kind: ErrorKind) -> bool {
        self.suppressed.contains(&kind)
    }

    pub fn is_captured(&self, kind: ErrorKind) -> bool {
        self.captured.iter().any(|pattern| pattern.matches(kind))
    }

    /// Whether an error of this kind should reach the operator.
    pub fn should_report(&self, kind: ErrorKind) -> bool {
        !self.is_suppressed(kind) && self.is_captured(kind)
    }

    pub fn suppressed(&self) -> &HashSet<ErrorKind> {
        &self.suppressed
    }

    pub fn captured(&self) -> &HashSet<KindPattern> {
        &self.captured
    }
}
