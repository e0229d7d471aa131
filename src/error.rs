use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReporterError>;

/// Error returned by an injected capability (renderer, mailer).
///
/// Capabilities are supplied by the host, so their failures stay type-erased.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to render error page: {0}")]
    Render(String),

    #[error("Failed to send error notification: {0}")]
    Mail(String),

    #[error("Invalid configuration for {key}: {message}")]
    Config { key: String, message: String },

    #[error("Failed to read request: {0}")]
    Request(String),
}

impl ReporterError {
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn render(err: CapabilityError) -> Self {
        Self::Render(err.to_string())
    }

    pub(crate) fn mail(err: CapabilityError) -> Self {
        Self::Mail(err.to_string())
    }
}

impl From<handlebars::TemplateError> for ReporterError {
    fn from(err: handlebars::TemplateError) -> Self {
        ReporterError::Render(format!("Template error: {}", err))
    }
}
