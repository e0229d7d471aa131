//! HTML rendering of captured errors.

use crate::error::{CapabilityError, ReporterError, Result};
use crate::exception::FlattenedError;
use handlebars::Handlebars;

/// Turns a flattened error into an HTML document.
pub trait ErrorRenderer: Send + Sync + 'static {
    fn render_html(&self, error: &FlattenedError) -> std::result::Result<String, CapabilityError>;
}

const ERROR_PAGE: &str = "error_page";

const ERROR_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{class}}</title>
<style>
body { font-family: sans-serif; margin: 2em; color: #222; }
h1 { font-size: 1.4em; }
.status { color: #a00; }
pre { background: #f6f6f6; padding: 1em; overflow-x: auto; }
</style>
</head>
<body>
<h1><span class="status">{{status}}</span> {{class}}</h1>
<p>{{message}}</p>
{{#if chain}}
<h2>Caused by</h2>
<ol>
{{#each chain}}<li>{{this}}</li>
{{/each}}</ol>
{{/if}}
{{#if trace}}
<h2>Trace</h2>
<pre>{{#each trace}}{{this}}
{{/each}}</pre>
{{/if}}
</body>
</html>
"#;

/// Default renderer backed by a handlebars template.
///
/// Every interpolated field is HTML-escaped.
pub struct HtmlErrorRenderer {
    registry: Handlebars<'static>,
}

impl HtmlErrorRenderer {
    pub fn new() -> Result<Self> {
        Self::with_template(ERROR_PAGE_TEMPLATE)
    }

    /// Use a custom template. It receives the fields of [`FlattenedError`].
    pub fn with_template(template: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_template_string(ERROR_PAGE, template)?;
        Ok(Self { registry })
    }
}

impl ErrorRenderer for HtmlErrorRenderer {
    fn render_html(&self, error: &FlattenedError) -> std::result::Result<String, CapabilityError> {
        self.registry
            .render(ERROR_PAGE, error)
            .map_err(|e| Box::new(ReporterError::Render(e.to_string())) as CapabilityError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::CapturedError;

    #[test]
    fn test_renders_class_message_and_trace() {
        let renderer = HtmlErrorRenderer::new().unwrap();
        let flat = CapturedError::generic("ledger offline")
            .with_trace("frame one\nframe two")
            .flatten();

        let html = renderer.render_html(&flat).unwrap();
        assert!(html.contains("<title>Generic</title>"));
        assert!(html.contains("ledger offline"));
        assert!(html.contains("frame two"));
        assert!(!html.contains("Caused by"));
    }

    #[test]
    fn test_escapes_message() {
        let renderer = HtmlErrorRenderer::new().unwrap();
        let flat = CapturedError::generic("<script>alert(1)</script>").flatten();

        let html = renderer.render_html(&flat).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        assert!(matches!(
            HtmlErrorRenderer::with_template("{{#if}}"),
            Err(ReporterError::Render(_))
        ));
    }
}
