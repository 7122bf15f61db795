//! Error taxonomy for the resolution pipeline.

use std::time::Duration;

/// Number of characters of an unparsable body kept for diagnostics.
pub const SNIPPET_CHARS: usize = 500;

/// Everything that can go wrong while acquiring a page and reading its payload.
///
/// "No record" is not an error: the resolver reports it as data.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("rendering session failed to start: {0}")]
    SessionStart(String),

    #[error("rendering session is closed")]
    SessionClosed,

    #[error("failed to open page context: {0}")]
    ContextCreation(String),

    #[error("failed to close page context: {0}")]
    ContextClose(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {}s", timeout.as_secs())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("failed to read rendered text from {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// The rendered body was not JSON. `snippet` holds at most
    /// [`SNIPPET_CHARS`] characters of it.
    #[error("invalid JSON response from {url}")]
    MalformedResponse { url: String, snippet: String },

    #[error("fetch task aborted: {0}")]
    Task(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::NavigationTimeout { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, FetchError::MalformedResponse { .. })
    }

    /// URL the failure relates to, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Navigation { url, .. }
            | FetchError::NavigationTimeout { url, .. }
            | FetchError::Extraction { url, .. }
            | FetchError::MalformedResponse { url, .. } => Some(url),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// First [`SNIPPET_CHARS`] characters of `text`, cut on a char boundary.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_short_text_untouched() {
        assert_eq!(snippet("<html>oops</html>"), "<html>oops</html>");
    }

    #[test]
    fn test_snippet_cuts_on_char_boundary() {
        let text = "ñ".repeat(SNIPPET_CHARS + 20);
        let cut = snippet(&text);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS);
        assert!(text.starts_with(&cut));
    }

    #[test]
    fn test_error_kind_helpers() {
        let timeout = FetchError::NavigationTimeout {
            url: "https://example.test/".into(),
            timeout: Duration::from_secs(15),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_malformed());
        assert_eq!(timeout.url(), Some("https://example.test/"));
        assert_eq!(
            timeout.to_string(),
            "navigation to https://example.test/ timed out after 15s"
        );
        assert_eq!(FetchError::SessionClosed.url(), None);
    }
}
