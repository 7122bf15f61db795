//! Page fetcher: one navigation, rendered text out, JSON in.
//!
//! Every fetch opens its own page context and closes it on every exit path.
//! The acquire/navigate/release sequence runs as a spawned task, so a caller
//! that stops waiting (e.g. an expired request timeout) does not leak the
//! page: the task runs to its own navigation bound and then releases it.

use crate::error::{snippet, FetchError, Result};
use crate::renderer::{RenderContext, Renderer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Default bound for a single navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches URLs through the shared rendering session and parses their
/// rendered body as JSON. Single attempt per call; no retries.
#[derive(Clone)]
pub struct PageFetcher {
    renderer: Arc<dyn Renderer>,
    navigation_timeout: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl PageFetcher {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            gate: None,
        }
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Cap the number of page contexts open at once. Without a cap every
    /// request opens its page immediately.
    pub fn with_max_open_pages(mut self, max: usize) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Navigate to `url` and return its rendered body parsed as JSON.
    pub async fn fetch(&self, url: &str) -> Result<Value> {
        let renderer = Arc::clone(&self.renderer);
        let gate = self.gate.clone();
        let timeout = self.navigation_timeout;
        let url = url.to_string();

        tokio::spawn(gated_fetch(renderer, gate, url, timeout))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }
}

async fn gated_fetch(
    renderer: Arc<dyn Renderer>,
    gate: Option<Arc<Semaphore>>,
    url: String,
    timeout: Duration,
) -> Result<Value> {
    let _permit = match gate {
        Some(gate) => Some(
            gate.acquire_owned()
                .await
                .map_err(|_| FetchError::SessionClosed)?,
        ),
        None => None,
    };
    fetch_once(renderer.as_ref(), &url, timeout).await
}

async fn fetch_once(renderer: &dyn Renderer, url: &str, timeout: Duration) -> Result<Value> {
    let mut ctx = renderer.new_context().await.inspect_err(|e| {
        error!(url, "could not open page context: {e}");
    })?;

    let result = load_json(ctx.as_mut(), url, timeout).await;

    if let Err(e) = ctx.close().await {
        warn!(url, "failed to release page context: {e}");
    }

    match &result {
        Ok(_) => {}
        Err(FetchError::MalformedResponse { snippet, .. }) => {
            error!(url, snippet = %snippet, "invalid JSON response");
        }
        Err(e) => error!(url, "page fetch failed: {e}"),
    }

    result
}

async fn load_json(ctx: &mut dyn RenderContext, url: &str, timeout: Duration) -> Result<Value> {
    let nav = ctx.navigate(url, timeout).await?;
    debug!(url, final_url = %nav.final_url, load_time_ms = nav.load_time_ms, "page loaded");

    let text = ctx.body_text().await?;
    parse_payload(url, &text)
}

/// Parse rendered text as JSON, keeping a bounded snippet on failure.
pub fn parse_payload(url: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text.trim()).map_err(|_| FetchError::MalformedResponse {
        url: url.to_string(),
        snippet: snippet(text),
    })
}
