//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` (the process-wide rendering session) and
//! `RenderContext` (one short-lived tab) traits that abstract over the
//! browser engine, currently Chromium via chromiumoxide.

pub mod chromium;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A long-lived rendering session that hands out isolated page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new page context. Contexts are never pooled or reused.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Tear the session down. Contexts requested afterwards fail with
    /// [`FetchError::SessionClosed`](crate::FetchError::SessionClosed).
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single page context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult>;
    /// Plain rendered text of the document body.
    async fn body_text(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
