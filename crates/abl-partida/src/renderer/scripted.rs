//! In-process renderer that answers navigations from a script.
//!
//! Lets the fetcher, resolver and HTTP layer be exercised without a browser.

use super::{NavigationResult, RenderContext, Renderer};
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted page does when navigated to.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    /// Load and render this body text.
    Body(String),
    /// Never finish loading within the navigation bound.
    Timeout,
    /// Fail the navigation outright.
    Unreachable,
    /// Render this body text after a delay. A delay longer than the
    /// navigation bound times out instead.
    Delayed(Duration, String),
}

#[derive(Default)]
struct Shared {
    pages: Mutex<HashMap<String, ScriptedPage>>,
    navigations: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    peak: AtomicUsize,
    refuse_contexts: AtomicBool,
    shut_down: AtomicBool,
}

/// Renderer whose pages are looked up by exact URL. Unknown URLs are
/// unreachable.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    shared: Arc<Shared>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as the rendered text of `url`.
    pub fn with_body(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_page(url, ScriptedPage::Body(body.into()))
    }

    pub fn with_page(self, url: impl Into<String>, page: ScriptedPage) -> Self {
        if let Ok(mut pages) = self.shared.pages.lock() {
            pages.insert(url.into(), page);
        }
        self
    }

    /// Make every `new_context` call fail.
    pub fn refusing_contexts(self) -> Self {
        self.shared.refuse_contexts.store(true, Ordering::Relaxed);
        self
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.shared
            .navigations
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn opened_contexts(&self) -> usize {
        self.shared.opened.load(Ordering::Relaxed)
    }

    pub fn closed_contexts(&self) -> usize {
        self.shared.closed.load(Ordering::Relaxed)
    }

    /// Highest number of contexts that were open at the same time.
    pub fn peak_contexts(&self) -> usize {
        self.shared.peak.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        if self.shared.shut_down.load(Ordering::Relaxed) {
            return Err(FetchError::SessionClosed);
        }
        if self.shared.refuse_contexts.load(Ordering::Relaxed) {
            return Err(FetchError::ContextCreation("scripted refusal".into()));
        }
        let opened = self.shared.opened.fetch_add(1, Ordering::Relaxed) + 1;
        let open_now = opened - self.shared.closed.load(Ordering::Relaxed);
        self.shared.peak.fetch_max(open_now, Ordering::Relaxed);
        Ok(Box::new(ScriptedContext {
            shared: Arc::clone(&self.shared),
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shared.shut_down.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.opened_contexts() - self.closed_contexts()
    }
}

struct ScriptedContext {
    shared: Arc<Shared>,
    current: Option<String>,
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult> {
        if let Ok(mut navigations) = self.shared.navigations.lock() {
            navigations.push(url.to_string());
        }
        let page = self
            .shared
            .pages
            .lock()
            .ok()
            .and_then(|pages| pages.get(url).cloned())
            .unwrap_or(ScriptedPage::Unreachable);

        match page {
            ScriptedPage::Body(body) => {
                self.current = Some(body);
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: 0,
                })
            }
            ScriptedPage::Timeout => Err(FetchError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
            ScriptedPage::Unreachable => Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
            ScriptedPage::Delayed(delay, _) if delay > timeout => {
                tokio::time::sleep(timeout).await;
                Err(FetchError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
            ScriptedPage::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                self.current = Some(body);
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: delay.as_millis() as u64,
                })
            }
        }
    }

    async fn body_text(&self) -> Result<String> {
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.shared.closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
