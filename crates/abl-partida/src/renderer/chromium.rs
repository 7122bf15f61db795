//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reads the rendered body text; empty when the document has no body.
const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Find a Chromium binary on the system PATH.
pub fn find_chromium() -> Option<PathBuf> {
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Launch settings for the rendering session.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Explicit executable; falls back to [`find_chromium`], then to
    /// chromiumoxide's own detection.
    pub chrome_path: Option<PathBuf>,
}

/// The process-wide headless Chromium session.
pub struct ChromiumRenderer {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch headless Chromium for an unprivileged container: no sandbox,
    /// single process, no GPU.
    pub async fn start(options: LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--single-process")
            .arg("--no-zygote");

        if let Some(path) = options.chrome_path.or_else(find_chromium) {
            debug!(path = %path.display(), "using Chromium executable");
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| FetchError::SessionStart(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::SessionStart(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
        });

        info!("Chromium session started");

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(FetchError::SessionClosed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::ContextCreation(e.to_string()))?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(mut browser) = self.browser.write().await.take() else {
            return Ok(());
        };

        if let Err(e) = browser.close().await {
            warn!("failed to close Chromium cleanly: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("failed to reap Chromium process: {e}");
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }

        info!("Chromium session closed");
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(FetchError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(FetchError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn body_text(&self) -> Result<String> {
        let url = self.page.url().await.ok().flatten().unwrap_or_default();

        let result = self
            .page
            .evaluate(BODY_TEXT_JS)
            .await
            .map_err(|e| FetchError::Extraction {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        result.into_value::<String>().map_err(|e| FetchError::Extraction {
            url,
            reason: format!("body text is not a string: {e}"),
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page
            .close()
            .await
            .map_err(|e| FetchError::ContextClose(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_reads_json_body() {
        let renderer = ChromiumRenderer::start(LaunchOptions::default())
            .await
            .expect("failed to start renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");
        assert_eq!(renderer.active_contexts(), 1);

        ctx.navigate(
            "data:text/html,<body>{\"pdamatriz\":\"456\"}</body>",
            Duration::from_secs(10),
        )
        .await
        .expect("navigation failed");

        let text = ctx.body_text().await.expect("body_text failed");
        assert_eq!(text, "{\"pdamatriz\":\"456\"}");

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
        assert!(matches!(
            renderer.new_context().await,
            Err(FetchError::SessionClosed)
        ));
        renderer.shutdown().await.expect("second shutdown is a no-op");
    }
}
