use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use pricewatch_core::error::AppError;
use pricewatch_core::traits::PageDriver;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::http_driver::validate_locator;
use crate::selectors::PageSelectors;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Page driver backed by a headless Chromium over the DevTools protocol.
///
/// Each driver owns one browser process and keeps a single tab open for its
/// lifetime, so a pool of N drivers means N independent rendering contexts.
pub struct BrowserPageDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    selectors: PageSelectors,
}

impl BrowserPageDriver {
    /// Launch a headless Chromium and open its working tab.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH`, `CHROME_BIN`,
    /// or one of the well-known install locations.
    pub async fn launch(selectors: PageSelectors) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // The snap wrapper rejects standard Chrome flags, so prefer the real
        // binary when one can be found.
        if let Some(bin) = find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(AppError::BrowserError(format!("Failed to open tab: {e}")));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            selectors,
        })
    }

    /// Click the expand control if the page has one. Missing is fine.
    async fn expand_listings(&self) {
        let Some(expand) = &self.selectors.expand else {
            return;
        };
        if let Ok(button) = self.page.find_element(expand.as_str()).await
            && let Err(e) = button.click().await
        {
            tracing::debug!(error = %e, "Expand control not clickable");
        }
    }

    /// Poll until the ready selector matches or `deadline` passes.
    async fn wait_until_ready(&self, deadline: Instant, timeout: Duration) -> Result<(), AppError> {
        loop {
            if let Ok(nodes) = self.page.find_elements(self.selectors.ready.as_str()).await
                && !nodes.is_empty()
            {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::Timeout(timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl PageDriver for BrowserPageDriver {
    async fn load_tokens(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, AppError> {
        validate_locator(locator)?;
        let deadline = Instant::now() + timeout;

        self.page
            .goto(locator)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to navigate to {locator}: {e}")))?;

        self.expand_listings().await;
        self.wait_until_ready(deadline, timeout).await?;

        let nodes = self
            .page
            .find_elements(self.selectors.price.as_str())
            .await
            .map_err(|e| AppError::StaleContent(format!("Price nodes vanished: {e}")))?;

        let mut tokens = Vec::with_capacity(nodes.len());
        for node in nodes {
            let text = node
                .inner_text()
                .await
                .map_err(|e| AppError::StaleContent(format!("Price node detached: {e}")))?;
            if let Some(text) = text.map(|t| t.trim().to_string())
                && !text.is_empty()
            {
                tokens.push(text);
            }
        }
        Ok(tokens)
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via snap, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags and breaks headless mode.
/// Returns `None` to let `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
