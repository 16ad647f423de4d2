//! HTTP page driver
//!
//! Loads pages with a plain HTTP client and answers DOM queries against the
//! returned HTML. There is no script engine: input actions and page-context
//! evaluation report [`DriverError::Unsupported`], and waits succeed or fail
//! immediately based on the static document.

use crate::driver::dom::StaticDocument;
use crate::driver::{
    DriverError, DriverResult, GotoOptions, LoadState, Locator, PageDriver, PageLink, ValueSource,
};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Builds the HTTP client used by [`HttpPageDriver`]
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header
/// * `proxy` - Optional proxy URL every request is routed through
pub fn build_http_client(user_agent: &str, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Page driver backed by `reqwest` and `scraper`
pub struct HttpPageDriver {
    client: Client,
    page: Mutex<Option<StaticDocument>>,
    closed: AtomicBool,
}

impl HttpPageDriver {
    pub fn new(user_agent: &str, proxy: Option<&str>) -> DriverResult<Self> {
        Ok(Self::with_client(build_http_client(user_agent, proxy)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            page: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::PageClosed);
        }
        Ok(())
    }

    /// Runs `f` against the loaded document
    fn with_page<T>(&self, f: impl FnOnce(&StaticDocument) -> DriverResult<T>) -> DriverResult<T> {
        self.ensure_open()?;
        let page = self.page.lock().unwrap();
        match page.as_ref() {
            Some(document) => f(document),
            None => Err(DriverError::Navigation {
                url: "about:blank".to_string(),
                message: "no page loaded".to_string(),
            }),
        }
    }

    fn require_element(&self, selector: &str) -> DriverResult<()> {
        let found = self.with_page(|page| page.exists(&Locator::Css(selector.to_string())))?;
        if found {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn goto(&self, url: &str, options: &GotoOptions) -> DriverResult<()> {
        self.ensure_open()?;

        let navigation_error = |message: String| DriverError::Navigation {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DriverError::Timeout(options.timeout)
                } else {
                    navigation_error(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(navigation_error(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                DriverError::Timeout(options.timeout)
            } else {
                navigation_error(e.to_string())
            }
        })?;

        tracing::debug!(
            url = %url,
            final_url = %final_url,
            status = status.as_u16(),
            wait_until = %options.wait_until,
            "Page loaded"
        );

        *self.page.lock().unwrap() = Some(StaticDocument::new(final_url, body));
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.ensure_open()?;
        let page = self.page.lock().unwrap();
        Ok(page
            .as_ref()
            .map(|document| document.url().to_string())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> DriverResult<String> {
        self.with_page(|page| Ok(page.title()))
    }

    async fn content(&self) -> DriverResult<String> {
        self.with_page(|page| Ok(page.html().to_string()))
    }

    async fn exists(&self, locator: &Locator) -> DriverResult<bool> {
        self.with_page(|page| page.exists(locator))
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> DriverResult<()> {
        // The document never changes after load
        if self.exists(locator).await? {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(locator.to_string()))
        }
    }

    async fn wait_for_function(&self, _script: &str, _timeout: Duration) -> DriverResult<()> {
        Err(DriverError::Unsupported("wait_for_function"))
    }

    async fn wait_for_load(&self, _state: LoadState, _timeout: Duration) -> DriverResult<()> {
        self.with_page(|_| Ok(()))
    }

    async fn element_values(
        &self,
        selector: &str,
        source: &ValueSource,
    ) -> DriverResult<Vec<String>> {
        self.with_page(|page| page.values(selector, source))
    }

    async fn links(&self, scope: Option<&str>) -> DriverResult<Vec<PageLink>> {
        self.with_page(|page| page.links(scope))
    }

    async fn click(&self, _selector: &str) -> DriverResult<()> {
        Err(DriverError::Unsupported("click"))
    }

    async fn type_text(&self, _selector: &str, _text: &str) -> DriverResult<()> {
        Err(DriverError::Unsupported("type_text"))
    }

    async fn hover(&self, selector: &str) -> DriverResult<()> {
        self.require_element(selector)
    }

    async fn select_option(&self, _selector: &str, _value: &str) -> DriverResult<()> {
        Err(DriverError::Unsupported("select_option"))
    }

    async fn scroll_into_view(&self, selector: &str) -> DriverResult<()> {
        self.require_element(selector)
    }

    async fn evaluate(&self, _script: &str) -> DriverResult<serde_json::Value> {
        Err(DriverError::Unsupported("evaluate"))
    }

    async fn move_mouse(&self, _x: f64, _y: f64, _steps: u32) -> DriverResult<()> {
        self.ensure_open()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> DriverResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.page.lock().unwrap().take();
        Ok(())
    }
}
