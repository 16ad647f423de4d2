//! Scripted in-memory driver for unit tests

use crate::driver::dom::StaticDocument;
use crate::driver::{
    DriverError, DriverResult, GotoOptions, LoadState, Locator, PageDriver, PageLink, ValueSource,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// A driver serving fixed HTML per URL
///
/// Clicks can be scripted to replace the page content, `goto` can be made to
/// fail a number of times, and every input is recorded for assertions.
#[derive(Default)]
pub struct FakeDriver {
    routes: Mutex<HashMap<String, VecDeque<String>>>,
    page: Mutex<Option<StaticDocument>>,
    goto_failures: Mutex<u32>,
    gotos: Mutex<Vec<String>>,
    click_results: Mutex<HashMap<String, String>>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
    evaluations: Mutex<Vec<String>>,
    evaluate_result: Mutex<serde_json::Value>,
    function_result: Mutex<bool>,
    mouse_moves: Mutex<Vec<(f64, f64)>>,
    closed: AtomicBool,
}

impl FakeDriver {
    /// Creates a driver with `html` already loaded at `url`
    pub fn new(url: &str, html: &str) -> Self {
        let driver = Self::default();
        driver.set_page(url, html);
        driver
    }

    /// Serves `html` for `url`; repeated calls queue successive responses
    pub fn with_route(self, url: &str, html: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(html.to_string());
        self
    }

    /// Makes the next `count` navigations fail
    pub fn fail_next_gotos(self, count: u32) -> Self {
        *self.goto_failures.lock().unwrap() = count;
        self
    }

    /// Replaces the page content when `selector` is clicked
    pub fn on_click(self, selector: &str, html: &str) -> Self {
        self.click_results
            .lock()
            .unwrap()
            .insert(selector.to_string(), html.to_string());
        self
    }

    pub fn with_evaluate_result(self, value: serde_json::Value) -> Self {
        *self.evaluate_result.lock().unwrap() = value;
        self
    }

    pub fn with_function_result(self, result: bool) -> Self {
        *self.function_result.lock().unwrap() = result;
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        let url = Url::parse(url).unwrap();
        *self.page.lock().unwrap() = Some(StaticDocument::new(url, html.to_string()));
    }

    pub fn gotos(&self) -> Vec<String> {
        self.gotos.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().unwrap().clone()
    }

    pub fn evaluations(&self) -> Vec<String> {
        self.evaluations.lock().unwrap().clone()
    }

    pub fn mouse_moves(&self) -> Vec<(f64, f64)> {
        self.mouse_moves.lock().unwrap().clone()
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::PageClosed)
        } else {
            Ok(())
        }
    }

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

    fn require(&self, selector: &str) -> DriverResult<()> {
        if self.with_page(|page| page.exists(&Locator::Css(selector.to_string())))? {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str, _options: &GotoOptions) -> DriverResult<()> {
        self.ensure_open()?;
        self.gotos.lock().unwrap().push(url.to_string());

        {
            let mut failures = self.goto_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    message: "scripted failure".to_string(),
                });
            }
        }

        let html = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                // The last queued response keeps being served
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match html {
            Some(html) => {
                self.set_page(url, &html);
                Ok(())
            }
            None => Err(DriverError::Navigation {
                url: url.to_string(),
                message: "no route".to_string(),
            }),
        }
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.with_page(|page| Ok(page.url().to_string()))
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

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<()> {
        if self.exists(locator).await? {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }

    async fn wait_for_function(&self, _script: &str, timeout: Duration) -> DriverResult<()> {
        if *self.function_result.lock().unwrap() {
            Ok(())
        } else {
            Err(DriverError::Timeout(timeout))
        }
    }

    async fn wait_for_load(&self, _state: LoadState, _timeout: Duration) -> DriverResult<()> {
        self.ensure_open()
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

    async fn click(&self, selector: &str) -> DriverResult<()> {
        self.require(selector)?;
        self.clicks.lock().unwrap().push(selector.to_string());

        let replacement = self.click_results.lock().unwrap().get(selector).cloned();
        if let Some(html) = replacement {
            let mut page = self.page.lock().unwrap();
            if let Some(document) = page.as_mut() {
                document.set_html(html);
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        self.require(selector)?;
        self.typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> DriverResult<()> {
        self.require(selector)
    }

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()> {
        self.type_text(selector, value).await
    }

    async fn scroll_into_view(&self, selector: &str) -> DriverResult<()> {
        self.require(selector)
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        self.ensure_open()?;
        self.evaluations.lock().unwrap().push(script.to_string());
        Ok(self.evaluate_result.lock().unwrap().clone())
    }

    async fn move_mouse(&self, x: f64, y: f64, _steps: u32) -> DriverResult<()> {
        self.ensure_open()?;
        self.mouse_moves.lock().unwrap().push((x, y));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> DriverResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
