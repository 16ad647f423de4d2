//! Page driver trait and shared types
//!
//! The crawler never talks to a browser directly. Everything it needs from a
//! page (loading, DOM queries, input) goes through [`PageDriver`].

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a page driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Operation not supported by this driver: {0}")]
    Unsupported(&'static str),

    #[error("Page is closed")]
    PageClosed,

    #[error("Script error: {0}")]
    Script(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LoadState {
    /// No network connections for 500 ms
    #[serde(rename = "networkidle0")]
    NetworkIdle0,

    /// At most two network connections for 500 ms
    #[default]
    #[serde(rename = "networkidle2")]
    NetworkIdle2,

    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkIdle0 => "networkidle0",
            Self::NetworkIdle2 => "networkidle2",
            Self::DomContentLoaded => "domcontentloaded",
        };
        f.write_str(name)
    }
}

/// Options for a single page load
#[derive(Debug, Clone)]
pub struct GotoOptions {
    pub wait_until: LoadState,
    pub timeout: Duration,
}

impl Default for GotoOptions {
    fn default() -> Self {
        Self {
            wait_until: LoadState::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Addresses elements on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css={}", selector),
            Self::XPath(xpath) => write!(f, "xpath={}", xpath),
        }
    }
}

/// What to read from each matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// An element property such as `textContent` or `href`; names that are
    /// not element properties are read as attributes
    Property(String),

    /// An HTML attribute, read verbatim
    Attribute(String),
}

/// A link found on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// The `href` attribute as written
    pub href: String,

    /// Absolute http(s) URL, if the href resolves to one
    pub url: Option<String>,
}

/// Browser automation capability
///
/// Implementations must be shareable between the crawl loop and background
/// tasks such as the mouse simulator.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url` and waits for the requested load state
    async fn goto(&self, url: &str, options: &GotoOptions) -> DriverResult<()>;

    /// URL of the loaded page
    async fn current_url(&self) -> DriverResult<String>;

    async fn title(&self) -> DriverResult<String>;

    /// Serialized HTML of the loaded page
    async fn content(&self) -> DriverResult<String>;

    /// Returns true if at least one element matches
    async fn exists(&self, locator: &Locator) -> DriverResult<bool>;

    /// Waits until an element matches
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<()>;

    /// Waits until a page-context predicate returns a truthy value
    async fn wait_for_function(&self, script: &str, timeout: Duration) -> DriverResult<()>;

    /// Waits for the next navigation to reach `state`
    async fn wait_for_load(&self, state: LoadState, timeout: Duration) -> DriverResult<()>;

    /// Reads a value from every element matching `selector`, in document order
    async fn element_values(&self, selector: &str, source: &ValueSource)
        -> DriverResult<Vec<String>>;

    /// Collects links, optionally limited to elements inside `scope`
    async fn links(&self, scope: Option<&str>) -> DriverResult<Vec<PageLink>>;

    async fn click(&self, selector: &str) -> DriverResult<()>;

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()>;

    async fn hover(&self, selector: &str) -> DriverResult<()>;

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()>;

    async fn scroll_into_view(&self, selector: &str) -> DriverResult<()>;

    /// Evaluates a script in the page context
    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Moves the mouse to (`x`, `y`) in `steps` intermediate moves
    async fn move_mouse(&self, x: f64, y: f64, steps: u32) -> DriverResult<()>;

    fn is_closed(&self) -> bool;

    /// Closes the page; later calls fail with [`DriverError::PageClosed`]
    async fn close(&self) -> DriverResult<()>;
}
