//! Page driver capability
//!
//! [`PageDriver`] is the seam between the crawl engine and whatever renders
//! pages. [`HttpPageDriver`] is the built-in implementation: it fetches
//! pages over HTTP and queries the static DOM.

pub mod dom;
mod http;
mod mouse;
#[cfg(test)]
pub(crate) mod testing;
mod traits;
mod xpath;

pub use http::{build_http_client, HttpPageDriver};
pub use mouse::{MouseSettings, MouseSimulator};
pub use traits::{
    DriverError, DriverResult, GotoOptions, LoadState, Locator, PageDriver, PageLink, ValueSource,
};
pub use xpath::xpath_to_css;
