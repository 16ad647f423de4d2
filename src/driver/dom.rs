//! Static DOM queries over a fetched HTML document
//!
//! `scraper::Html` is not `Send`, so the document is kept as text and parsed
//! inside each synchronous query. Async callers hold no parsed tree across
//! an await point.

use crate::driver::xpath::xpath_to_css;
use crate::driver::{DriverError, DriverResult, Locator, PageLink, ValueSource};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A loaded page: its final URL and HTML source
#[derive(Debug, Clone)]
pub struct StaticDocument {
    url: Url,
    html: String,
}

impl StaticDocument {
    pub fn new(url: Url, html: String) -> Self {
        Self { url, html }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn set_html(&mut self, html: String) {
        self.html = html;
    }

    /// Text of the `<title>` element, trimmed; empty if there is none
    pub fn title(&self) -> String {
        let document = Html::parse_document(&self.html);
        let Ok(selector) = Selector::parse("title") else {
            return String::new();
        };

        document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    pub fn exists(&self, locator: &Locator) -> DriverResult<bool> {
        let selector = parse_selector(&css_for(locator)?)?;
        let document = Html::parse_document(&self.html);
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }

    /// Reads `source` from every element matching `selector`
    pub fn values(&self, selector: &str, source: &ValueSource) -> DriverResult<Vec<String>> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);

        Ok(document
            .select(&selector)
            .map(|element| element_value(element, source, &self.url))
            .collect())
    }

    /// Collects `a[href]` and `area[href]` links, optionally inside `scope`
    pub fn links(&self, scope: Option<&str>) -> DriverResult<Vec<PageLink>> {
        let link_selector = parse_selector("a[href], area[href]")?;
        let document = Html::parse_document(&self.html);

        let elements: Vec<ElementRef<'_>> = match scope {
            Some(scope) => {
                let scope_selector = parse_selector(scope)?;
                document
                    .select(&scope_selector)
                    .flat_map(|container| container.select(&link_selector))
                    .collect()
            }
            None => document.select(&link_selector).collect(),
        };

        Ok(elements
            .into_iter()
            .filter_map(|element| element.value().attr("href"))
            .map(|href| PageLink {
                href: href.trim().to_string(),
                url: resolve_link(href, &self.url),
            })
            .collect())
    }
}

/// Converts a locator into a CSS selector string
pub fn css_for(locator: &Locator) -> DriverResult<String> {
    match locator {
        Locator::Css(selector) => Ok(selector.clone()),
        Locator::XPath(xpath) => {
            xpath_to_css(xpath).ok_or_else(|| DriverError::InvalidSelector(xpath.clone()))
        }
    }
}

fn parse_selector(selector: &str) -> DriverResult<Selector> {
    Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))
}

fn element_value(element: ElementRef<'_>, source: &ValueSource, base_url: &Url) -> String {
    let attr = |name: &str| element.value().attr(name).unwrap_or_default().to_string();

    match source {
        ValueSource::Attribute(name) => attr(name),
        ValueSource::Property(name) => match name.as_str() {
            "textContent" | "innerText" | "text" => element.text().collect(),
            "innerHTML" => element.inner_html(),
            "outerHTML" => element.html(),
            "tagName" | "nodeName" => element.value().name().to_ascii_uppercase(),
            "className" => attr("class"),
            // URL properties come back absolute, as in a browser
            "href" | "src" | "action" => element
                .value()
                .attr(name)
                .and_then(|value| base_url.join(value.trim()).ok())
                .map(String::from)
                .unwrap_or_default(),
            other => attr(other),
        },
    }
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should not be followed:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> StaticDocument {
        StaticDocument::new(
            Url::parse("https://example.com/books/index.html").unwrap(),
            html.to_string(),
        )
    }

    #[test]
    fn test_title() {
        let page = doc("<html><head><title>  Catalog </title></head></html>");
        assert_eq!(page.title(), "Catalog");
        assert_eq!(doc("<p>no title</p>").title(), "");
    }

    #[test]
    fn test_exists_css_and_xpath() {
        let page = doc(r#"<form id="challenge-form"></form>"#);

        assert!(page.exists(&Locator::Css("#challenge-form".into())).unwrap());
        assert!(page
            .exists(&Locator::XPath("//form[@id='challenge-form']".into()))
            .unwrap());
        assert!(!page.exists(&Locator::Css("[data-ray]".into())).unwrap());
    }

    #[test]
    fn test_invalid_selector() {
        let page = doc("<p></p>");
        let result = page.exists(&Locator::Css("p[".into()));
        assert!(matches!(result, Err(DriverError::InvalidSelector(_))));

        let result = page.exists(&Locator::XPath("//p[text()='x']".into()));
        assert!(matches!(result, Err(DriverError::InvalidSelector(_))));
    }

    #[test]
    fn test_property_values() {
        let page = doc(
            r#"<a class="title main" href="../item/1" data-id="7">First <b>book</b></a>
               <img src="/cover.png">"#,
        );

        let text = page
            .values("a", &ValueSource::Property("textContent".into()))
            .unwrap();
        assert_eq!(text, vec!["First book"]);

        let href = page
            .values("a", &ValueSource::Property("href".into()))
            .unwrap();
        assert_eq!(href, vec!["https://example.com/item/1"]);

        let class = page
            .values("a", &ValueSource::Property("className".into()))
            .unwrap();
        assert_eq!(class, vec!["title main"]);

        let data = page
            .values("a", &ValueSource::Property("data-id".into()))
            .unwrap();
        assert_eq!(data, vec!["7"]);

        let src = page
            .values("img", &ValueSource::Attribute("src".into()))
            .unwrap();
        assert_eq!(src, vec!["/cover.png"]);
    }

    #[test]
    fn test_links_resolved_and_scoped() {
        let page = doc(
            r##"<nav><a href="/home">Home</a></nav>
                <div id="list">
                    <a href="page2.html">Next</a>
                    <a href="#top">Top</a>
                    <a href="mailto:me@example.com">Mail</a>
                </div>"##,
        );

        let all = page.links(None).unwrap();
        assert_eq!(all.len(), 4);

        let scoped = page.links(Some("#list")).unwrap();
        assert_eq!(scoped.len(), 3);
        assert_eq!(
            scoped[0].url.as_deref(),
            Some("https://example.com/books/page2.html")
        );
        assert_eq!(
            scoped[1].url.as_deref(),
            Some("https://example.com/books/index.html#top")
        );
        assert_eq!(scoped[2].url, None);
        assert_eq!(scoped[2].href, "mailto:me@example.com");
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://example.com/a/").unwrap();
        assert_eq!(
            resolve_link("b", &base).as_deref(),
            Some("https://example.com/a/b")
        );
        assert_eq!(resolve_link("javascript:void(0)", &base), None);
        assert_eq!(resolve_link("ftp://example.com/file", &base), None);
        assert_eq!(resolve_link("  ", &base), None);
    }
}
