//! Link selection and rewriting
//!
//! Turns the links found on a page into frontier candidates: scope by the
//! destination's selector, dedupe, rewrite through the task's link
//! transformations, then keep what matches the destination pattern.

use crate::driver::{DriverResult, PageDriver, PageLink};
use crate::task::{CrawlRule, LinkTransformationRule};
use std::collections::HashSet;
use url::Url;

/// Applies every matching transformation rule to `link`, in order
///
/// Links no rule matches are returned unchanged.
///
/// # Examples
///
/// ```
/// use rulecrawl::task::{transform_link, LinkTransformationRule, Pattern};
///
/// let rules = vec![LinkTransformationRule {
///     pattern: Pattern::new(r"^/book/(\d+)$").unwrap(),
///     transform: "/items/$1".to_string(),
///     base_url: Some("https://x.test".to_string()),
/// }];
///
/// assert_eq!(transform_link("/book/42", &rules), "https://x.test/items/42");
/// assert_eq!(transform_link("/about", &rules), "/about");
/// ```
pub fn transform_link(link: &str, rules: &[LinkTransformationRule]) -> String {
    apply_transforms(link, rules).unwrap_or_else(|| link.to_string())
}

/// Returns the rewritten link, or `None` when no rule matched
fn apply_transforms(link: &str, rules: &[LinkTransformationRule]) -> Option<String> {
    let mut current = link.to_string();
    let mut matched = false;

    for rule in rules {
        if !rule.pattern.is_match(&current) {
            continue;
        }
        matched = true;

        let template = to_regex_template(&rule.transform);
        let replaced = rule
            .pattern
            .regex()
            .replace(&current, template.as_str())
            .into_owned();

        current = match rule.base_url.as_deref() {
            Some(base) if Url::parse(&replaced).is_err() => join_base(base, &replaced),
            _ => replaced,
        };
    }

    matched.then_some(current)
}

/// Converts a `$1`-style template into the `${1}` form `regex` expects
///
/// `$&` refers to the whole match and `$$` is a literal dollar sign.
fn to_regex_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{}}}", digits));
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            _ => out.push_str("$$"),
        }
    }

    out
}

fn join_base(base: &str, relative: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(relative))
        .map(String::from)
        .unwrap_or_else(|_| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                relative.trim_start_matches('/')
            )
        })
}

fn strip_fragment(link: &str) -> &str {
    link.split('#').next().unwrap_or(link)
}

/// Turns a page link into an absolute candidate URL
fn resolve_candidate(
    link: &PageLink,
    page_url: &str,
    transforms: &[LinkTransformationRule],
) -> Option<String> {
    // Transformations are written against the raw href first, then the
    // resolved URL
    let rewritten = apply_transforms(&link.href, transforms).or_else(|| {
        link.url
            .as_deref()
            .and_then(|resolved| apply_transforms(resolved, transforms))
    });

    match rewritten {
        Some(candidate) => match Url::parse(&candidate) {
            Ok(absolute) => Some(absolute.to_string()),
            Err(_) => Url::parse(page_url)
                .and_then(|base| base.join(&candidate))
                .ok()
                .map(String::from),
        },
        None => link.url.clone(),
    }
}

/// Collects the links on the current page that the crawl rules accept
///
/// # Arguments
///
/// * `driver` - Page driver holding the loaded page
/// * `page_url` - URL of the loaded page
/// * `rules` - Crawl rules matched for `page_url`
/// * `transforms` - The task's link transformation rules
///
/// # Returns
///
/// Absolute URLs in discovery order, without duplicates
pub async fn select_links(
    driver: &dyn PageDriver,
    page_url: &str,
    rules: &[&CrawlRule],
    transforms: &[LinkTransformationRule],
) -> DriverResult<Vec<String>> {
    let current = strip_fragment(page_url);
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for rule in rules {
        for destination in &rule.to {
            let links = match driver.links(destination.selector.as_deref()).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(
                        url = %page_url,
                        pattern = %destination.pattern,
                        error = %e,
                        "Skipping link destination"
                    );
                    continue;
                }
            };
            let mut unique_hrefs = HashSet::new();

            for link in &links {
                if !unique_hrefs.insert(link.href.as_str()) {
                    continue;
                }

                let Some(candidate) = resolve_candidate(link, page_url, transforms) else {
                    continue;
                };

                if destination.ignore_inner_links && strip_fragment(&candidate) == current {
                    continue;
                }

                if !destination.pattern.is_match(&candidate) {
                    continue;
                }

                if seen.insert(candidate.clone()) {
                    selected.push(candidate);
                }
            }
        }
    }

    tracing::debug!(url = %page_url, count = selected.len(), "Selected links");
    Ok(selected)
}
