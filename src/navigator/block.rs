//! Block rule evaluation
//!
//! A page is blocked when any condition of the rule holds. Selector and
//! XPath conditions prefixed with `!` hold when nothing matches.

use crate::driver::{Locator, PageDriver};
use crate::task::BlockRule;

fn split_negation(condition: &str) -> (bool, &str) {
    match condition.trim().strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, condition.trim()),
    }
}

/// Evaluates `rule` against the loaded page
///
/// Returns the condition that fired, or `None` if the page is not blocked.
/// Conditions the driver cannot evaluate are logged and skipped.
pub async fn detect_block(driver: &dyn PageDriver, rule: &BlockRule) -> Option<String> {
    match driver.current_url().await {
        Ok(url) => {
            if let Some(pattern) = rule.url_patterns.iter().find(|p| p.is_match(&url)) {
                return Some(format!("url matches {}", pattern));
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not read page URL for block check"),
    }

    let conditions = rule
        .selectors
        .iter()
        .map(|s| (s, false))
        .chain(rule.xpaths.iter().map(|x| (x, true)));

    for (condition, is_xpath) in conditions {
        let (negated, target) = split_negation(condition);
        if target.is_empty() {
            continue;
        }

        let locator = if is_xpath {
            Locator::XPath(target.to_string())
        } else {
            Locator::Css(target.to_string())
        };

        match driver.exists(&locator).await {
            Ok(present) if present != negated => {
                return Some(format!("{} {}", locator, if negated { "absent" } else { "present" }));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(condition = %condition, error = %e, "Skipping block condition"),
        }
    }

    None
}
