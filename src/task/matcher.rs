//! Rule selection for a single URL
//!
//! All rules of a kind whose pattern matches are returned, but only the
//! first matching crawl rule supplies wait and block options and only the
//! first matching metadata rule is extracted. Link destinations apply from
//! every matching crawl rule.

use crate::task::{
    BlockRule, CrawlRule, Interaction, MetadataExtractionRule, TaskConfig, WaitForOptions,
};

/// Returns every crawl rule whose `from` pattern matches `url`
pub fn match_crawl_rules<'a>(url: &str, rules: &'a [CrawlRule]) -> Vec<&'a CrawlRule> {
    rules.iter().filter(|rule| rule.from.is_match(url)).collect()
}

/// Returns every metadata rule whose `url_pattern` matches `url`
pub fn match_metadata_rules<'a>(
    url: &str,
    rules: &'a [MetadataExtractionRule],
) -> Vec<&'a MetadataExtractionRule> {
    rules
        .iter()
        .filter(|rule| rule.url_pattern.is_match(url))
        .collect()
}

/// Returns every interaction set whose `url_pattern` matches `url`
pub fn match_interactions<'a>(url: &str, interactions: &'a [Interaction]) -> Vec<&'a Interaction> {
    interactions
        .iter()
        .filter(|interaction| interaction.url_pattern.is_match(url))
        .collect()
}

/// The rules that apply to one URL
#[derive(Debug, Default)]
pub struct RuleSelection<'a> {
    pub crawl_rules: Vec<&'a CrawlRule>,
    pub metadata_rules: Vec<&'a MetadataExtractionRule>,
    pub interactions: Vec<&'a Interaction>,
}

impl<'a> RuleSelection<'a> {
    /// Load options of the first matching crawl rule
    pub fn wait_for(&self) -> Option<&'a WaitForOptions> {
        self.crawl_rules.first().and_then(|rule| rule.wait_for.as_ref())
    }

    /// Block rule of the first matching crawl rule
    pub fn block_rule(&self) -> Option<&'a BlockRule> {
        self.crawl_rules
            .first()
            .and_then(|rule| rule.block_rule.as_ref())
    }

    /// The metadata rule to extract with
    pub fn metadata_rule(&self) -> Option<&'a MetadataExtractionRule> {
        self.metadata_rules.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.crawl_rules.is_empty() && self.metadata_rules.is_empty() && self.interactions.is_empty()
    }
}

impl TaskConfig {
    /// Selects the rules that apply to `url`
    pub fn select(&self, url: &str) -> RuleSelection<'_> {
        RuleSelection {
            crawl_rules: match_crawl_rules(url, &self.crawl_rules),
            metadata_rules: match_metadata_rules(url, &self.metadata_extraction),
            interactions: match_interactions(url, &self.interaction_rules),
        }
    }
}
