use crate::driver::LoadState;
use crate::interaction::InteractionRule;
use crate::task::Pattern;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A complete task definition, loaded once per crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub crawl_rules: Vec<CrawlRule>,

    #[serde(default)]
    pub metadata_extraction: Vec<MetadataExtractionRule>,

    #[serde(default)]
    pub links_transformation: Vec<LinkTransformationRule>,

    #[serde(default)]
    pub interaction_rules: Vec<Interaction>,
}

/// Which links to follow from pages matching `from`
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRule {
    pub from: Pattern,

    #[serde(default)]
    pub to: Vec<LinkRuleTo>,

    /// How to load pages matching `from`
    #[serde(rename = "waitFor", default)]
    pub wait_for: Option<WaitForOptions>,

    #[serde(rename = "blockRule", default)]
    pub block_rule: Option<BlockRule>,
}

/// A destination filter for discovered links
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRuleTo {
    pub pattern: Pattern,

    /// CSS scope to collect links from; the whole document when absent
    #[serde(default)]
    pub selector: Option<String>,

    /// Skip links pointing back at the page they were found on
    #[serde(rename = "ignoreInnerLinks", default)]
    pub ignore_inner_links: bool,
}

/// Page load options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaitForOptions {
    /// Selector that must be present after the load
    #[serde(default)]
    pub selector: Option<String>,

    /// Timeout in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub load: Option<LoadState>,
}

/// Conditions that reveal an anti-bot block on a loaded page
///
/// Selectors and XPaths may be prefixed with `!` to trigger when the element
/// is absent instead of present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockRule {
    #[serde(default)]
    pub url_patterns: Vec<Pattern>,

    #[serde(default)]
    pub selectors: Vec<String>,

    #[serde(default)]
    pub xpaths: Vec<String>,
}

impl BlockRule {
    pub fn is_empty(&self) -> bool {
        self.url_patterns.is_empty() && self.selectors.is_empty() && self.xpaths.is_empty()
    }
}

/// One selector or an ordered list of fallbacks
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SelectorList {
    One(String),
    Many(Vec<String>),
}

impl SelectorList {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(selector) => std::slice::from_ref(selector),
            Self::Many(selectors) => selectors,
        }
    }
}

/// How to read a single metadata field
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataField {
    pub selector: SelectorList,

    /// Element property to read, or an attribute name if it isn't a property
    #[serde(default = "default_property")]
    pub property: String,

    /// Join the values of every match instead of taking the first
    #[serde(rename = "collectAll", default)]
    pub collect_all: bool,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_property() -> String {
    "textContent".to_string()
}

fn default_delimiter() -> String {
    " ".to_string()
}

/// Metadata to extract from pages matching `url_pattern`
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataExtractionRule {
    pub url_pattern: Pattern,

    #[serde(default)]
    pub fields: BTreeMap<String, MetadataField>,

    /// External extraction program; takes precedence over `fields`
    ///
    /// Relative paths are resolved against the task file's directory when
    /// the task is loaded.
    #[serde(default)]
    pub js_extraction_path: Option<PathBuf>,
}

/// Regex rewrite applied to discovered links
#[derive(Debug, Clone, Deserialize)]
pub struct LinkTransformationRule {
    pub pattern: Pattern,

    /// Replacement template; `$1`, `$2`, ... refer to capture groups
    pub transform: String,

    /// Prefix for results that are still relative after the rewrite
    #[serde(rename = "baseUrl", default)]
    pub base_url: Option<String>,
}

/// Interaction rules run on pages matching `url_pattern`
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub url_pattern: Pattern,

    #[serde(default)]
    pub rules: Vec<InteractionRule>,
}
