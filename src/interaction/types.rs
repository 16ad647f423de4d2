use crate::driver::LoadState;
use crate::task::Pattern;
use serde::Deserialize;

/// A named sequence of page actions, retried as a whole
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionRule {
    #[serde(default)]
    pub name: Option<String>,

    /// Must hold before the actions run
    #[serde(default)]
    pub condition: Option<WaitCondition>,

    pub actions: Vec<PageAction>,

    /// Must hold after the actions ran
    #[serde(default)]
    pub validation: Option<ValidationRule>,

    /// Total attempts, 3 when unset
    #[serde(default)]
    pub retries: Option<u32>,

    /// Pause after a successful run, in milliseconds
    #[serde(rename = "afterDelay", default)]
    pub after_delay: Option<u64>,
}

impl InteractionRule {
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries
            .filter(|&n| n > 0)
            .unwrap_or(Self::DEFAULT_ATTEMPTS)
    }
}

/// Pre-condition of an interaction rule
///
/// Timeouts are in milliseconds and default to 30 seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WaitCondition {
    Selector {
        value: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    Xpath {
        value: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    /// Page-context predicate
    Function {
        value: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    Network {
        value: LoadState,
        #[serde(default)]
        timeout: Option<u64>,
    },
    /// Fixed delay in milliseconds
    Timeout { value: u64 },
}

/// A single step of an interaction rule
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageAction {
    Click {
        target: String,
    },
    Type {
        target: String,
        value: String,
    },
    /// Scrolls the target into view
    Scroll {
        #[serde(default)]
        target: Option<String>,
    },
    Hover {
        target: String,
    },
    Select {
        target: String,
        value: String,
    },
    Evaluate {
        value: String,
    },
    WaitFor {
        target: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    Extract {
        target: String,
        #[serde(default)]
        options: ExtractOptions,
    },
}

impl PageAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Scroll { .. } => "scroll",
            Self::Hover { .. } => "hover",
            Self::Select { .. } => "select",
            Self::Evaluate { .. } => "evaluate",
            Self::WaitFor { .. } => "waitFor",
            Self::Extract { .. } => "extract",
        }
    }
}

/// What an `extract` action reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractOptions {
    #[serde(default)]
    pub attribute: Option<String>,

    #[serde(default)]
    pub property: Option<String>,

    /// Return every match instead of the first
    #[serde(default)]
    pub multiple: bool,
}

/// Post-condition of an interaction rule
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidationRule {
    Selector { value: String },
    Content { value: Pattern },
    Url { value: Pattern },
    /// Page-context predicate; truthy means valid
    Custom { value: String },
}
