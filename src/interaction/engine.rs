//! Executes interaction rules against the loaded page

use crate::driver::{DriverError, Locator, PageDriver, ValueSource};
use crate::interaction::{
    ExtractOptions, InteractionRule, PageAction, PageSnapshot, PageStateCache, ValidationRule,
    WaitCondition,
};
use crate::task::Interaction;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONDITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Why one run of an interaction rule failed
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("initial condition not met: {0}")]
    ConditionNotMet(String),

    #[error("action {action} failed: {source}")]
    Action {
        action: &'static str,
        source: DriverError,
    },

    #[error("nothing extracted from {0}")]
    NothingExtracted(String),

    #[error("validation failed")]
    ValidationFailed,
}

/// Outcome of running every interaction matched for a page
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InteractionReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Runs interaction rules with retries and records page state
pub struct InteractionEngine {
    driver: Arc<dyn PageDriver>,
    cache: PageStateCache,
    retry_backoff: Duration,
}

impl InteractionEngine {
    pub fn new(driver: Arc<dyn PageDriver>, cache: PageStateCache, retry_backoff: Duration) -> Self {
        Self {
            driver,
            cache,
            retry_backoff,
        }
    }

    pub fn cache(&self) -> &PageStateCache {
        &self.cache
    }

    /// Captures the current page into the state cache
    pub async fn record_page_state(&self) {
        match PageSnapshot::capture(self.driver.as_ref()).await {
            Ok(snapshot) => self.cache.record(snapshot),
            Err(e) => tracing::warn!(error = %e, "Could not capture page state"),
        }
    }

    /// Runs every rule of every matched interaction, in order
    ///
    /// A failing rule is reported and the remaining rules still run.
    pub async fn run_interactions(&self, interactions: &[&Interaction]) -> InteractionReport {
        let mut report = InteractionReport::default();

        for interaction in interactions {
            for rule in &interaction.rules {
                let name = rule.display_name().to_string();
                if self.run_rule(rule).await {
                    report.succeeded.push(name);
                } else {
                    tracing::error!(rule = %name, "Interaction rule failed after all attempts");
                    report.failed.push(name);
                }
            }
        }

        report
    }

    /// Runs one rule, retrying it as a whole
    ///
    /// Returns false once every attempt failed.
    pub async fn run_rule(&self, rule: &InteractionRule) -> bool {
        let max_attempts = rule.max_attempts();
        let mut attempts = 0;

        while attempts < max_attempts {
            tracing::info!(
                rule = %rule.display_name(),
                attempt = attempts + 1,
                max_attempts,
                "Executing interaction rule"
            );

            match self.run_once(rule).await {
                Ok(()) => {
                    self.record_page_state().await;
                    return true;
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(rule = %rule.display_name(), attempt = attempts, error = %e, "Interaction rule failed");
                    if attempts < max_attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        false
    }

    async fn run_once(&self, rule: &InteractionRule) -> Result<(), InteractionError> {
        if let Some(condition) = &rule.condition {
            self.wait_for_condition(condition)
                .await
                .map_err(|e| InteractionError::ConditionNotMet(e.to_string()))?;
        }

        for action in &rule.actions {
            self.execute_action(action).await?;
        }

        if let Some(validation) = &rule.validation {
            if !self.validate(validation).await {
                return Err(InteractionError::ValidationFailed);
            }
        }

        if let Some(delay) = rule.after_delay {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(())
    }

    /// Waits for a rule's pre-condition
    pub async fn wait_for_condition(&self, condition: &WaitCondition) -> Result<(), DriverError> {
        let timeout = |ms: &Option<u64>| ms.map(Duration::from_millis).unwrap_or(DEFAULT_CONDITION_TIMEOUT);

        match condition {
            WaitCondition::Selector { value, timeout: ms } => {
                self.driver
                    .wait_for(&Locator::Css(value.clone()), timeout(ms))
                    .await
            }
            WaitCondition::Xpath { value, timeout: ms } => {
                self.driver
                    .wait_for(&Locator::XPath(value.clone()), timeout(ms))
                    .await
            }
            WaitCondition::Function { value, timeout: ms } => {
                self.driver.wait_for_function(value, timeout(ms)).await
            }
            WaitCondition::Network { value, timeout: ms } => {
                self.driver.wait_for_load(*value, timeout(ms)).await
            }
            WaitCondition::Timeout { value } => {
                tokio::time::sleep(Duration::from_millis(*value)).await;
                Ok(())
            }
        }
    }

    /// Executes a single action
    pub async fn execute_action(&self, action: &PageAction) -> Result<(), InteractionError> {
        let driver = self.driver.as_ref();
        let result = match action {
            PageAction::Click { target } => driver.click(target).await,
            PageAction::Type { target, value } => driver.type_text(target, value).await,
            PageAction::Scroll { target: Some(target) } => driver.scroll_into_view(target).await,
            PageAction::Scroll { target: None } => Ok(()),
            PageAction::Hover { target } => driver.hover(target).await,
            PageAction::Select { target, value } => driver.select_option(target, value).await,
            PageAction::Evaluate { value } => driver.evaluate(value).await.map(|_| ()),
            PageAction::WaitFor { target, timeout } => {
                let timeout = timeout
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_CONDITION_TIMEOUT);
                driver.wait_for(&Locator::Css(target.clone()), timeout).await
            }
            PageAction::Extract { target, options } => {
                let extracted = self.extract_content(target, options).await?;
                tracing::info!(target = %target, value = %extracted, "Extracted content");
                return Ok(());
            }
        };

        result.map_err(|source| InteractionError::Action {
            action: action.kind(),
            source,
        })
    }

    /// Reads values from the elements matching `selector`
    ///
    /// Returns an array when `options.multiple` is set, otherwise the first
    /// value. Fails when nothing matches.
    pub async fn extract_content(
        &self,
        selector: &str,
        options: &ExtractOptions,
    ) -> Result<Value, InteractionError> {
        let source = match (&options.attribute, &options.property) {
            (Some(attribute), _) => ValueSource::Attribute(attribute.clone()),
            (None, Some(property)) => ValueSource::Property(property.clone()),
            (None, None) => ValueSource::Property("textContent".to_string()),
        };

        let values = self
            .driver
            .element_values(selector, &source)
            .await
            .map_err(|source| InteractionError::Action {
                action: "extract",
                source,
            })?;

        if values.is_empty() {
            return Err(InteractionError::NothingExtracted(selector.to_string()));
        }

        if options.multiple {
            Ok(Value::Array(values.into_iter().map(Value::String).collect()))
        } else {
            Ok(Value::String(values.into_iter().next().unwrap_or_default()))
        }
    }

    /// Checks a rule's post-condition; driver errors count as invalid
    pub async fn validate(&self, validation: &ValidationRule) -> bool {
        let driver = self.driver.as_ref();
        let result = match validation {
            ValidationRule::Selector { value } => driver.exists(&Locator::Css(value.clone())).await,
            ValidationRule::Content { value } => {
                driver.content().await.map(|content| value.is_match(&content))
            }
            ValidationRule::Url { value } => driver.current_url().await.map(|url| value.is_match(&url)),
            ValidationRule::Custom { value } => driver.evaluate(value).await.map(|v| is_truthy(&v)),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Validation could not be evaluated");
            false
        })
    }
}

/// JavaScript truthiness of a JSON value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
