//! Page navigation with retries, challenge handling and IP rotation
//!
//! # Attempt flow
//!
//! 1. Load the URL with the rule's wait condition and timeout, then wait for
//!    the rule's selector if one is given.
//! 2. If challenge handling is on and the page is a challenge, try to pass
//!    it. A challenge that cannot be passed fails the attempt.
//! 3. If a rotator and a block rule are present and the rule fires, rotate
//!    the IP and repeat the same attempt. Rotations do not use up attempts
//!    but are capped per navigation.
//!
//! A failed attempt is retried after a fixed backoff. Running out of
//! attempts is reported as [`NavigationOutcome::Failed`], never as an error.

mod block;
mod challenge;
mod tor;

pub use block::detect_block;
pub use challenge::{ChallengeHandler, ChallengeSettings};
pub use tor::{IpRotator, TorController, TorError, TorSettings};

use crate::driver::{DriverError, GotoOptions, Locator, PageDriver};
use crate::task::{BlockRule, WaitForOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a single navigation attempt failed
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("challenge not passed at {0}")]
    Challenge(String),

    #[error("still blocked after {rotations} IP rotations: {reason}")]
    Blocked { rotations: u32, reason: String },
}

/// Retry and anti-block limits
#[derive(Debug, Clone)]
pub struct NavigationSettings {
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Page load timeout when the rule does not set one
    pub timeout: Duration,
    pub handle_challenges: bool,
    pub challenge: ChallengeSettings,
    pub max_ip_rotations: u32,
    /// Pause before each rotation so Tor has time to build a circuit
    pub rotation_cooldown: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(3),
            timeout: Duration::from_secs(60),
            handle_challenges: true,
            challenge: ChallengeSettings::default(),
            max_ip_rotations: 5,
            rotation_cooldown: Duration::from_secs(15),
        }
    }
}

/// Result of [`Navigator::navigate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded { attempts: u32, rotations: u32 },
    Failed { attempts: u32, last_error: String },
}

impl NavigationOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Loads pages through a [`PageDriver`]
pub struct Navigator {
    driver: Arc<dyn PageDriver>,
    settings: NavigationSettings,
    challenges: ChallengeHandler,
    rotator: Option<Arc<dyn IpRotator>>,
}

impl Navigator {
    pub fn new(driver: Arc<dyn PageDriver>, settings: NavigationSettings) -> Self {
        let challenges = ChallengeHandler::new(settings.challenge.clone());
        Self {
            driver,
            settings,
            challenges,
            rotator: None,
        }
    }

    /// Enables block detection with IP rotation
    pub fn with_rotator(mut self, rotator: Arc<dyn IpRotator>) -> Self {
        self.rotator = Some(rotator);
        self
    }

    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    /// Loads `url`, retrying until it succeeds or attempts run out
    ///
    /// # Arguments
    ///
    /// * `url` - Page to load
    /// * `wait` - Load options of the matching crawl rule
    /// * `block_rule` - Block conditions of the matching crawl rule
    pub async fn navigate(
        &self,
        url: &str,
        wait: Option<&WaitForOptions>,
        block_rule: Option<&BlockRule>,
    ) -> NavigationOutcome {
        let max_retries = self.settings.max_retries.max(1);
        let mut attempts = 0;
        let mut rotations = 0;
        let mut last_error = String::new();

        while attempts < max_retries {
            let result: Result<(), AttemptError> = match self.attempt(url, wait).await {
                Ok(()) => match self.check_block(block_rule).await {
                    None => {
                        tracing::info!(url = %url, attempts = attempts + 1, rotations, "Page loaded");
                        return NavigationOutcome::Loaded {
                            attempts: attempts + 1,
                            rotations,
                        };
                    }
                    Some(reason) if rotations < self.settings.max_ip_rotations => {
                        rotations += 1;
                        tracing::warn!(url = %url, reason = %reason, rotation = rotations, "Page blocked, rotating IP");
                        self.rotate().await;
                        continue;
                    }
                    Some(reason) => Err(AttemptError::Blocked { rotations, reason }),
                },
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                attempts += 1;
                last_error = e.to_string();
                tracing::warn!(
                    url = %url,
                    attempt = attempts,
                    max_retries,
                    error = %e,
                    "Navigation attempt failed"
                );
                if attempts < max_retries {
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
            }
        }

        tracing::error!(url = %url, attempts, error = %last_error, "Navigation failed");
        NavigationOutcome::Failed {
            attempts,
            last_error,
        }
    }

    async fn attempt(&self, url: &str, wait: Option<&WaitForOptions>) -> Result<(), AttemptError> {
        let timeout = wait
            .and_then(|w| w.timeout)
            .map(Duration::from_millis)
            .unwrap_or(self.settings.timeout);
        let options = GotoOptions {
            wait_until: wait.and_then(|w| w.load).unwrap_or_default(),
            timeout,
        };

        self.driver.goto(url, &options).await?;

        if let Some(selector) = wait.and_then(|w| w.selector.as_deref()) {
            self.driver
                .wait_for(&Locator::Css(selector.to_string()), timeout)
                .await?;
        }

        if self.settings.handle_challenges && self.challenges.detect(self.driver.as_ref()).await {
            tracing::info!(url = %url, "Challenge detected");
            if !self.challenges.resolve(self.driver.as_ref()).await {
                return Err(AttemptError::Challenge(url.to_string()));
            }
        }

        Ok(())
    }

    async fn check_block(&self, block_rule: Option<&BlockRule>) -> Option<String> {
        match (&self.rotator, block_rule) {
            (Some(_), Some(rule)) if !rule.is_empty() => {
                detect_block(self.driver.as_ref(), rule).await
            }
            _ => None,
        }
    }

    async fn rotate(&self) {
        let Some(rotator) = &self.rotator else {
            return;
        };

        tokio::time::sleep(self.settings.rotation_cooldown).await;
        if let Err(e) = rotator.rotate().await {
            tracing::error!(error = %e, "IP rotation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FakeDriver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingRotator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl IpRotator for CountingRotator {
        async fn rotate(&self) -> Result<(), TorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn quick_settings() -> NavigationSettings {
        NavigationSettings {
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
            handle_challenges: true,
            challenge: ChallengeSettings {
                attempts: 1,
                timeout: Duration::from_millis(5),
                settle: Duration::from_millis(1),
                poll_interval: Duration::from_millis(1),
            },
            max_ip_rotations: 2,
            rotation_cooldown: Duration::from_millis(1),
        }
    }

    const URL: &str = "https://shop.test/book/1";

    #[tokio::test]
    async fn test_loads_first_try() {
        let driver = Arc::new(FakeDriver::default().with_route(URL, "<h1>Book</h1>"));
        let navigator = Navigator::new(driver.clone(), quick_settings());

        let outcome = navigator.navigate(URL, None, None).await;

        assert_eq!(
            outcome,
            NavigationOutcome::Loaded {
                attempts: 1,
                rotations: 0
            }
        );
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let driver = Arc::new(
            FakeDriver::default()
                .with_route(URL, "<h1>Book</h1>")
                .fail_next_gotos(2),
        );
        let navigator = Navigator::new(driver.clone(), quick_settings());

        let outcome = navigator.navigate(URL, None, None).await;

        assert_eq!(
            outcome,
            NavigationOutcome::Loaded {
                attempts: 3,
                rotations: 0
            }
        );
        assert_eq!(driver.gotos().len(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_failed() {
        let driver = Arc::new(
            FakeDriver::default()
                .with_route(URL, "<h1>Book</h1>")
                .fail_next_gotos(10),
        );
        let navigator = Navigator::new(driver.clone(), quick_settings());

        let outcome = navigator.navigate(URL, None, None).await;

        match outcome {
            NavigationOutcome::Failed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("scripted failure"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_wait_selector_fails_attempt() {
        let driver = Arc::new(FakeDriver::default().with_route(URL, "<p>loading</p>"));
        let navigator = Navigator::new(driver.clone(), quick_settings());
        let wait = WaitForOptions {
            selector: Some("h1".to_string()),
            timeout: Some(10),
            load: None,
        };

        let outcome = navigator.navigate(URL, Some(&wait), None).await;

        assert!(!outcome.is_loaded());
        assert_eq!(driver.gotos().len(), 3);
    }

    #[tokio::test]
    async fn test_unpassable_challenge_fails_attempt() {
        let driver = Arc::new(FakeDriver::default().with_route(
            URL,
            r#"<div id="challenge-stage" data-ray="1"><input type="submit"></div>"#,
        ));
        let navigator = Navigator::new(driver.clone(), quick_settings());

        let outcome = navigator.navigate(URL, None, None).await;

        match outcome {
            NavigationOutcome::Failed { last_error, .. } => {
                assert!(last_error.contains("challenge"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_challenges_ignored_when_disabled() {
        let driver = Arc::new(
            FakeDriver::default().with_route(URL, r#"<form id="challenge-form"></form>"#),
        );
        let settings = NavigationSettings {
            handle_challenges: false,
            ..quick_settings()
        };
        let navigator = Navigator::new(driver, settings);

        assert!(navigator.navigate(URL, None, None).await.is_loaded());
    }

    #[tokio::test]
    async fn test_block_rotates_without_using_attempts() {
        let driver = Arc::new(
            FakeDriver::default()
                .with_route(URL, r#"<div class="blocked"></div>"#)
                .with_route(URL, "<h1>Book</h1>"),
        );
        let rotator = Arc::new(CountingRotator::default());
        let navigator =
            Navigator::new(driver.clone(), quick_settings()).with_rotator(rotator.clone());
        let rule: BlockRule = serde_json::from_str(r#"{ "selectors": [".blocked"] }"#).unwrap();

        let outcome = navigator.navigate(URL, None, Some(&rule)).await;

        assert_eq!(
            outcome,
            NavigationOutcome::Loaded {
                attempts: 1,
                rotations: 1
            }
        );
        assert_eq!(rotator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rotations_are_capped() {
        let driver = Arc::new(FakeDriver::default().with_route(URL, r#"<div class="blocked"></div>"#));
        let rotator = Arc::new(CountingRotator::default());
        let navigator =
            Navigator::new(driver.clone(), quick_settings()).with_rotator(rotator.clone());
        let rule: BlockRule = serde_json::from_str(r#"{ "selectors": [".blocked"] }"#).unwrap();

        let outcome = navigator.navigate(URL, None, Some(&rule)).await;

        match outcome {
            NavigationOutcome::Failed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("still blocked"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(rotator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_block_rule_ignored_without_rotator() {
        let driver = Arc::new(FakeDriver::default().with_route(URL, r#"<div class="blocked"></div>"#));
        let navigator = Navigator::new(driver, quick_settings());
        let rule: BlockRule = serde_json::from_str(r#"{ "selectors": [".blocked"] }"#).unwrap();

        assert!(navigator.navigate(URL, None, Some(&rule)).await.is_loaded());
    }
}
