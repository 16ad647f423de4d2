//! Anti-bot challenge detection and mitigation

use crate::driver::{Locator, PageDriver};
use std::time::{Duration, Instant};

/// Elements that identify a challenge page
const CHALLENGE_MARKERS: &[&str] = &[
    "#challenge-form",
    "[data-ray]",
    r#"iframe[src*="challenges.cloudflare.com"]"#,
];

/// Elements that mean a challenge is still waiting for the client
const PENDING_MARKERS: &[&str] = &[
    "#challenge-stage",
    r#"[type="submit"]"#,
    ".ray-id button",
    ".challenge-button",
    r#"iframe[src*="challenges.cloudflare.com"]"#,
];

/// Elements that must be gone once the challenge is passed
const CLEARED_MARKERS: &[&str] = &[
    "#challenge-stage",
    "[data-ray]",
    r#"iframe[src*="challenges.cloudflare.com"]"#,
];

const CONTINUE_BUTTON: &str = r#"[type="submit"], .ray-id button, .challenge-button"#;

/// Limits for a challenge mitigation
#[derive(Debug, Clone)]
pub struct ChallengeSettings {
    /// Mitigation passes before giving up
    pub attempts: u32,
    /// How long to wait for the markers to disappear in one pass
    pub timeout: Duration,
    /// Pause before each pass and between failed passes
    pub settle: Duration,
    pub poll_interval: Duration,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Detects and tries to clear challenge interstitials
#[derive(Debug, Clone, Default)]
pub struct ChallengeHandler {
    settings: ChallengeSettings,
}

impl ChallengeHandler {
    pub fn new(settings: ChallengeSettings) -> Self {
        Self { settings }
    }

    /// Returns true if the loaded page looks like a challenge
    ///
    /// Driver errors count as "no challenge".
    pub async fn detect(&self, driver: &dyn PageDriver) -> bool {
        match any_present(driver, CHALLENGE_MARKERS).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Challenge detection failed");
                return false;
            }
        }

        match driver.title().await {
            Ok(title) => {
                title.to_lowercase().contains("cloudflare") || title.contains("Just a moment...")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Challenge detection failed");
                false
            }
        }
    }

    /// Runs mitigation passes until the challenge is gone
    ///
    /// Returns false once every pass has failed.
    pub async fn resolve(&self, driver: &dyn PageDriver) -> bool {
        let mut attempts = 0;

        while attempts < self.settings.attempts {
            tracing::info!(attempt = attempts + 1, "Attempting to pass challenge");

            match self.pass(driver).await {
                Ok(()) => {
                    tracing::info!("Challenge passed");
                    return true;
                }
                Err(message) => {
                    attempts += 1;
                    tracing::warn!(attempt = attempts, error = %message, "Challenge attempt failed");
                    if attempts < self.settings.attempts {
                        tokio::time::sleep(self.settings.settle).await;
                    }
                }
            }
        }

        false
    }

    async fn pass(&self, driver: &dyn PageDriver) -> Result<(), String> {
        tokio::time::sleep(self.settings.settle).await;

        if !any_present(driver, PENDING_MARKERS)
            .await
            .map_err(|e| e.to_string())?
        {
            return Ok(());
        }

        let button = Locator::Css(CONTINUE_BUTTON.to_string());
        if driver.exists(&button).await.map_err(|e| e.to_string())? {
            driver
                .click(CONTINUE_BUTTON)
                .await
                .map_err(|e| e.to_string())?;
        }

        let started = Instant::now();
        loop {
            if !any_present(driver, CLEARED_MARKERS)
                .await
                .map_err(|e| e.to_string())?
            {
                return Ok(());
            }
            if started.elapsed() >= self.settings.timeout {
                return Err(format!(
                    "challenge still present after {:?}",
                    self.settings.timeout
                ));
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

async fn any_present(driver: &dyn PageDriver, selectors: &[&str]) -> crate::driver::DriverResult<bool> {
    for selector in selectors {
        if driver.exists(&Locator::Css(selector.to_string())).await? {
            return Ok(true);
        }
    }
    Ok(false)
}
