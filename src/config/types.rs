use crate::driver::MouseSettings;
use crate::interaction::DEFAULT_CACHE_CAPACITY;
use crate::navigator::{ChallengeSettings, NavigationSettings, TorSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Run settings for rulecrawl
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub navigation: NavigationConfig,
    pub frontier: FrontierConfig,
    pub interaction: InteractionConfig,
    pub tor: TorConfig,
    pub mouse: MouseConfig,
    pub sink: SinkConfig,
    pub driver: DriverConfig,
}

/// Page loading, retries and challenge handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NavigationConfig {
    /// Load attempts per URL
    pub max_retries: u32,

    /// Pause between failed attempts (milliseconds)
    pub retry_backoff_ms: u64,

    /// Page load timeout when the crawl rule sets none (milliseconds)
    pub timeout_ms: u64,

    pub handle_challenges: bool,

    /// Mitigation passes per challenge page
    pub challenge_attempts: u32,

    /// How long one mitigation pass may wait (milliseconds)
    pub challenge_timeout_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 3000,
            timeout_ms: 60_000,
            handle_challenges: true,
            challenge_attempts: 3,
            challenge_timeout_ms: 30_000,
        }
    }
}

/// Frontier storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierBackend {
    Sqlite,
    Memory,
}

/// URL frontier settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FrontierConfig {
    pub backend: FrontierBackend,

    /// How long a claimed URL may stay in processing before it is reclaimed
    pub stall_timeout_secs: u64,

    /// Failures after which a URL is given up
    pub max_retries: u32,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            backend: FrontierBackend::Sqlite,
            stall_timeout_secs: 300,
            max_retries: 3,
        }
    }
}

impl FrontierConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InteractionConfig {
    /// Pause between attempts of a failing interaction rule (milliseconds)
    pub retry_backoff_ms: u64,

    /// Page snapshots kept in memory; the oldest are evicted first
    pub cache_capacity: usize,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 2000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl InteractionConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Tor control port and proxy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TorConfig {
    pub control_host: String,
    pub control_port: u16,
    pub control_password: String,

    /// HTTP proxy that forwards to Tor
    pub proxy: String,

    /// Anti-bot rotations allowed per URL
    pub max_ip_rotations: u32,

    /// Pause before each rotation (milliseconds)
    pub rotation_cooldown_ms: u64,
}

impl Default for TorConfig {
    fn default() -> Self {
        let tor = TorSettings::default();
        Self {
            control_host: tor.control_host,
            control_port: tor.control_port,
            control_password: tor.control_password,
            proxy: tor.proxy,
            max_ip_rotations: 5,
            rotation_cooldown_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MouseConfig {
    /// Run the background mouse simulation while crawling
    pub enabled: bool,

    /// Viewport the pointer stays in, in pixels
    pub width: f64,
    pub height: f64,
}

impl Default for MouseConfig {
    fn default() -> Self {
        let mouse = MouseSettings::default();
        Self {
            enabled: false,
            width: mouse.max_x,
            height: mouse.max_y,
        }
    }
}

/// Metadata sink backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    None,
    Sqlite,
    Document,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// Database file or document root, relative to the collection directory
    pub path: Option<PathBuf>,

    /// Table or collection name; the backend's default when unset
    pub table: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriverConfig {
    pub user_agent: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Mozilla/5.0 (compatible; rulecrawl/{})", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Navigator settings built from the `[navigation]` and `[tor]` sections
    pub fn navigation_settings(&self) -> NavigationSettings {
        let nav = &self.navigation;
        NavigationSettings {
            max_retries: nav.max_retries,
            retry_backoff: Duration::from_millis(nav.retry_backoff_ms),
            timeout: Duration::from_millis(nav.timeout_ms),
            handle_challenges: nav.handle_challenges,
            challenge: ChallengeSettings {
                attempts: nav.challenge_attempts,
                timeout: Duration::from_millis(nav.challenge_timeout_ms),
                ..ChallengeSettings::default()
            },
            max_ip_rotations: self.tor.max_ip_rotations,
            rotation_cooldown: Duration::from_millis(self.tor.rotation_cooldown_ms),
        }
    }

    pub fn tor_settings(&self) -> TorSettings {
        TorSettings {
            control_host: self.tor.control_host.clone(),
            control_port: self.tor.control_port,
            control_password: self.tor.control_password.clone(),
            proxy: self.tor.proxy.clone(),
            ..TorSettings::default()
        }
    }

    pub fn mouse_settings(&self) -> MouseSettings {
        MouseSettings {
            max_x: self.mouse.width,
            max_y: self.mouse.height,
            ..MouseSettings::default()
        }
    }
}
