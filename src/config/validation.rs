use crate::config::types::{
    Config, DriverConfig, FrontierConfig, InteractionConfig, MouseConfig, NavigationConfig,
    SinkConfig, TorConfig,
};
use crate::sink::is_valid_identifier;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_navigation_config(&config.navigation)?;
    validate_frontier_config(&config.frontier)?;
    validate_interaction_config(&config.interaction)?;
    validate_tor_config(&config.tor)?;
    validate_mouse_config(&config.mouse)?;
    validate_sink_config(&config.sink)?;
    validate_driver_config(&config.driver)?;
    Ok(())
}

fn validate_navigation_config(config: &NavigationConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "navigation max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation timeout-ms must be > 0".to_string(),
        ));
    }

    if config.handle_challenges {
        if config.challenge_attempts < 1 {
            return Err(ConfigError::Validation(format!(
                "challenge-attempts must be >= 1, got {}",
                config.challenge_attempts
            )));
        }

        if config.challenge_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "challenge-timeout-ms must be > 0".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "frontier max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.stall_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "stall-timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_interaction_config(config: &InteractionConfig) -> Result<(), ConfigError> {
    if config.cache_capacity == 0 {
        return Err(ConfigError::Validation(
            "interaction cache-capacity must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_tor_config(config: &TorConfig) -> Result<(), ConfigError> {
    if config.control_host.is_empty() {
        return Err(ConfigError::Validation(
            "tor control-host cannot be empty".to_string(),
        ));
    }

    if config.control_port == 0 {
        return Err(ConfigError::Validation(
            "tor control-port must be > 0".to_string(),
        ));
    }

    let proxy = Url::parse(&config.proxy)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid tor proxy '{}': {}", config.proxy, e)))?;
    if !matches!(proxy.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Unsupported tor proxy scheme '{}'",
            proxy.scheme()
        )));
    }

    Ok(())
}

fn validate_mouse_config(config: &MouseConfig) -> Result<(), ConfigError> {
    if !(config.width > 0.0 && config.height > 0.0) {
        return Err(ConfigError::Validation(format!(
            "mouse viewport must be positive, got {}x{}",
            config.width, config.height
        )));
    }
    Ok(())
}

fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    if let Some(table) = &config.table {
        if !is_valid_identifier(table) {
            return Err(ConfigError::Validation(format!(
                "sink table must be a plain identifier, got '{}'",
                table
            )));
        }
    }

    if let Some(path) = &config.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "sink path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_driver_config(config: &DriverConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "driver user-agent cannot be empty".to_string(),
        ));
    }
    Ok(())
}
