//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, CourierConfig, LogOutput, LoggingConfig, RetryConfig, TOKEN_PLACEHOLDER,
};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_retry_config(&config.retry)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }

    validate_url_template(&bot.api_url)?;
    validate_url_template(&bot.file_url)?;
    Ok(())
}

fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.transport_error_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Transport error delay must be greater than 0",
        ));
    }

    if retry.api_error_delay_ms == 0 {
        return Err(ConfigError::validation("API error delay must be greater than 0"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates an HTTP URL template that must contain the token placeholder.
fn validate_url_template(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    if !url.contains(TOKEN_PLACEHOLDER) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL template must contain {TOKEN_PLACEHOLDER}"),
        ));
    }

    Ok(())
}
