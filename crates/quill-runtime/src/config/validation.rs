//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, QuillConfig, RegistrantsConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &QuillConfig) -> ConfigResult<()> {
    validate_dispatch_config(&config.dispatch)?;
    validate_registrants_config(&config.registrants)?;
    Ok(())
}

/// Validates result limits and channel names.
fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.default_limit == Some(0) {
        return Err(ConfigError::invalid(
            "dispatch.default_limit",
            "must be greater than 0",
        ));
    }

    for (name, channel) in &dispatch.channels {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "dispatch.channels",
                "channel names cannot be empty",
            ));
        }
        if channel.limit == Some(0) {
            return Err(ConfigError::invalid(
                format!("dispatch.channels.{name}.limit"),
                "must be greater than 0; use `enabled = false` to turn a channel off",
            ));
        }
    }

    Ok(())
}

fn validate_registrants_config(registrants: &RegistrantsConfig) -> ConfigResult<()> {
    if registrants.disabled.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "registrants.disabled",
            "registrant names cannot be empty",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ChannelConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&QuillConfig::default()).is_ok());
    }

    #[test]
    fn zero_default_limit_is_rejected() {
        let mut config = QuillConfig::default();
        config.dispatch.default_limit = Some(0);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_channel_limit_is_rejected() {
        let mut config = QuillConfig::default();
        config.dispatch.channels.insert(
            "smart".to_string(),
            ChannelConfig {
                limit: Some(0),
                enabled: true,
            },
        );
        let err = validate_config(&config).map_err(|e| e.to_string());
        assert!(matches!(err, Err(ref message) if message.contains("dispatch.channels.smart.limit")));
    }

    #[test]
    fn empty_registrant_name_is_rejected() {
        let mut config = QuillConfig::default();
        config.registrants.disabled = vec!["words".to_string(), "  ".to_string()];
        assert!(validate_config(&config).is_err());
    }
}
