use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Largest zero-padding width accepted for generated sequence numbers.
const MAX_PADDING: usize = 12;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - An API key is present when the api_key auth method is selected
/// - Stock naming settings produce usable names
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.stock.package_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "stock.package_prefix cannot be empty".to_string(),
        ));
    }

    for (key, value) in [
        ("stock.package_padding", config.stock.package_padding),
        ("stock.lot_padding", config.stock.lot_padding),
        ("stock.picking_padding", config.stock.picking_padding),
    ] {
        if value == 0 || value > MAX_PADDING {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between 1 and {}, got {}",
                key, MAX_PADDING, value
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, DatabaseConfig, ServerConfig, StockConfig};
    use std::net::IpAddr;

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            stock: StockConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..valid_config()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_api_key_required() {
        let mut config = valid_config();
        config.auth.method = AuthMethod::ApiKey;
        assert!(validate_config(&config).is_err());

        config.auth.api_key = Some(String::new());
        assert!(validate_config(&config).is_err());

        config.auth.api_key = Some("k3y".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_package_prefix_fails() {
        let mut config = valid_config();
        config.stock.package_prefix = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_padding_bounds() {
        let mut config = valid_config();
        config.stock.lot_padding = 0;
        assert!(validate_config(&config).is_err());

        config.stock.lot_padding = 13;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("stock.lot_padding"));

        config.stock.lot_padding = 12;
        assert!(validate_config(&config).is_ok());
    }
}
