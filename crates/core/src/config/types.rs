use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stock: StockConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key expected in the `X-Api-Key` header (required when method = "api_key")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("packer.db")
}

/// Stock store configuration: record naming and first-run seeding.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StockConfig {
    /// Seed a default company, locations and operation types on an empty database.
    #[serde(default = "default_true")]
    pub bootstrap_warehouse: bool,

    /// Prefix of generated package names (e.g. "PACK" -> "PACK0000001").
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,

    /// Zero-padding width of the package sequence number.
    #[serde(default = "default_serial_padding")]
    pub package_padding: usize,

    /// Zero-padding width of default lot names.
    #[serde(default = "default_serial_padding")]
    pub lot_padding: usize,

    /// Zero-padding width of the per-operation-type picking counter.
    #[serde(default = "default_picking_padding")]
    pub picking_padding: usize,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            bootstrap_warehouse: true,
            package_prefix: default_package_prefix(),
            package_padding: default_serial_padding(),
            lot_padding: default_serial_padding(),
            picking_padding: default_picking_padding(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_package_prefix() -> String {
    "PACK".to_string()
}

fn default_serial_padding() -> usize {
    7
}

fn default_picking_padding() -> usize {
    5
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stock: StockConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            stock: config.stock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_valid_config_with_none_auth() {
        let toml = r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_defaults() {
        let toml = r#"
[auth]
method = "none"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "packer.db");
        assert_eq!(config.stock, StockConfig::default());
        assert!(config.stock.bootstrap_warehouse);
        assert_eq!(config.stock.package_prefix, "PACK");
        assert_eq!(config.stock.lot_padding, 7);
        assert_eq!(config.stock.picking_padding, 5);
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_stock_section() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "secret"

[stock]
bootstrap_warehouse = false
package_prefix = "BOX"
package_padding = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert!(!config.stock.bootstrap_warehouse);
        assert_eq!(config.stock.package_prefix, "BOX");
        assert_eq!(config.stock.package_padding, 4);
        // untouched keys keep their defaults
        assert_eq!(config.stock.lot_padding, 7);
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some("super-secret".to_string()),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            stock: StockConfig::default(),
        };

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
