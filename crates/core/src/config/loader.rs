use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "PACKER_CONFIG";

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `PACKER_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "PACKER_";

/// Config file location: `$PACKER_CONFIG`, or `config.toml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load configuration from file with `PACKER_` environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_with_env(path, ENV_PREFIX)
}

fn load_with_env(path: &Path, prefix: &str) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(
            r#"
[auth]
method = "none"

[server]
port = 9000

[stock]
package_prefix = "CRATE"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.stock.package_prefix, "CRATE");
    }

    #[test]
    fn test_load_config_from_str_missing_auth() {
        let result = load_config_from_str("[server]\nport = 8080\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/packer.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let file = config_file(
            r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 3000

[database]
path = "/tmp/warehouse.db"
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.database.path.to_str().unwrap(), "/tmp/warehouse.db");
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let file = config_file("[auth]\nmethod = \"none\"\n\n[server]\nport = 3000\n");

        // a prefix of its own keeps this test away from the real overrides
        std::env::set_var("PACKER_LOADER_TEST_SERVER__PORT", "9100");
        std::env::set_var("PACKER_LOADER_TEST_STOCK__LOT_PADDING", "4");
        let config = load_with_env(file.path(), "PACKER_LOADER_TEST_").unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.stock.lot_padding, 4);
        assert_eq!(config.stock.package_padding, 7);
    }

    #[test]
    fn test_bad_env_value_is_parse_error() {
        let file = config_file("[auth]\nmethod = \"none\"\n");

        std::env::set_var("PACKER_LOADER_BAD_SERVER__PORT", "not-a-port");
        let result = load_with_env(file.path(), "PACKER_LOADER_BAD_");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
