use finbot_core::{metrics_log::DEFAULT_METRICS_LOG_PATH, token::LiveKitConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Who may be issued a token for which room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPolicy {
    pub default_identity: String,
    pub default_name: String,
    pub default_room: String,
    pub allowed_identities: Vec<String>,
    pub allowed_rooms: Vec<String>,
}

impl TokenPolicy {
    pub fn allows_identity(&self, identity: &str) -> bool {
        self.allowed_identities.iter().any(|i| i == identity)
    }

    pub fn allows_room(&self, room: &str) -> bool {
        self.allowed_rooms.iter().any(|r| r == room)
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub livekit: LiveKitConfig,
    pub token_policy: TokenPolicy,
    pub metrics_log_path: PathBuf,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Splits a comma-separated list, falling back to `default` when unset or empty.
fn list_or(name: &str, default: &str) -> Vec<String> {
    let parsed: Vec<String> = std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if parsed.is_empty() {
        vec![default.to_string()]
    } else {
        parsed
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let mut livekit = LiveKitConfig::new(
            required("LIVEKIT_URL")?,
            required("LIVEKIT_API_KEY")?,
            required("LIVEKIT_API_SECRET")?,
        );
        if let Ok(ttl) = std::env::var("TOKEN_TTL_SECS") {
            livekit.token_ttl_seconds = ttl
                .parse::<u64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "TOKEN_TTL_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", ttl),
                    )
                })?;
        }

        let default_identity =
            std::env::var("DEFAULT_IDENTITY").unwrap_or_else(|_| "identity".to_string());
        let default_name = std::env::var("DEFAULT_NAME").unwrap_or_else(|_| "name".to_string());
        let default_room = std::env::var("LIVEKIT_ROOM").unwrap_or_else(|_| "my-room".to_string());
        let token_policy = TokenPolicy {
            allowed_identities: list_or("ALLOWED_IDENTITIES", &default_identity),
            allowed_rooms: list_or("ALLOWED_ROOMS", &default_room),
            default_identity,
            default_name,
            default_room,
        };

        let metrics_log_path = std::env::var("METRICS_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_METRICS_LOG_PATH));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            livekit,
            token_policy,
            metrics_log_path,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("LIVEKIT_URL");
            env::remove_var("LIVEKIT_API_KEY");
            env::remove_var("LIVEKIT_API_SECRET");
            env::remove_var("TOKEN_TTL_SECS");
            env::remove_var("DEFAULT_IDENTITY");
            env::remove_var("DEFAULT_NAME");
            env::remove_var("LIVEKIT_ROOM");
            env::remove_var("ALLOWED_IDENTITIES");
            env::remove_var("ALLOWED_ROOMS");
            env::remove_var("METRICS_LOG_PATH");
            env::remove_var("RUST_LOG");
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("LIVEKIT_URL", "wss://test.livekit.cloud");
            env::set_var("LIVEKIT_API_KEY", "test-key");
            env::set_var("LIVEKIT_API_SECRET", "test-secret");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:5000");
        assert_eq!(config.livekit.url, "wss://test.livekit.cloud");
        assert_eq!(config.livekit.api_key, "test-key");
        assert_eq!(config.livekit.token_ttl_seconds, 3600);
        assert_eq!(config.token_policy.default_identity, "identity");
        assert_eq!(config.token_policy.default_name, "name");
        assert_eq!(config.token_policy.default_room, "my-room");
        assert_eq!(config.token_policy.allowed_identities, vec!["identity"]);
        assert_eq!(config.token_policy.allowed_rooms, vec!["my-room"]);
        assert_eq!(config.metrics_log_path, PathBuf::from("metrics_log.csv"));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("TOKEN_TTL_SECS", "600");
            env::set_var("LIVEKIT_ROOM", "advisor");
            env::set_var("ALLOWED_ROOMS", "advisor, demo ,");
            env::set_var("ALLOWED_IDENTITIES", "alice,bob");
            env::set_var("DEFAULT_IDENTITY", "alice");
            env::set_var("METRICS_LOG_PATH", "/tmp/latency.csv");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.livekit.token_ttl_seconds, 600);
        assert_eq!(config.token_policy.default_room, "advisor");
        assert_eq!(config.token_policy.allowed_rooms, vec!["advisor", "demo"]);
        assert!(config.token_policy.allows_identity("bob"));
        assert!(!config.token_policy.allows_identity("identity"));
        assert_eq!(config.metrics_log_path, PathBuf::from("/tmp/latency.csv"));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_livekit_key() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("LIVEKIT_API_KEY");
        }

        match Config::from_env().unwrap_err() {
            ConfigError::MissingVar(var) => assert_eq!(var, "LIVEKIT_API_KEY"),
            _ => panic!("Expected MissingVar for LIVEKIT_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_ttl() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("TOKEN_TTL_SECS", "0");
        }

        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TOKEN_TTL_SECS"),
            _ => panic!("Expected InvalidValue for TOKEN_TTL_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
