use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::errors::ConfigError;

pub const DEFAULT_PRINT_HOST: &str = "print.uni.au.dk";
pub const DEFAULT_DOMAIN: &str = "uni";
pub const DEFAULT_PPD: &str = "/usr/share/ppd/cupsfilters/Generic-PDF_Printer-PDF.ppd";
pub const DEFAULT_KEYRING_SERVICE: &str = "auprint";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "auid";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub spooler: SpoolerConfig,
    pub storage: StorageConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a login session is kept before it has to log in again.
    pub session_ttl: Duration,
}

/// Where the SMB print server lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub domain: String,
    /// Skips DNS resolution of `host` when set.
    pub server_ip: Option<IpAddr>,
}

#[derive(Debug, Clone)]
pub struct SpoolerConfig {
    pub ppd_path: PathBuf,
    pub mangle_queue_names: bool,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub username_file: PathBuf,
    pub keyring_service: String,
    pub keyring_account: String,
}

#[derive(Debug, Clone)]
pub struct CommandConfig {
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let session_ttl = var("AUPRINT_SESSION_TTL_SECS", "28800");
        let server = ServerConfig {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "5000")
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            session_ttl: Duration::from_secs(session_ttl.parse().map_err(|_| {
                ConfigError::InvalidSessionTtl {
                    value: session_ttl.clone(),
                }
            })?),
        };

        let server_ip = match lookup("AUPRINT_SERVER_IP") {
            Some(value) if !value.trim().is_empty() => Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidServerIp { value })?,
            ),
            _ => None,
        };

        let remote = RemoteConfig {
            host: var("AUPRINT_PRINT_HOST", DEFAULT_PRINT_HOST),
            domain: var("AUPRINT_DOMAIN", DEFAULT_DOMAIN),
            server_ip,
        };

        let mangle = var("AUPRINT_MANGLE_QUEUES", "true");
        let spooler = SpoolerConfig {
            ppd_path: PathBuf::from(var("AUPRINT_PPD", DEFAULT_PPD)),
            mangle_queue_names: parse_flag("AUPRINT_MANGLE_QUEUES", &mangle)?,
        };

        let username_file = lookup("AUPRINT_USERNAME_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_username_file);
        let storage = StorageConfig {
            username_file,
            keyring_service: var("AUPRINT_KEYRING_SERVICE", DEFAULT_KEYRING_SERVICE),
            keyring_account: var("AUPRINT_KEYRING_ACCOUNT", DEFAULT_KEYRING_ACCOUNT),
        };

        let timeout = var("AUPRINT_COMMAND_TIMEOUT_SECS", "30");
        let commands = CommandConfig {
            timeout: Duration::from_secs(
                timeout
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout {
                        value: timeout.clone(),
                    })?,
            ),
        };

        let config = Config {
            server,
            remote,
            spooler,
            storage,
            commands,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.commands.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                value: "0".to_string(),
            });
        }

        if self.server.session_ttl.is_zero() {
            return Err(ConfigError::InvalidSessionTtl {
                value: "0".to_string(),
            });
        }

        if self.remote.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn default_username_file() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|dir| dir.join("auprint").join("auid.txt"))
        .unwrap_or_else(|| PathBuf::from("auid.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_with(&[]).expect("Failed to create config");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.remote.host, "print.uni.au.dk");
        assert_eq!(config.remote.domain, "uni");
        assert!(config.remote.server_ip.is_none());
        assert!(config.spooler.mangle_queue_names);
        assert_eq!(config.commands.timeout, Duration::from_secs(30));
        assert_eq!(config.server.session_ttl, Duration::from_secs(8 * 60 * 60));
        assert!(config.storage.username_file.ends_with("auid.txt"));
    }

    #[test]
    fn test_invalid_port() {
        let result = config_with(&[("PORT", "invalid")]);
        assert!(matches!(result, Err(ConfigError::InvalidPort)));

        let result = config_with(&[("PORT", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn test_server_ip_override() {
        let config = config_with(&[("AUPRINT_SERVER_IP", "10.0.0.5")]).unwrap();
        assert_eq!(config.remote.server_ip, Some("10.0.0.5".parse().unwrap()));

        let result = config_with(&[("AUPRINT_SERVER_IP", "print-server")]);
        assert!(matches!(result, Err(ConfigError::InvalidServerIp { .. })));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = config_with(&[("AUPRINT_COMMAND_TIMEOUT_SECS", "soon")]);
        assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));

        let result = config_with(&[("AUPRINT_COMMAND_TIMEOUT_SECS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));
    }

    #[test]
    fn test_session_ttl() {
        let config = config_with(&[("AUPRINT_SESSION_TTL_SECS", "600")]).unwrap();
        assert_eq!(config.server.session_ttl, Duration::from_secs(600));

        let result = config_with(&[("AUPRINT_SESSION_TTL_SECS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidSessionTtl { .. })));

        let result = config_with(&[("AUPRINT_SESSION_TTL_SECS", "forever")]);
        assert!(matches!(result, Err(ConfigError::InvalidSessionTtl { .. })));
    }

    #[test]
    fn test_mangle_flag() {
        let config = config_with(&[("AUPRINT_MANGLE_QUEUES", "off")]).unwrap();
        assert!(!config.spooler.mangle_queue_names);

        let result = config_with(&[("AUPRINT_MANGLE_QUEUES", "maybe")]);
        assert!(matches!(result, Err(ConfigError::InvalidFlag { .. })));
    }
}
