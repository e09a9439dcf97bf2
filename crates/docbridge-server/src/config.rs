//! Server configuration management

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use docbridge_auth::{AuthServerConfig, OAuthConfig, StorageConfig, TenantConfig, UpstreamConfig};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DOCBRIDGE";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,
    /// Bind port
    pub port: u16,
    /// Externally visible base URL; derived from the bind address when unset
    pub public_url: Option<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// OAuth lifetimes, scopes and issuer
    pub oauth: OAuthConfig,
    /// Upstream identity provider
    pub upstream: UpstreamConfig,
    /// Tenant endpoints tokens may be scoped to
    pub tenants: TenantConfig,
    /// Authorization state backend
    pub storage: StorageConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
    /// Also write daily-rotated log files to this directory
    pub directory: Option<PathBuf>,
    /// File name prefix for rotated log files
    pub file_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            public_url: None,
            logging: LoggingConfig::default(),
            oauth: OAuthConfig::default(),
            upstream: UpstreamConfig::default(),
            tenants: TenantConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            directory: None,
            file_prefix: "docbridge".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A setting has an unusable value
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ServerConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension. Environment
    /// variables with the `DOCBRIDGE_` prefix override file settings, with
    /// `__` separating nested keys (`DOCBRIDGE_OAUTH__ACCESS_TOKEN_TTL=600`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let name = path.to_str().ok_or(ConfigError::UnsupportedFormat)?;
        Self::build(Some(File::new(name, format)))
    }

    /// Load configuration from defaults and `DOCBRIDGE_` environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(None::<config::Environment>)
    }

    /// Load from `path` when given, otherwise from the environment alone
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_file`] and [`ServerConfig::from_env`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    fn build<S>(file: Option<S>) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let config = builder
            // Environment variables override file settings (12-factor app pattern)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create a configuration builder
    ///
    /// # Example
    ///
    /// ```rust
    /// use docbridge_server::ServerConfig;
    ///
    /// let config = ServerConfig::builder()
    ///     .port(9000)
    ///     .public_url("https://docs.example.com")
    ///     .build();
    /// assert_eq!(config.public_url(), "https://docs.example.com");
    /// ```
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Socket address to listen on
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "bind_address",
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Externally visible base URL, without a trailing slash
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind_address, self.port),
        }
    }

    /// Configuration handed to the authorization engine
    ///
    /// The issuer defaults to the public URL.
    pub fn auth_config(&self) -> AuthServerConfig {
        let mut oauth = self.oauth.clone();
        if oauth.issuer.is_empty() {
            oauth.issuer = self.public_url();
        }
        AuthServerConfig {
            oauth,
            upstream: self.upstream.clone(),
            tenants: self.tenants.clone(),
        }
    }
}

/// Configuration builder
#[derive(Debug)]
pub struct ConfigurationBuilder {
    /// Configuration being built
    config: ServerConfig,
}

impl ConfigurationBuilder {
    /// Create a new configuration builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Set bind address
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// Set port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the public base URL
    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_url = Some(url.into());
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Replace the OAuth settings
    pub fn oauth(mut self, oauth: OAuthConfig) -> Self {
        self.config.oauth = oauth;
        self
    }

    /// Replace the upstream settings
    pub fn upstream(mut self, upstream: UpstreamConfig) -> Self {
        self.config.upstream = upstream;
        self
    }

    /// Replace the tenant settings
    pub fn tenants(mut self, tenants: TenantConfig) -> Self {
        self.config.tenants = tenants;
        self
    }

    /// Replace the storage settings
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use docbridge_auth::StorageBackend;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url(), "http://127.0.0.1:8080");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_issuer_defaults_to_public_url() {
        let config = ServerConfig::builder()
            .public_url("https://docs.example.com/")
            .build();
        assert_eq!(config.auth_config().oauth.issuer, "https://docs.example.com");

        let mut oauth = OAuthConfig::default();
        oauth.issuer = "https://issuer.example.com".into();
        let config = ServerConfig::builder().oauth(oauth).build();
        assert_eq!(config.auth_config().oauth.issuer, "https://issuer.example.com");
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::builder().bind_address("0.0.0.0").port(9000).build();
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9000");

        let config = ServerConfig::builder().bind_address("localhost").build();
        assert!(matches!(
            config.socket_addr(),
            Err(ConfigError::Invalid { field: "bind_address", .. })
        ));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
port = 9443
public_url = "https://docs.example.com"

[oauth]
access_token_ttl = 900
scopes_supported = ["docs:read"]

[upstream]
authorization_endpoint = "https://idp.example.com/authorize"
completion_secret = "s3cret"

[storage]
backend = "sled"
path = "/var/lib/docbridge"
sweep_interval = 0
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9443);
        assert_eq!(config.oauth.access_token_ttl, 900);
        assert_eq!(config.oauth.authorization_code_ttl, 600);
        assert_eq!(config.upstream.completion_secret(), Some("s3cret"));
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert_eq!(config.storage.sweep_interval, 0);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        assert!(matches!(
            ServerConfig::from_file("/definitely/not/here.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_completion_secret_is_redacted_in_debug() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"upstream": {{"completion_secret": "hunter2"}}}}"#).unwrap();
        let config = ServerConfig::from_file(file.path()).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
