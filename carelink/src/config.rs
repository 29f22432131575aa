//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CARELINK_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CARELINK_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CARELINK_AUTH__NATIVE__ENABLED=false` sets the `auth.native.enabled` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use carelink::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::crypto;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CARELINK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where the dashboard is accessible (e.g., "https://care.example.com")
    /// Used for password reset links and as the default CORS origin.
    pub dashboard_url: String,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Email address for the initial admin user (created on first startup)
    pub admin_email: String,
    /// Password for the initial admin user (optional, can be set via environment)
    pub admin_password: Option<String>,
    /// Secret key for signing session tokens (required)
    pub secret_key: Option<String>,
    /// Base64-encoded 32-byte key used to seal token payloads (required)
    pub encryption_key: Option<String>,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Email configuration for password reset mail
    pub email: EmailConfig,
    /// How often the background sweeper deletes expired/revoked tokens
    #[serde(with = "humantime_serde")]
    pub token_sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            dashboard_url: "http://localhost:3000".to_string(),
            database: DatabaseConfig::default(),
            admin_email: "admin@localhost".to_string(),
            admin_password: None,
            secret_key: None,
            encryption_key: None,
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            token_sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the database
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/carelink".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Native email/password authentication
    pub native: NativeAuthConfig,
    /// Security settings (CORS)
    pub security: SecurityConfig,
}

/// Native email/password authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeAuthConfig {
    /// Enable native authentication (login/registration)
    pub enabled: bool,
    /// Allow new users to self-register
    pub allow_registration: bool,
    /// Password validation rules
    pub password: PasswordConfig,
    /// Session token / cookie configuration
    pub session: SessionConfig,
    /// How long password reset tokens are valid
    #[serde(with = "humantime_serde")]
    pub password_reset_token_duration: Duration,
}

impl Default for NativeAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_registration: true,
            password: PasswordConfig::default(),
            session: SessionConfig::default(),
            password_reset_token_duration: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

/// Session token and cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Access token lifetime
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,
    /// Cookie name for the access token
    pub access_cookie_name: String,
    /// Cookie name for the refresh token
    pub refresh_cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(24 * 60 * 60),      // 24 hours
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            access_cookie_name: "carelink_access".to_string(),
            refresh_cookie_name: "carelink_refresh".to_string(),
            cookie_secure: true,
            cookie_same_site: "Strict".to_string(),
        }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests ("*" for any)
    pub allowed_origins: Vec<String>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
            max_age: None,
        }
    }
}

/// Email configuration for password reset mail.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Who to set the reply to field from
    pub reply_to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::File {
                path: "./emails".to_string(),
            },
            from_email: "no-reply@localhost".to_string(),
            from_name: "Carelink".to_string(),
            reply_to: None,
        }
    }
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username
        username: String,
        /// SMTP authentication password
        password: String,
        /// Use TLS encryption
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config: Config = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("CARELINK_").split("__"))
            .extract()?;

        // DATABASE_URL is the conventional deployment override
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration, rejecting values the service cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be non-zero");
        }

        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("secret_key is required (set CARELINK_SECRET_KEY or secret_key in config.yaml)");
        }

        // Must decode to exactly 32 bytes
        self.payload_key()
            .map_err(|e| anyhow::anyhow!("encryption_key is invalid: {}", e.user_message()))?;

        let password = &self.auth.native.password;
        if password.min_length > password.max_length {
            anyhow::bail!(
                "auth.native.password.min_length ({}) exceeds max_length ({})",
                password.min_length,
                password.max_length
            );
        }

        let session = &self.auth.native.session;
        if session.access_token_ttl.as_secs() < 300 {
            anyhow::bail!("auth.native.session.access_token_ttl must be at least 5 minutes");
        }
        if session.refresh_token_ttl < session.access_token_ttl {
            anyhow::bail!("auth.native.session.refresh_token_ttl must not be shorter than access_token_ttl");
        }

        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The JWT signing secret. Errors when unset so callers surface a clean 500
    /// instead of panicking.
    pub fn signing_secret(&self) -> Result<&str, Error> {
        self.secret_key.as_deref().ok_or_else(|| Error::Internal {
            operation: "sign session token: secret_key is required".to_string(),
        })
    }

    /// Decode the payload sealing key from its base64 representation.
    pub fn payload_key(&self) -> Result<[u8; crypto::PAYLOAD_KEY_LEN], Error> {
        use base64::{Engine as _, engine::general_purpose};

        let encoded = self.encryption_key.as_deref().ok_or_else(|| Error::Internal {
            operation: "seal token payload: encryption_key is required".to_string(),
        })?;

        let bytes = general_purpose::STANDARD.decode(encoded).map_err(|e| Error::Internal {
            operation: format!("decode encryption_key: {e}"),
        })?;

        bytes.try_into().map_err(|_| Error::Internal {
            operation: format!("encryption_key must decode to {} bytes", crypto::PAYLOAD_KEY_LEN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};

    fn valid_config() -> Config {
        Config {
            secret_key: Some("test-signing-secret".to_string()),
            encryption_key: Some(general_purpose::STANDARD.encode([7u8; 32])),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_missing_secrets() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_encryption_key_wrong_length() {
        let mut config = valid_config();
        config.encryption_key = Some(general_purpose::STANDARD.encode([0u8; 16]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_ttl_shorter_than_access() {
        let mut config = valid_config();
        config.auth.native.session.refresh_token_ttl = Duration::from_secs(600);
        config.auth.native.session.access_token_ttl = Duration::from_secs(3600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_parsing_with_durations() {
        let yaml = r#"
port: 9090
auth:
  native:
    session:
      access_token_ttl: "2h"
      refresh_token_ttl: "14d"
    password_reset_token_duration: "15m"
"#;

        let config: Config = Figment::new().merge(Yaml::string(yaml)).extract().unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.auth.native.session.access_token_ttl, Duration::from_secs(2 * 60 * 60));
        assert_eq!(
            config.auth.native.session.refresh_token_ttl,
            Duration::from_secs(14 * 24 * 60 * 60)
        );
        assert_eq!(config.auth.native.password_reset_token_duration, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        let yaml = r#"
port: 9090
no_such_field: true
"#;

        let result: Result<Config, _> = Figment::new().merge(Yaml::string(yaml)).extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_email_transport_parsing() {
        let yaml = r#"
email:
  type: smtp
  host: "mail.example.com"
  port: 587
  username: "mailer"
  password: "hunter2"
  use_tls: true
  from_email: "care@example.com"
  from_name: "Care Team"
"#;

        let config: Config = Figment::new().merge(Yaml::string(yaml)).extract().unwrap();
        match config.email.transport {
            EmailTransportConfig::Smtp { ref host, port, .. } => {
                assert_eq!(host, "mail.example.com");
                assert_eq!(port, 587);
            }
            _ => panic!("expected SMTP transport"),
        }
        assert_eq!(config.email.from_email, "care@example.com");
    }
}
