//! Checkout service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CHECKOUT_API_URL` - Public URL of this service, used for the gateway return URL
//! - `CHECKOUT_APP_URL` - Public URL of the web app, used for the gateway cancel URL
//! - `PAYPAL_CLIENT_ID` - `PayPal` REST app client ID
//! - `PAYPAL_CLIENT_SECRET` - `PayPal` REST app client secret
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - outbound mail
//!
//! ## Optional
//! - `CHECKOUT_HOST` - Bind address (default: 127.0.0.1)
//! - `CHECKOUT_PORT` - Listen port (default: 8080)
//! - `CHECKOUT_PUBLIC_DIR` - Root for generated invoices (default: public)
//! - `CHECKOUT_ALLOWED_ORIGINS` - Comma-separated CORS origins
//! - `CHECKOUT_OPERATOR_EMAIL` - Receives a copy of every settled order
//! - `PAYPAL_API_URL` - REST base URL (default: sandbox)
//! - `PAYPAL_CURRENCY` - ISO 4217 code (default: USD)
//! - `PAYPAL_BRAND_NAME` - Shown on the approval page (default: Helix Genomics)
//! - `SMTP_PORT` - (default: 587)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use helix_core::{CurrencyCode, Email};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

pub const DEFAULT_PAYPAL_API_URL: &str = "https://api-m.sandbox.paypal.com";
pub const DEFAULT_BRAND_NAME: &str = "Helix Genomics";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Checkout service configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public URL of this service (gateway redirects back here)
    pub api_url: Url,
    /// Public URL of the customer-facing app (gateway cancel lands here)
    pub app_url: Url,
    /// Directory whose `invoices/` subdirectory holds generated invoices
    pub public_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    /// Operator address copied on every settled order
    pub operator_email: Option<Email>,
    pub gateway: GatewayConfig,
    pub email: EmailConfig,
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// `PayPal` REST API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GatewayConfig {
    pub api_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub currency: CurrencyCode,
    pub brand_name: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("brand_name", &self.brand_name)
            .finish()
    }
}

/// SMTP configuration for order notifications.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHECKOUT_DATABASE_URL")?;
        let host = get_env_or_default("CHECKOUT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CHECKOUT_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_PORT".to_string(), e.to_string()))?;
        let api_url = parse_url("CHECKOUT_API_URL", &get_required_env("CHECKOUT_API_URL")?)?;
        let app_url = parse_url("CHECKOUT_APP_URL", &get_required_env("CHECKOUT_APP_URL")?)?;
        let public_dir = PathBuf::from(get_env_or_default("CHECKOUT_PUBLIC_DIR", "public"));
        let allowed_origins = get_optional_env("CHECKOUT_ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();
        let operator_email = get_optional_env("CHECKOUT_OPERATOR_EMAIL")
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                Email::parse(&s).map_err(|e| {
                    ConfigError::InvalidEnvVar("CHECKOUT_OPERATOR_EMAIL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let gateway = GatewayConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            api_url,
            app_url,
            public_dir,
            allowed_origins,
            operator_email,
            gateway,
            email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_url(
            "PAYPAL_API_URL",
            &get_env_or_default("PAYPAL_API_URL", DEFAULT_PAYPAL_API_URL),
        )?;
        let currency = get_env_or_default("PAYPAL_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYPAL_CURRENCY".to_string(), e.to_string()))?;

        Ok(Self {
            api_url,
            client_id: get_required_env("PAYPAL_CLIENT_ID")?,
            client_secret: get_validated_secret("PAYPAL_CLIENT_SECRET")?,
            currency,
            brand_name: get_env_or_default("PAYPAL_BRAND_NAME", DEFAULT_BRAND_NAME),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value issued by the provider."
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gateway_config() -> GatewayConfig {
        GatewayConfig {
            api_url: Url::parse(DEFAULT_PAYPAL_API_URL).unwrap(),
            client_id: "client-id-value".to_string(),
            client_secret: SecretString::from("paypal_client_secret_value"),
            currency: CurrencyCode::USD,
            brand_name: DEFAULT_BRAND_NAME.to_string(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-paypal-secret", "PAYPAL_CLIENT_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "SMTP_PASSWORD").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("EK3v9q-Lw2Z_x7TbR4mNc8Yp1Hd6", "PAYPAL_CLIENT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_url_trims_trailing_slash() {
        let url = parse_url("CHECKOUT_API_URL", "https://api.helix.test/").unwrap();
        assert_eq!(url.as_str(), "https://api.helix.test/");
        let url = parse_url("CHECKOUT_API_URL", "https://helix.test/api/").unwrap();
        assert_eq!(url.as_str(), "https://helix.test/api");
    }

    #[test]
    fn test_parse_url_rejects_other_schemes() {
        assert!(matches!(
            parse_url("PAYPAL_API_URL", "ftp://paypal.test"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_url("PAYPAL_API_URL", "not a url").is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.test , ,https://b.test"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
    }

    #[test]
    fn test_gateway_config_debug_redacts_secret() {
        let debug_output = format!("{:?}", gateway_config());
        assert!(debug_output.contains("client-id-value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("paypal_client_secret_value"));
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.helix.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("smtp_password_value"),
            from_address: "orders@helix.test".to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.helix.test"));
        assert!(!debug_output.contains("smtp_password_value"));
    }
}
