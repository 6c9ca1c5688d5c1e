//! Application configuration

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,

    // Authentication
    pub session_jwt_secret: String,

    // Administrators (lowercased email allow-list)
    pub admin_emails: Vec<String>,

    // Payment gateway webhook
    pub webhook_secret: Option<String>,

    // Assistant API (chat proxy)
    pub assistant_api_url: String,
    pub assistant_api_key: String,
    pub assistant_model: String,
    pub assistant_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            // Authentication
            session_jwt_secret: {
                let secret = env::var("SESSION_JWT_SECRET")
                    .map_err(|_| ConfigError::Missing("SESSION_JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "SESSION_JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },

            // Administrators: comma-separated, compared case-insensitively
            admin_emails: env::var("ADMIN_EMAILS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),

            // Webhook: absent means every delivery is refused
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),

            // Assistant API
            assistant_api_url: env::var("ASSISTANT_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            assistant_api_key: env::var("ASSISTANT_API_KEY").unwrap_or_default(),
            assistant_model: env::var("ASSISTANT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            assistant_timeout: Duration::from_millis(
                env::var("ASSISTANT_TIMEOUT_MS")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .unwrap_or(30_000),
            ),
        })
    }

    /// Is this email on the administrator allow-list?
    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.to_ascii_lowercase();
        self.admin_emails.iter().any(|a| a == &email)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "SESSION_JWT_SECRET",
            "test-session-secret-at-least-32-characters-long",
        );
    }

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("SESSION_JWT_SECRET");
        env::remove_var("ADMIN_EMAILS");
        env::remove_var("WEBHOOK_SECRET");
    }

    #[test]
    #[serial]
    fn test_missing_database_url_fails() {
        cleanup_config();
        env::set_var(
            "SESSION_JWT_SECRET",
            "test-session-secret-at-least-32-characters-long",
        );

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_short_session_secret_rejected() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("SESSION_JWT_SECRET", "too-short");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));
        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_admin_emails_parsed_and_lowercased() {
        setup_minimal_config();
        env::set_var("ADMIN_EMAILS", "Admin@Example.com, ops@example.com ,,");

        let config = Config::from_env().unwrap();
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.is_admin("admin@example.com"));
        assert!(config.is_admin("ADMIN@EXAMPLE.COM"));
        assert!(config.is_admin("ops@example.com"));
        assert!(!config.is_admin("user@example.com"));
        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_empty_webhook_secret_treated_as_unset() {
        setup_minimal_config();
        env::set_var("WEBHOOK_SECRET", "");

        let config = Config::from_env().unwrap();
        assert!(config.webhook_secret.is_none());
        cleanup_config();
    }
}
