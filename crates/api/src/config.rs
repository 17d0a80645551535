//! Runtime configuration read from the environment.

use std::env;
use std::fmt;

use thiserror::Error;
use url::Url;

use services::{LoginPolicy, ServiceSettings};
use services::ai::{AiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://pingtopass.sqlite3";
pub const DEFAULT_PORT: u16 = 3000;
const DEV_JWT_SECRET: &str = "pingtopass-dev-secret";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid LOG_LEVEL: {0}, must be one of trace, debug, info, warn, error")]
    LogLevel(String),
    #[error("invalid ENVIRONMENT: {0}, must be one of development, staging, production")]
    Environment(String),
    #[error("invalid PORT: {0}")]
    Port(String),
    #[error("invalid OPENROUTER_BASE_URL: {0}")]
    BaseUrl(String),
    #[error("JWT_SECRET is required in production")]
    MissingJwtSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            _ => Err(ConfigError::Environment(raw.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Accepted for hosted deployments; the local `SQLite` driver does not use it.
    pub database_auth_token: Option<String>,
    pub jwt_secret: String,
    /// OAuth client id that Google ID tokens must be issued to.
    pub google_client_id: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: Url,
    pub openrouter_model: String,
    pub port: u16,
    pub environment: Environment,
    pub log_level: String,
}

// Secrets stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("database_auth_token", &self.database_auth_token.is_some())
            .field("google_client_id", &self.google_client_id)
            .field("ai_enabled", &self.openrouter_api_key.is_some())
            .field("openrouter_base_url", &self.openrouter_base_url.as_str())
            .field("openrouter_model", &self.openrouter_model)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Create application config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid values or a missing production secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from any key lookup; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid values or a missing production secret.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_level = var("LOG_LEVEL").map_or_else(|| "info".to_string(), |l| l.to_lowercase());
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::LogLevel(log_level));
        }

        let environment = match var("ENVIRONMENT") {
            Some(raw) => Environment::parse(&raw)?,
            None => Environment::Development,
        };

        let port = match var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Port(raw))?,
            None => DEFAULT_PORT,
        };

        let base_url = var("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let openrouter_base_url =
            Url::parse(&base_url).map_err(|_| ConfigError::BaseUrl(base_url.clone()))?;
        if !matches!(openrouter_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::BaseUrl(base_url));
        }

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::MissingJwtSecret);
            }
            None => DEV_JWT_SECRET.to_string(),
        };

        Ok(Self {
            database_url: var("TURSO_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_auth_token: var("TURSO_AUTH_TOKEN"),
            jwt_secret,
            google_client_id: var("GOOGLE_CLIENT_ID"),
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            openrouter_base_url,
            openrouter_model: var("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port,
            environment,
            log_level,
        })
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Provider settings, or `None` when no API key is configured.
    #[must_use]
    pub fn ai_config(&self) -> Option<AiConfig> {
        self.openrouter_api_key.as_ref().map(|api_key| AiConfig {
            base_url: self.openrouter_base_url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            model: self.openrouter_model.clone(),
        })
    }

    /// Google ID tokens when a client id is configured. Without one, development
    /// trusts identities posted by the client and other environments refuse sign-in.
    #[must_use]
    pub fn login_policy(&self) -> LoginPolicy {
        match &self.google_client_id {
            Some(client_id) => LoginPolicy::Google {
                client_id: client_id.clone(),
            },
            None if self.environment == Environment::Development => LoginPolicy::TrustClient,
            None => LoginPolicy::Disabled,
        }
    }

    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings::new(self.jwt_secret.clone())
            .with_ai(self.ai_config())
            .with_login(self.login_policy())
    }
}
