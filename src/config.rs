use serde::Deserialize;
use std::env;

use crate::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_FEATURED_GAME, DEFAULT_SESSION_LIFETIME_DAYS,
    DEFAULT_TOP_GUIDES_LIMIT,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Sessions
    pub jwt_secret: String,
    pub session_lifetime_days: u32,

    // Guides
    pub featured_game: String,
    pub top_guides_limit: u32,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET")?,
            session_lifetime_days: env::var("SESSION_LIFETIME_DAYS")
                .map(|v| v.parse())
                .unwrap_or(Ok(DEFAULT_SESSION_LIFETIME_DAYS))?,

            featured_game: env::var("FEATURED_GAME")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| DEFAULT_FEATURED_GAME.to_string()),
            top_guides_limit: env::var("TOP_GUIDES_LIMIT")
                .map(|v| v.parse())
                .unwrap_or(Ok(DEFAULT_TOP_GUIDES_LIMIT))?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET is empty");
        }
        if self.session_lifetime_days == 0 {
            anyhow::bail!("SESSION_LIFETIME_DAYS must be > 0");
        }
        if self.top_guides_limit == 0 {
            anyhow::bail!("TOP_GUIDES_LIMIT must be > 0");
        }
        if self.featured_game.is_empty() {
            tracing::warn!("FEATURED_GAME is empty; featured guide listing will always be empty");
        }

        if self.jwt_secret.contains("supersecret") || self.jwt_secret.len() < 16 {
            tracing::warn!("Detected weak or dev JWT secret in config");
        }

        if self.database_max_connections == 0 {
            tracing::warn!("DATABASE_MAX_CONNECTIONS should be > 0");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    /// Session lifetime in seconds, shared by the JWT, the session row and the cookie.
    pub fn session_lifetime_secs(&self) -> i64 {
        i64::from(self.session_lifetime_days) * 24 * 3600
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        jwt_secret: "test_secret_value_for_sessions".to_string(),
        session_lifetime_days: DEFAULT_SESSION_LIFETIME_DAYS,
        featured_game: DEFAULT_FEATURED_GAME.to_string(),
        top_guides_limit: DEFAULT_TOP_GUIDES_LIMIT,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let mut config = test_config();
        config.jwt_secret = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_lifetime() {
        let mut config = test_config();
        config.session_lifetime_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn session_lifetime_is_seven_days_by_default() {
        assert_eq!(test_config().session_lifetime_secs(), 7 * 24 * 3600);
    }
}
