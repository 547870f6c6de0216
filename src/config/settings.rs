//! Application settings loaded from environment variables.

use std::env;

use super::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_JWT_EXPIRATION_HOURS, DEFAULT_MAIL_FROM,
    DEFAULT_OTP_TTL_MINUTES, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, MIN_JWT_SECRET_LENGTH,
};

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Redis backs the rate limiter when set; an in-process limiter is used otherwise.
    pub redis_url: Option<String>,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Raw `CODE=rate,...` overrides for the exchange rate table (rates per USD).
    pub exchange_rates: Option<String>,
    pub otp_ttl_minutes: i64,
    /// Enqueue mail through the job queue instead of logging it inline.
    pub mail_queue: bool,
    pub mail_from: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("exchange_rates", &self.exchange_rates)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .field("mail_queue", &self.mail_queue)
            .field("mail_from", &self.mail_from)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set or is too short (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                // Development mode: use default but warn
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            jwt_secret,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            exchange_rates: env::var("EXCHANGE_RATES").ok(),
            otp_ttl_minutes: env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(DEFAULT_OTP_TTL_MINUTES),
            mail_queue: env::var("MAIL_QUEUE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string()),
        }
    }

    /// Build a configuration for tests and embedded use without touching the environment.
    pub fn for_database(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        let jwt_secret = jwt_secret.into();
        assert!(
            jwt_secret.len() >= MIN_JWT_SECRET_LENGTH,
            "JWT secret must be at least {} characters long",
            MIN_JWT_SECRET_LENGTH
        );

        Self {
            database_url: database_url.into(),
            redis_url: None,
            jwt_secret,
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            exchange_rates: None,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            mail_queue: false,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
        }
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Whether the configured database is a Postgres instance.
    pub fn is_postgres(&self) -> bool {
        self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::for_database(
            "postgres://user:pw@localhost/db",
            "a-very-long-test-secret-of-32-chars!",
        );
        let debug = format!("{:?}", config);

        assert!(!debug.contains("user:pw"));
        assert!(!debug.contains("a-very-long-test-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_backend_detection() {
        let secret = "a-very-long-test-secret-of-32-chars!";
        assert!(Config::for_database("postgres://localhost/db", secret).is_postgres());
        assert!(!Config::for_database("sqlite::memory:", secret).is_postgres());
    }

    #[test]
    #[should_panic]
    fn test_short_secret_rejected() {
        Config::for_database("sqlite::memory:", "short");
    }
}
