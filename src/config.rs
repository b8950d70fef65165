use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Application configuration, read from the environment exactly once at
/// startup. Handlers and services receive this through `AppState` and never
/// touch `std::env` themselves.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,
    pub token_ttl_days: i64,

    // Loyalty program
    pub loyalty_points_per_completion: i64,

    // Image store
    pub image_store_url: String,
    pub image_store_key: String,
    pub image_store_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8100".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Auth
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 bytes");
        }
        let token_ttl_days = env::var("TOKEN_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        // Loyalty program
        let loyalty_points_per_completion = env::var("LOYALTY_POINTS_PER_COMPLETION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);

        // Image store
        let image_store_url =
            env::var("IMAGE_STORE_URL").context("IMAGE_STORE_URL must be set")?;
        let image_store_key = env::var("IMAGE_STORE_KEY").context("IMAGE_STORE_KEY must be set")?;
        let image_store_timeout_seconds = env::var("IMAGE_STORE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            jwt_secret,
            token_ttl_days,
            loyalty_points_per_completion,
            image_store_url,
            image_store_key,
            image_store_timeout_seconds,
        })
    }
}
