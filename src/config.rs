use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Longest session lifetime accepted from configuration (one year).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;
const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 7;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Session lifetime, clamped to `1..=MAX_TTL_MINUTES` minutes.
    pub fn ttl(&self) -> Duration {
        let minutes = self.ttl_minutes.clamp(1, MAX_TTL_MINUTES).unsigned_abs();
        Duration::from_secs(minutes * 60)
    }
}

fn parse_ttl_minutes(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_TTL_MINUTES)
        .clamp(1, MAX_TTL_MINUTES)
}

/// Session cookie attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub storage: StorageConfig,
    /// Base URL of the web client; password reset links point here.
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accountd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accountd-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref()),
        };
        let cookie = CookieConfig {
            secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "avatars".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY is not set")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY is not set")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        Ok(Self {
            database_url,
            jwt,
            cookie,
            storage,
            frontend_url,
        })
    }
}
