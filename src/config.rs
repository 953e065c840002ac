use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

impl JwtConfig {
    /// Access tokens must expire strictly before the refresh token they
    /// derive from.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(self.ttl_minutes > 0, "JWT_TTL_MINUTES must be positive");
        anyhow::ensure!(
            self.ttl_minutes < self.refresh_ttl_minutes,
            "JWT_TTL_MINUTES ({}) must be lower than JWT_REFRESH_TTL_MINUTES ({})",
            self.ttl_minutes,
            self.refresh_ttl_minutes
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub static_root: PathBuf,
    pub media_root: PathBuf,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn minutes(name: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(name) {
        Ok(v) => v.parse::<i64>().with_context(|| format!("{name} is not a number")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: var_or("JWT_ISSUER", "accounts"),
            audience: var_or("JWT_AUDIENCE", "accounts-users"),
            ttl_minutes: minutes("JWT_TTL_MINUTES", 5)?,
            refresh_ttl_minutes: minutes("JWT_REFRESH_TTL_MINUTES", 60 * 24)?,
        };
        jwt.validate()?;

        let bind_addr = format!("{}:{}", var_or("APP_HOST", "0.0.0.0"), var_or("APP_PORT", "8080"))
            .parse()
            .context("APP_HOST/APP_PORT")?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL")?,
            bind_addr,
            jwt,
            static_root: var_or("STATIC_ROOT", "static").into(),
            media_root: var_or("MEDIA_ROOT", "media").into(),
        })
    }
}
