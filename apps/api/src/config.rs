use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which payment backend seals artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProviderKind {
    Stripe,
    Fondy,
}

impl FromStr for PaymentProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "fondy" => Ok(Self::Fondy),
            other => bail!("PAYMENT_PROVIDER must be 'stripe' or 'fondy', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Only `DATABASE_URL` is required at startup. Public URL and payment
/// credentials are optional here and checked by the endpoints that need them,
/// so a half-configured deployment still serves previews and verify pages.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub public_url: Option<String>,
    pub payment_provider: PaymentProviderKind,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_webhook_tolerance_secs: i64,
    pub fondy_merchant_id: Option<String>,
    pub fondy_secret_key: Option<String>,
    pub seal_price_cents: u32,
    pub seal_currency: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            public_url: optional_env("PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
            payment_provider: optional_env("PAYMENT_PROVIDER")
                .as_deref()
                .unwrap_or("stripe")
                .parse()?,
            stripe_secret_key: optional_env("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional_env("STRIPE_WEBHOOK_SECRET"),
            stripe_webhook_tolerance_secs: parse_env("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            fondy_merchant_id: optional_env("FONDY_MERCHANT_ID"),
            fondy_secret_key: optional_env("FONDY_SECRET_KEY"),
            seal_price_cents: parse_env("SEAL_PRICE_CENTS", 500)?,
            seal_currency: optional_env("SEAL_CURRENCY").unwrap_or_else(|| "usd".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable when it is set to something other than blanks.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// A fully populated configuration for handler tests.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/ci_moment_test".to_string(),
            db_max_connections: 1,
            public_url: Some("https://moment.test".to_string()),
            payment_provider: PaymentProviderKind::Stripe,
            stripe_secret_key: Some("sk_test_123".to_string()),
            stripe_webhook_secret: Some("whsec_test".to_string()),
            stripe_webhook_tolerance_secs: 300,
            fondy_merchant_id: None,
            fondy_secret_key: None,
            seal_price_cents: 500,
            seal_currency: "usd".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
