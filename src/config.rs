//! Service configuration

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::value_objects::TaxRate;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// Page size when the request does not give a usable `limit`
    pub pagination_limit: u32,
    pub pagination_max_limit: u32,
    /// Applied to `subtotal - discount`, as a fraction (`0.18` for 18 %)
    pub tax_rate: TaxRate,
    pub cart_ttl: chrono::Duration,
    pub cart_sweep_interval: Duration,
    pub request_timeout: Duration,
    pub nats_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let pagination_limit: u32 = parse_or(&var, "PAGINATION_LIMIT", 10)?;
        let pagination_max_limit: u32 = parse_or(&var, "PAGINATION_MAX_LIMIT", 30)?;
        if pagination_limit == 0 || pagination_max_limit < pagination_limit {
            return Err(ConfigError::Invalid { name: "PAGINATION_MAX_LIMIT", value: pagination_max_limit.to_string() });
        }

        let tax_rate = match var("TAX_RATE") {
            None => TaxRate::ZERO,
            Some(raw) => Decimal::from_str(&raw)
                .ok()
                .and_then(|d| TaxRate::new(d).ok())
                .ok_or(ConfigError::Invalid { name: "TAX_RATE", value: raw })?,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "PORT", 8083)?,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            pagination_limit,
            pagination_max_limit,
            tax_rate,
            cart_ttl: chrono::Duration::hours(parse_or(&var, "CART_TTL_HOURS", 720)?),
            cart_sweep_interval: Duration::from_secs(parse_or(&var, "CART_SWEEP_INTERVAL_SECS", 300)?),
            request_timeout: Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", 30)?),
            nats_url: var("NATS_URL"),
        })
    }

    pub fn socket_addr(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:8083");
        assert_eq!(config.pagination_limit, 10);
        assert_eq!(config.pagination_max_limit, 30);
        assert_eq!(config.tax_rate, TaxRate::ZERO);
        assert_eq!(config.cart_ttl, chrono::Duration::hours(720));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_database_url_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        assert_eq!(load(&[("DATABASE_URL", "  ")]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/shop"),
            ("PORT", "9000"),
            ("TAX_RATE", "0.18"),
            ("NATS_URL", "nats://localhost:4222"),
            ("PAGINATION_MAX_LIMIT", "50"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.tax_rate.fraction(), Decimal::new(18, 2));
        assert_eq!(config.nats_url.as_deref(), Some("nats://localhost:4222"));
        assert_eq!(config.pagination_max_limit, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load(&[("DATABASE_URL", "x"), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { name: "PORT", value: "eighty".into() });

        assert!(load(&[("DATABASE_URL", "x"), ("TAX_RATE", "-0.1")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("PAGINATION_LIMIT", "40")]).is_err());
    }
}
