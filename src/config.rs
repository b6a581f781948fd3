use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// FoodData Central connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UsdaConfig {
    pub api_key: String,
    pub base_url: String,
    /// Upper bound for a single upstream call.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub usda: UsdaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutrilog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutrilog-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        let usda = UsdaConfig {
            api_key: std::env::var("USDA_API_KEY").context("USDA_API_KEY is not set")?,
            base_url: std::env::var("USDA_BASE_URL")
                .unwrap_or_else(|_| "https://api.nal.usda.gov/fdc/v1".into()),
            timeout_secs: parse_or("USDA_TIMEOUT_SECS", 10),
        };
        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            usda,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        assert_eq!(parse_or("NUTRILOG_TEST_UNSET_VAR", 42u64), 42);
        std::env::set_var("NUTRILOG_TEST_GARBAGE_VAR", "not-a-number");
        assert_eq!(parse_or("NUTRILOG_TEST_GARBAGE_VAR", 7i64), 7);
        std::env::set_var("NUTRILOG_TEST_NUMBER_VAR", "15");
        assert_eq!(parse_or("NUTRILOG_TEST_NUMBER_VAR", 7u32), 15);
    }
}
