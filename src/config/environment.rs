//! Configuración de variables de entorno
//!
//! Se construye una sola vez en `main` y se pasa por valor al estado de la
//! aplicación y a cada servicio.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Límites del plan demo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoLimits {
    pub vehicles: i64,
    pub users: i64,
    pub parts: i64,
    pub documents: i64,
    pub fines_per_month: i64,
    pub freight_orders_per_month: i64,
}

impl Default for DemoLimits {
    fn default() -> Self {
        Self {
            vehicles: 10,
            users: 5,
            parts: 50,
            documents: 20,
            fines_per_month: 5,
            freight_orders_per_month: 10,
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub cors_origins: Vec<String>,
    pub dashboard_timeout: Duration,
    pub notification_queue_capacity: usize,
    pub gps_queue_capacity: usize,
    pub demo_limits: DemoLimits,
}

impl EnvironmentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let defaults = DemoLimits::default();
        let demo_limits = DemoLimits {
            vehicles: parse_or(&lookup, "DEMO_MAX_VEHICLES", defaults.vehicles)?,
            users: parse_or(&lookup, "DEMO_MAX_USERS", defaults.users)?,
            parts: parse_or(&lookup, "DEMO_MAX_PARTS", defaults.parts)?,
            documents: parse_or(&lookup, "DEMO_MAX_DOCUMENTS", defaults.documents)?,
            fines_per_month: parse_or(&lookup, "DEMO_MAX_FINES_PER_MONTH", defaults.fines_per_month)?,
            freight_orders_per_month: parse_or(
                &lookup,
                "DEMO_MAX_FREIGHT_ORDERS_PER_MONTH",
                defaults.freight_orders_per_month,
            )?,
        };

        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            jwt_secret,
            jwt_expiration: parse_or(&lookup, "JWT_EXPIRATION", 86_400)?,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            dashboard_timeout: Duration::from_millis(parse_or(&lookup, "DASHBOARD_TIMEOUT_MS", 5_000)?),
            notification_queue_capacity: parse_or(&lookup, "NOTIFICATION_QUEUE_CAPACITY", 1_024)?,
            gps_queue_capacity: parse_or(&lookup, "GPS_QUEUE_CAPACITY", 4_096)?,
            demo_limits,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_secret_is_set() {
        let config = EnvironmentConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.dashboard_timeout, Duration::from_secs(5));
        assert_eq!(config.demo_limits, DemoLimits::default());
        assert!(config.cors_origins.is_empty());
        assert!(config.is_development());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        assert_eq!(
            EnvironmentConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = EnvironmentConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_overrides() {
        let config = EnvironmentConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("DEMO_MAX_VEHICLES", "3"),
            ("DASHBOARD_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.demo_limits.vehicles, 3);
        assert_eq!(config.dashboard_timeout, Duration::from_millis(250));
    }
}
