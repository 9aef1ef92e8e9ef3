use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mikrotik: MikrotikConfig,
    pub billing: BillingSettings,
    pub service_name: String,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// RouterOS REST API access. One credential pair is shared across the
/// router fleet; hosts come from the router inventory.
#[derive(Clone, Debug)]
pub struct MikrotikConfig {
    pub enabled: bool,
    pub username: String,
    pub password: Secret<String>,
    pub rest_scheme: String,
    pub rest_port: u16,
    pub accept_invalid_certs: bool,
    pub request_timeout_secs: u64,
    pub max_retry_secs: u64,
}

/// Billing calendar. Bills fall due on `due_day`; the overdue sweep only
/// runs on `suspension_day`. Offsets are hours east of UTC.
#[derive(Clone, Debug)]
pub struct BillingSettings {
    pub due_day: u32,
    pub suspension_day: u32,
    pub utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("SUBSCRIBER_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SUBSCRIBER_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let db_url = env::var("SUBSCRIBER_DATABASE_URL")
            .map_err(|_| anyhow!("SUBSCRIBER_DATABASE_URL must be set"))?;
        let max_connections = env::var("SUBSCRIBER_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("SUBSCRIBER_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let mikrotik_enabled = env::var("MIKROTIK_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let mikrotik_username = env::var("MIKROTIK_USERNAME").unwrap_or_default();
        let mikrotik_password = env::var("MIKROTIK_PASSWORD").unwrap_or_default();
        let mikrotik_scheme =
            env::var("MIKROTIK_REST_SCHEME").unwrap_or_else(|_| "https".to_string());
        let mikrotik_port = env::var("MIKROTIK_REST_PORT")
            .unwrap_or_else(|_| "443".to_string())
            .parse()?;
        let accept_invalid_certs = env::var("MIKROTIK_ACCEPT_INVALID_CERTS")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let due_day = env::var("BILLING_DUE_DAY")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let suspension_day = env::var("BILLING_SUSPENSION_DAY")
            .unwrap_or_else(|_| "6".to_string())
            .parse()?;
        let utc_offset_hours = env::var("BILLING_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            mikrotik: MikrotikConfig {
                enabled: mikrotik_enabled,
                username: mikrotik_username,
                password: Secret::new(mikrotik_password),
                rest_scheme: mikrotik_scheme,
                rest_port: mikrotik_port,
                accept_invalid_certs,
                request_timeout_secs: 10,
                max_retry_secs: 60,
            },
            billing: BillingSettings {
                due_day,
                suspension_day,
                utc_offset_hours,
            },
            service_name: "subscriber-service".to_string(),
            log_level,
        })
    }
}
