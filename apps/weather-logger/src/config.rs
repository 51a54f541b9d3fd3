use crate::error::LoggerError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_OWM_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
const DEFAULT_OWM_UNITS: &str = "metric";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Sensor first, then weather.
    Sequential,
    /// Both requests in flight at once, joined before the insert.
    Concurrent,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub node_url: String,
    pub owm_api_key: String,
    pub owm_city: String,
    pub database_url: String,
    pub owm_base_url: String,
    pub owm_units: String,
    pub http_timeout_secs: u64,
    pub db_connect_timeout_secs: u64,
    pub fetch_mode: FetchMode,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, LoggerError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required =
            |key: &'static str| get(key).ok_or(LoggerError::MissingConfiguration { key });

        let node_url = required("NODE_URL")?;
        let owm_api_key = required("OWM_APIKEY")?;
        let owm_city = required("OWM_CITY")?;
        let database_url = normalize_database_url(required("DATABASE_URL")?);

        let owm_base_url =
            get("OWM_BASE_URL").unwrap_or_else(|| DEFAULT_OWM_BASE_URL.to_string());
        let owm_units = get("OWM_UNITS").unwrap_or_else(|| DEFAULT_OWM_UNITS.to_string());

        let http_timeout_secs =
            parse_u64("LOGGER_HTTP_TIMEOUT_SECS", get("LOGGER_HTTP_TIMEOUT_SECS"), 20)?;
        let db_connect_timeout_secs = parse_u64(
            "LOGGER_DB_CONNECT_TIMEOUT_SECS",
            get("LOGGER_DB_CONNECT_TIMEOUT_SECS"),
            10,
        )?;

        let fetch_mode = match get("LOGGER_CONCURRENT_FETCH") {
            None => FetchMode::Sequential,
            Some(value) => match parse_bool(&value) {
                Some(true) => FetchMode::Concurrent,
                Some(false) => FetchMode::Sequential,
                None => {
                    return Err(LoggerError::InvalidConfiguration {
                        key: "LOGGER_CONCURRENT_FETCH",
                        value,
                    })
                }
            },
        };

        let otlp_endpoint = get("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            node_url,
            owm_api_key,
            owm_city,
            database_url,
            owm_base_url,
            owm_units,
            http_timeout_secs,
            db_connect_timeout_secs,
            fetch_mode,
            otlp_endpoint,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }
}

fn parse_u64(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, LoggerError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|v| *v != 0)
            .ok_or(LoggerError::InvalidConfiguration { key, value }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// SQLAlchemy-style URLs carry a driver suffix that sqlx does not understand.
fn normalize_database_url(url: String) -> String {
    for prefix in [
        "postgresql+psycopg://",
        "postgresql+psycopg2://",
        "postgresql+asyncpg://",
    ] {
        if let Some(stripped) = url.strip_prefix(prefix) {
            return format!("postgresql://{stripped}");
        }
    }
    url
}
