use crate::config::Config;
use crate::error::LoggerError;
use crate::readings::{SensorReading, WeatherReading};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

pub const SOURCE_SENSOR: &str = "sensor";
pub const SOURCE_WEATHER: &str = "weather";

/// Where the two readings come from. The HTTP implementation is the real one;
/// tests swap in fakes.
pub trait ReadingSource {
    fn fetch_sensor_data(&self) -> impl Future<Output = Result<SensorReading, LoggerError>>;
    fn fetch_weather_data(&self) -> impl Future<Output = Result<WeatherReading, LoggerError>>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    node_url: String,
    weather_url: String,
    owm_city: String,
    owm_api_key: String,
    owm_units: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, LoggerError> {
        let client = Client::builder()
            .user_agent(concat!("weather-logger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| LoggerError::NetworkFailure {
                source_name: "http client",
                source,
            })?;
        Ok(Self {
            client,
            node_url: config.node_url.clone(),
            weather_url: config.owm_base_url.clone(),
            owm_city: config.owm_city.clone(),
            owm_api_key: config.owm_api_key.clone(),
            owm_units: config.owm_units.clone(),
            timeout: config.http_timeout(),
        })
    }

    async fn get_json(
        &self,
        source_name: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<JsonValue, LoggerError> {
        // Weather URLs carry the API key in the query string.
        let network = |source: reqwest::Error| LoggerError::NetworkFailure {
            source_name,
            source: source.without_url(),
        };

        let response = request.timeout(self.timeout).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(source_name, %status, body = %truncate(&body, 200), "fetch rejected");
            return Err(LoggerError::HttpStatus {
                source_name,
                status,
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        tracing::debug!(source_name, bytes = bytes.len(), "fetched body");
        parse_json_object(source_name, bytes.to_vec())
    }
}

impl ReadingSource for HttpFetcher {
    async fn fetch_sensor_data(&self) -> Result<SensorReading, LoggerError> {
        let request = self.client.get(&self.node_url);
        self.get_json(SOURCE_SENSOR, request)
            .await
            .map(SensorReading)
    }

    async fn fetch_weather_data(&self) -> Result<WeatherReading, LoggerError> {
        let request = self.client.get(&self.weather_url).query(&[
            ("q", self.owm_city.as_str()),
            ("units", self.owm_units.as_str()),
            ("appid", self.owm_api_key.as_str()),
        ]);
        self.get_json(SOURCE_WEATHER, request)
            .await
            .map(WeatherReading)
    }
}

/// Parses a response body into a JSON object, leaving its contents untouched.
pub fn parse_json_object(
    source_name: &'static str,
    mut bytes: Vec<u8>,
) -> Result<JsonValue, LoggerError> {
    let value: JsonValue = simd_json::serde::from_slice(&mut bytes).map_err(|err| {
        LoggerError::InvalidResponseBody {
            source_name,
            detail: err.to_string(),
        }
    })?;
    if !value.is_object() {
        return Err(LoggerError::InvalidResponseBody {
            source_name,
            detail: format!("expected an object, got {}", json_type(&value)),
        });
    }
    Ok(value)
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
