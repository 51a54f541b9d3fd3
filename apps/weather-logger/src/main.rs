mod config;
mod error;
mod fetch;
mod ingest;
mod readings;
mod store;

use crate::config::Config;
use anyhow::Result;
use tracing::Instrument;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Console logging, plus OTLP/HTTP span export when the config names a collector.
fn init_tracing(config: Option<&Config>) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};

    let otel_layer = config
        .and_then(|config| config.otlp_endpoint.as_deref())
        .and_then(otlp_traces_endpoint)
        .map(|endpoint| {
            let exporter = opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint(endpoint);
            let resource = Resource::new(vec![KeyValue::new("service.name", "weather-logger")]);
            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(OTelTraceConfig::default().with_resource(resource))
                .install_batch(Tokio)
                .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,weather_logger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(otel_layer)
        .try_init()?;
    Ok(())
}

/// Collector base URL → traces URL. `None` for a blank value.
fn otlp_traces_endpoint(raw: &str) -> Option<String> {
    match raw.trim() {
        "" => None,
        endpoint if endpoint.ends_with("/v1/traces") => Some(endpoint.to_string()),
        endpoint => Some(format!("{}/v1/traces", endpoint.trim_end_matches('/'))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(config.as_ref().ok())?;

    let outcome = match config {
        Ok(config) => {
            let span = tracing::info_span!(
                "weather_logger_run",
                city = %config.owm_city,
                fetch_mode = ?config.fetch_mode
            );
            ingest::run(&config).instrument(span).await.map(|_| ())
        }
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "configuration rejected");
            Err(err)
        }
    };

    opentelemetry::global::shutdown_tracer_provider();
    outcome?;
    Ok(())
}
