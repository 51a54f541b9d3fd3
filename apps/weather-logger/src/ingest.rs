
use crate::config::{Config, FetchMode};
use crate::error::LoggerError;
use crate::fetch::{HttpFetcher, ReadingSource};
use crate::readings::{DataRow, SensorReading, WeatherReading};
use crate::store::{PgSink, RowSink};
use futures::future;

/// One full run against the real endpoints and database.
pub async fn run(config: &Config) -> Result<DataRow, LoggerError> {
    let fetcher = HttpFetcher::new(config)?;
    let sink = PgSink::new(config.database_url.clone(), config.db_connect_timeout());
    run_once(&fetcher, &sink, config.fetch_mode).await
}

pub async fn run_once<S, W>(source: &S, sink: &W, mode: FetchMode) -> Result<DataRow, LoggerError>
where
    S: ReadingSource,
    W: RowSink,
{
    tracing::info!("Trying to save data to database!");

    let outcome = async {
        let (sensor, weather) = fetch_readings(source, mode).await?;
        let row = DataRow::from_readings(&sensor, &weather)?;
        tracing::debug!(row = ?row, "built row");
        sink.write(&row).await?;
        Ok::<_, LoggerError>(row)
    }
    .await;

    match &outcome {
        Ok(_) => tracing::info!("Saved data to database!"),
        Err(err) => tracing::error!(kind = err.kind(), error = %err.detail(), "Could not save this row"),
    }
    outcome
}

pub async fn fetch_readings<S>(
    source: &S,
    mode: FetchMode,
) -> Result<(SensorReading, WeatherReading), LoggerError>
where
    S: ReadingSource,
{
    match mode {
        FetchMode::Sequential => {
            let sensor = source.fetch_sensor_data().await?;
            let weather = source.fetch_weather_data().await?;
            Ok((sensor, weather))
        }
        FetchMode::Concurrent => {
            future::try_join(source.fetch_sensor_data(), source.fetch_weather_data()).await
        }
    }
}
