use crate::error::LoggerError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

const SENSOR: &str = "sensor";
const WEATHER: &str = "weather";

// Epoch values at or above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

// Date-time layouts the NodeMCU firmware and Postgres-style producers emit.
// Each is tried with a trailing offset first, then as UTC wall time.
const DATE_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// Raw body from the NodeMCU endpoint: `{time, temperature, humidity}`.
#[derive(Debug, Clone)]
pub struct SensorReading(pub JsonValue);

/// Raw body from OpenWeatherMap: `{main: {temp, humidity}, ...}`.
#[derive(Debug, Clone)]
pub struct WeatherReading(pub JsonValue);

/// One row of the `datas` table.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub times: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub owmtemp: f64,
    pub owmhum: f64,
}

impl DataRow {
    pub fn from_readings(
        sensor: &SensorReading,
        weather: &WeatherReading,
    ) -> Result<Self, LoggerError> {
        let time = required(&sensor.0, SENSOR, "time", "time")?;
        let temperature = required(&sensor.0, SENSOR, "temperature", "temperature")?;
        let humidity = required(&sensor.0, SENSOR, "humidity", "humidity")?;

        let main = required(&weather.0, WEATHER, "main", "main")?;
        let owmtemp = required(main, WEATHER, "temp", "main.temp")?;
        let owmhum = required(main, WEATHER, "humidity", "main.humidity")?;

        Ok(Self {
            times: parse_timestamp(time).ok_or_else(|| LoggerError::InvalidField {
                reading: SENSOR,
                field: "time",
                detail: format!("unrecognized timestamp {time}"),
            })?,
            temperature: number(temperature, SENSOR, "temperature")?,
            humidity: number(humidity, SENSOR, "humidity")?,
            owmtemp: number(owmtemp, WEATHER, "main.temp")?,
            owmhum: number(owmhum, WEATHER, "main.humidity")?,
        })
    }
}

fn required<'a>(
    value: &'a JsonValue,
    reading: &'static str,
    key: &str,
    field: &'static str,
) -> Result<&'a JsonValue, LoggerError> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or(LoggerError::MissingField { reading, field })
}

fn number(value: &JsonValue, reading: &'static str, field: &'static str) -> Result<f64, LoggerError> {
    value.as_f64().ok_or_else(|| LoggerError::InvalidField {
        reading,
        field,
        detail: format!("expected a number, got {value}"),
    })
}

fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(raw) => parse_timestamp_str(raw.trim()),
        JsonValue::Number(num) => {
            let raw = num.as_f64()?;
            if raw.abs() >= EPOCH_MILLIS_THRESHOLD {
                millis_to_dt(raw as i64)
            } else {
                millis_to_dt((raw * 1000.0) as i64)
            }
        }
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let (wall, zulu) = match raw.strip_suffix(|c: char| c.eq_ignore_ascii_case(&'z')) {
        Some(stripped) => (stripped.trim_end(), true),
        None => (raw, false),
    };
    for layout in DATE_TIME_LAYOUTS {
        if !zulu {
            for offset in ["%#z", " %#z"] {
                let fmt = format!("{layout}{offset}");
                if let Ok(dt) = DateTime::parse_from_str(wall, &fmt) {
                    return Some(dt.with_timezone(&Utc));
                }
            }
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(wall, layout) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn millis_to_dt(ms: i64) -> Option<DateTime<Utc>> {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor(value: JsonValue) -> SensorReading {
        SensorReading(value)
    }

    fn weather(value: JsonValue) -> WeatherReading {
        WeatherReading(value)
    }

    #[test]
    fn merges_both_readings_without_transformation() {
        let row = DataRow::from_readings(
            &sensor(json!({"time":"2024-01-01T00:00:00Z","temperature":21.5,"humidity":40.0})),
            &weather(json!({"coord":{"lon":24.9,"lat":60.2},"main":{"temp":5.2,"humidity":80}})),
        )
        .expect("row");

        assert_eq!(
            row,
            DataRow {
                times: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                temperature: 21.5,
                humidity: 40.0,
                owmtemp: 5.2,
                owmhum: 80.0,
            }
        );
    }

    #[test]
    fn missing_sensor_humidity_is_reported() {
        let err = DataRow::from_readings(
            &sensor(json!({"time":"2024-01-01T00:00:00Z","temperature":21.5})),
            &weather(json!({"main":{"temp":5.2,"humidity":80}})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoggerError::MissingField {
                reading: "sensor",
                field: "humidity"
            }
        ));
    }

    #[test]
    fn null_counts_as_missing() {
        let err = DataRow::from_readings(
            &sensor(json!({"time":"2024-01-01T00:00:00Z","temperature":null,"humidity":40})),
            &weather(json!({"main":{"temp":5.2,"humidity":80}})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoggerError::MissingField {
                field: "temperature",
                ..
            }
        ));
    }

    #[test]
    fn missing_weather_main_fields_are_reported() {
        let ok_sensor = sensor(json!({"time":"2024-01-01T00:00:00Z","temperature":1,"humidity":2}));

        let err = DataRow::from_readings(&ok_sensor, &weather(json!({"cod":401}))).unwrap_err();
        assert!(matches!(err, LoggerError::MissingField { field: "main", .. }));

        let err = DataRow::from_readings(&ok_sensor, &weather(json!({"main":{"humidity":80}})))
            .unwrap_err();
        assert!(matches!(err, LoggerError::MissingField { field: "main.temp", .. }));

        let err = DataRow::from_readings(&ok_sensor, &weather(json!({"main":{"temp":3.0}})))
            .unwrap_err();
        assert!(matches!(
            err,
            LoggerError::MissingField {
                field: "main.humidity",
                ..
            }
        ));
    }

    #[test]
    fn non_numeric_value_is_invalid() {
        let err = DataRow::from_readings(
            &sensor(json!({"time":"2024-01-01T00:00:00Z","temperature":"21.5","humidity":40})),
            &weather(json!({"main":{"temp":5.2,"humidity":80}})),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_field");
    }

    #[test]
    fn accepts_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap();
        for raw in [
            json!("2024-03-05T12:30:00Z"),
            json!("2024-03-05T14:30:00+02:00"),
            json!("2024-03-05 12:30:00"),
            json!("2024-03-05T12:30:00"),
            json!(1709641800),
            json!(1709641800000i64),
        ] {
            assert_eq!(parse_timestamp(&raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!("2024-03-05")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn accepts_offsets_minute_precision_and_slash_dates() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let shifted = Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap();
        let cases = [
            ("2024-01-01 00:00:00+02", shifted),
            ("2024-01-01T00:00:00+0200", shifted),
            ("2024-01-01 00:00:00.000+02:00", shifted),
            ("2024-01-01 00:00:00 +02", shifted),
            ("2024-01-01 02:00+02", midnight),
            ("2024-01-01 00:00", midnight),
            ("2024-01-01T00:00", midnight),
            ("2024-01-01T00:00Z", midnight),
            ("2024/01/01 00:00:00", midnight),
            ("2024/01/01 00:00", midnight),
            ("2024-01-01 00:00:00Z", midnight),
        ];
        for (raw, expected) in cases {
            let row = DataRow::from_readings(
                &sensor(json!({"time": raw, "temperature": 1.0, "humidity": 2.0})),
                &weather(json!({"main":{"temp":5.2,"humidity":80}})),
            )
            .unwrap_or_else(|err| panic!("{raw}: {err}"));
            assert_eq!(row.times, expected, "{raw}");
        }
    }
}
