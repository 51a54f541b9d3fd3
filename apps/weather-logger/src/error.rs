use reqwest::StatusCode;
use thiserror::Error;

/// Every way a single logger run can fail. All of them are fatal to the run.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("required env var {key} is missing")]
    MissingConfiguration { key: &'static str },

    #[error("invalid value {value:?} for {key}")]
    InvalidConfiguration { key: &'static str, value: String },

    #[error("{source_name} request failed")]
    NetworkFailure {
        source_name: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{source_name} returned HTTP {status}")]
    HttpStatus {
        source_name: &'static str,
        status: StatusCode,
    },

    #[error("{source_name} returned a body that is not a JSON object: {detail}")]
    InvalidResponseBody {
        source_name: &'static str,
        detail: String,
    },

    #[error("{reading} reading has no {field}")]
    MissingField {
        reading: &'static str,
        field: &'static str,
    },

    #[error("{reading} reading has an unusable {field}: {detail}")]
    InvalidField {
        reading: &'static str,
        field: &'static str,
        detail: String,
    },

    #[error("database write failed")]
    PersistenceFailure(#[from] sqlx::Error),

    #[error("insert affected {rows} rows, expected 1")]
    UnexpectedRowCount { rows: u64 },
}

impl LoggerError {
    /// Message followed by every underlying cause, `: `-separated.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }

    /// Stable label used as the `kind` field in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            LoggerError::MissingConfiguration { .. } => "missing_configuration",
            LoggerError::InvalidConfiguration { .. } => "invalid_configuration",
            LoggerError::NetworkFailure { .. } => "network_failure",
            LoggerError::HttpStatus { .. } => "http_status",
            LoggerError::InvalidResponseBody { .. } => "invalid_response_body",
            LoggerError::MissingField { .. } => "missing_field",
            LoggerError::InvalidField { .. } => "invalid_field",
            LoggerError::PersistenceFailure(_) => "persistence_failure",
            LoggerError::UnexpectedRowCount { .. } => "unexpected_row_count",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        let err = LoggerError::MissingConfiguration { key: "DATABASE_URL" };
        assert_eq!(err.kind(), "missing_configuration");
        assert_eq!(err.to_string(), "required env var DATABASE_URL is missing");

        let err = LoggerError::MissingField {
            reading: "sensor",
            field: "humidity",
        };
        assert_eq!(err.kind(), "missing_field");
        assert_eq!(err.to_string(), "sensor reading has no humidity");

        let err = LoggerError::UnexpectedRowCount { rows: 0 };
        assert_eq!(err.kind(), "unexpected_row_count");
    }

    #[test]
    fn http_status_names_the_source() {
        let err = LoggerError::HttpStatus {
            source_name: "weather",
            status: StatusCode::UNAUTHORIZED,
        };
        assert_eq!(err.kind(), "http_status");
        assert!(err.to_string().contains("weather returned HTTP 401"));
    }
}
