use crate::error::LoggerError;
use crate::readings::DataRow;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{PgExecutor, PgPool};
use std::future::Future;
use std::time::Duration;

const INSERT_DATAS: &str = r#"
    INSERT INTO datas (times, temperature, humidity, owmtemp, owmhum)
    VALUES ($1, $2, $3, $4, $5)
"#;

/// Destination for the merged row.
pub trait RowSink {
    fn write(&self, row: &DataRow) -> impl Future<Output = Result<(), LoggerError>>;
}

/// Writes to Postgres over a single short-lived connection.
pub struct PgSink {
    database_url: String,
    connect_timeout: Duration,
}

impl PgSink {
    pub fn new(database_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            database_url: database_url.into(),
            connect_timeout,
        }
    }
}

impl RowSink for PgSink {
    async fn write(&self, row: &DataRow) -> Result<(), LoggerError> {
        let pool = connect(&self.database_url, self.connect_timeout).await?;
        let outcome = insert_row(&pool, row).await;
        pool.close().await;
        outcome
    }
}

pub async fn connect(database_url: &str, connect_timeout: Duration) -> Result<PgPool, LoggerError> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(connect_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the insert exactly once and requires exactly one affected row.
pub async fn insert_row<'e, E>(executor: E, row: &DataRow) -> Result<(), LoggerError>
where
    E: PgExecutor<'e>,
{
    let result: PgQueryResult = sqlx::query(INSERT_DATAS)
        .bind(row.times)
        .bind(row.temperature)
        .bind(row.humidity)
        .bind(row.owmtemp)
        .bind(row.owmhum)
        .execute(executor)
        .await?;
    check_rows_affected(result.rows_affected())
}

fn check_rows_affected(rows: u64) -> Result<(), LoggerError> {
    if rows == 1 {
        tracing::debug!(rows, "insert committed");
        Ok(())
    } else {
        Err(LoggerError::UnexpectedRowCount { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_affected_row_is_success() {
        assert!(check_rows_affected(1).is_ok());
    }

    #[test]
    fn zero_or_many_rows_is_failure() {
        for rows in [0, 2] {
            match check_rows_affected(rows) {
                Err(LoggerError::UnexpectedRowCount { rows: got }) => assert_eq!(got, rows),
                other => panic!("expected row count error, got {other:?}"),
            }
        }
    }

    #[test]
    fn insert_targets_datas_columns_in_order() {
        let normalized: String = INSERT_DATAS.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(
            normalized,
            "INSERT INTO datas (times, temperature, humidity, owmtemp, owmhum) VALUES ($1, $2, $3, $4, $5)"
        );
    }
}
