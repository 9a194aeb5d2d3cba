//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using a bounded sqlx pool.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, ForeignKey, QueryResult, Row, SchemaDescription, Value};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Postgres, Row as SqlxRow, TypeInfo, ValueRef,
};
use std::time::Instant;
use tracing::{debug, warn};

/// Columns of every table in a namespace, in catalog-declared order.
const CATALOG_COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = $1
    ORDER BY table_name, ordinal_position
"#;

/// Foreign key column pairs inside a namespace.
const CATALOG_FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        tc.constraint_name::text,
        kcu.table_name::text AS from_table,
        kcu.column_name::text AS from_column,
        ccu.table_name::text AS to_table,
        ccu.column_name::text AS to_column
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage ccu
        ON tc.constraint_name = ccu.constraint_name
        AND tc.table_schema = ccu.table_schema
    WHERE tc.table_schema = $1
        AND tc.constraint_type = 'FOREIGN KEY'
    ORDER BY tc.constraint_name, kcu.ordinal_position
"#;

/// PostgreSQL database client.
#[derive(Debug, Clone)]
pub struct PostgresClient {
    pool: PgPool,
    target: ConnectionTarget,
    statement_timeout_ms: u64,
}

/// Display-safe connection identity used in error messages.
#[derive(Debug, Clone, Default)]
struct ConnectionTarget {
    host: String,
    port: u16,
    user: String,
    database: String,
}

impl PostgresClient {
    /// Creates a client over a lazily-connecting bounded pool.
    ///
    /// No connection is opened until the first operation, so an unreachable
    /// store surfaces as an error from that operation.
    pub fn new(config: &ConnectionConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(connect_options(config));

        Self {
            pool,
            target: ConnectionTarget::from(config),
            statement_timeout_ms: statement_timeout_ms(config),
        }
    }

    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            target: ConnectionTarget::default(),
            statement_timeout_ms: statement_timeout_ms(&ConnectionConfig::default()),
        }
    }

    /// Acquires one pooled connection; dropping the guard returns it to the pool.
    async fn acquire(&self) -> std::result::Result<PoolConnection<Postgres>, sqlx::Error> {
        self.pool.acquire().await
    }
}

/// Server-side deadline for one statement, never zero (zero disables it).
fn statement_timeout_ms(config: &ConnectionConfig) -> u64 {
    config.query_timeout_secs.max(1) * 1000
}

/// Builds sqlx connect options from the connection config.
fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(config.host_or_default())
        .port(config.port_or_default())
        .username(config.user_or_default())
        .database(config.database_or_default())
        .application_name("klustercost-ask");

    if let Some(password) = &config.password {
        options = options.password(password);
    }

    let mut session = vec![("statement_timeout", statement_timeout_ms(config).to_string())];
    if config.read_only_session {
        session.push(("default_transaction_read_only", "on".to_string()));
    }

    options.options(session)
}

impl From<&ConnectionConfig> for ConnectionTarget {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host_or_default().to_string(),
            port: config.port_or_default(),
            user: config.user_or_default().to_string(),
            database: config.database_or_default().to_string(),
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn introspect_schema(&self, namespace: &str) -> Result<SchemaDescription> {
        let start = Instant::now();
        let mut conn = self
            .acquire()
            .await
            .map_err(|e| AskError::catalog(map_connection_error(&e, &self.target)))?;

        let columns: Vec<(String, String, String)> = sqlx::query_as(CATALOG_COLUMNS_SQL)
            .bind(namespace)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AskError::catalog(format!("Failed to read column catalog: {e}")))?;

        let fk_rows: Vec<(String, String, String, String, String)> =
            sqlx::query_as(CATALOG_FOREIGN_KEYS_SQL)
                .bind(namespace)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| AskError::catalog(format!("Failed to read foreign keys: {e}")))?;

        let schema = SchemaDescription::from_catalog_rows(namespace, columns)
            .with_foreign_keys(group_foreign_keys(fk_rows));

        debug!(
            namespace,
            tables = schema.tables.len(),
            foreign_keys = schema.foreign_keys.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Read schema catalog"
        );

        Ok(schema)
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let mut conn = self
            .acquire()
            .await
            .map_err(|e| AskError::connection(map_connection_error(&e, &self.target)))?;

        // Every question runs in its own read-only transaction that is always
        // rolled back, so settings changed by the SQL (set_config and the
        // like) never outlive it on the pooled connection.
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;
        (&mut *tx)
            .execute("SET TRANSACTION READ ONLY")
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;
        (&mut *tx)
            .execute(format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms).as_str())
            .await
            .map_err(|e| AskError::execution(format_query_error(e)))?;

        let outcome = run_described(&mut *tx, sql).await;

        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Failed to roll back query transaction");
        }

        let (columns, rows) = outcome?;
        Ok(QueryResult::with_data(columns, rows).with_execution_time(start.elapsed()))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Describes `sql` and, if it yields columns, fetches every row.
///
/// Result metadata comes from the prepared statement, so a statement without a
/// tabular result is refused before it runs.
async fn run_described(conn: &mut PgConnection, sql: &str) -> Result<(Vec<ColumnInfo>, Vec<Row>)> {
    let described = (&mut *conn)
        .describe(sql)
        .await
        .map_err(|e| AskError::execution(format_query_error(e)))?;

    if described.columns().is_empty() {
        return Err(AskError::NoResultSet);
    }

    let columns: Vec<ColumnInfo> = described
        .columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect();

    let pg_rows = sqlx::query(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AskError::execution(format_query_error(e)))?;

    Ok((columns, pg_rows.iter().map(convert_row).collect()))
}

/// Groups foreign key column pairs by constraint, keeping catalog order.
fn group_foreign_keys(rows: Vec<(String, String, String, String, String)>) -> Vec<ForeignKey> {
    let mut grouped: Vec<(String, ForeignKey)> = Vec::new();

    for (constraint, from_table, from_column, to_table, to_column) in rows {
        let index = match grouped.iter().position(|(name, _)| *name == constraint) {
            Some(index) => index,
            None => {
                grouped.push((
                    constraint,
                    ForeignKey::new(from_table, Vec::new(), to_table, Vec::new()),
                ));
                grouped.len() - 1
            }
        };

        let fk = &mut grouped[index].1;
        if !fk.from_columns.contains(&from_column) {
            fk.from_columns.push(from_column);
        }
        if !fk.to_columns.contains(&to_column) {
            fk.to_columns.push(to_column);
        }
    }

    grouped.into_iter().map(|(_, fk)| fk).collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(index).ok()
}

/// Decodes a Postgres array into a JSON array, keeping NULL elements.
fn decode_array<'r, T>(
    row: &'r PgRow,
    index: usize,
    to_json: impl Fn(T) -> serde_json::Value,
) -> Option<Value>
where
    Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    decode::<Vec<Option<T>>>(row, index).map(|items| {
        Value::Json(serde_json::Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(serde_json::Value::Null, &to_json))
                .collect(),
        ))
    })
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let is_null = row
        .try_get_raw(index)
        .map(|raw| raw.is_null())
        .unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index).map(|v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index).map(|v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index).map(Value::Int),
        "OID" => decode::<Oid>(row, index).map(|v| Value::Int(v.0 as i64)),
        "FLOAT4" | "REAL" => decode::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index).map(Value::Float),
        "NUMERIC" => decode::<rust_decimal::Decimal>(row, index)
            .map(Value::Decimal)
            .or_else(|| {
                // NaN and the infinities have no Decimal form.
                let raw = row.try_get_raw(index).ok()?;
                numeric_special(raw.as_bytes().ok()?).map(Value::from)
            }),
        "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, index).map(Value::Timestamp),
        "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, index).map(|v| Value::Timestamp(v.and_utc())),
        "DATE" => decode::<chrono::NaiveDate>(row, index).map(Value::Date),
        "TIME" => decode::<chrono::NaiveTime>(row, index).map(Value::Time),
        "INTERVAL" => decode::<PgInterval>(row, index)
            .map(|v| Value::String(format_interval(v.months, v.days, v.microseconds))),
        "UUID" => decode::<sqlx::types::Uuid>(row, index).map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, index).map(Value::Json),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(Value::Bytes),
        "BOOL[]" => decode_array::<bool>(row, index, serde_json::Value::from),
        "INT2[]" => decode_array::<i16>(row, index, serde_json::Value::from),
        "INT4[]" => decode_array::<i32>(row, index, serde_json::Value::from),
        "INT8[]" => decode_array::<i64>(row, index, serde_json::Value::from),
        "FLOAT4[]" => decode_array::<f32>(row, index, serde_json::Value::from),
        "FLOAT8[]" => decode_array::<f64>(row, index, serde_json::Value::from),
        "NUMERIC[]" => decode_array::<rust_decimal::Decimal>(row, index, |v| {
            serde_json::Value::String(v.to_string())
        }),
        "UUID[]" => decode_array::<sqlx::types::Uuid>(row, index, |v| {
            serde_json::Value::String(v.to_string())
        }),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            decode_array::<String>(row, index, serde_json::Value::from)
        }
        _ => decode::<String>(row, index).map(Value::String),
    };

    value.unwrap_or_else(|| {
        warn!(column = index, type_name, "Cannot decode column value, showing type name instead");
        Value::String(format!("<{type_name}>"))
    })
}

/// Reads the special values of a binary NUMERIC: NaN and the infinities.
fn numeric_special(bytes: &[u8]) -> Option<&'static str> {
    let sign = u16::from_be_bytes([*bytes.get(4)?, *bytes.get(5)?]);
    match sign {
        0xC000 => Some("NaN"),
        0xD000 => Some("Infinity"),
        0xF000 => Some("-Infinity"),
        _ => None,
    }
}

/// Renders an interval the way psql shows it, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(months: i32, days: i32, microseconds: i64) -> String {
    fn unit(parts: &mut Vec<String>, amount: i64, singular: &str, plural: &str) {
        if amount != 0 {
            let name = if amount.abs() == 1 { singular } else { plural };
            parts.push(format!("{amount} {name}"));
        }
    }

    let mut parts = Vec::new();
    unit(&mut parts, (months / 12) as i64, "year", "years");
    unit(&mut parts, (months % 12) as i64, "mon", "mons");
    unit(&mut parts, days as i64, "day", "days");

    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let secs = total / 1_000_000;
        let micros = total % 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if micros != 0 {
            let fraction = format!("{micros:06}");
            clock.push('.');
            clock.push_str(fraction.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: &sqlx::Error, target: &ConnectionTarget) -> String {
    let ConnectionTarget {
        host,
        port,
        user,
        database,
    } = target;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        format!("Cannot connect to {host}:{port}. Check that the server is running.")
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        format!("Authentication failed for user '{user}'. Check your credentials.")
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        format!("Database '{database}' does not exist.")
    } else if matches!(error, sqlx::Error::PoolTimedOut) {
        "Timed out waiting for a free database connection.".to_string()
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        format!("Connection to {host}:{port} timed out. The server may be overloaded or unreachable.")
    } else {
        error.to_string()
    }
}

/// Formats a query error with Postgres detail and hint when available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
