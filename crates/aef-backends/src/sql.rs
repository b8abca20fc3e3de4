use aef_types::Event;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Batch size at which the COPY protocol takes over from multi-row INSERT
pub const COPY_THRESHOLD: usize = 100;

/// Reference schema for the events table.
///
/// Applied by deployment tooling, not by the backend itself.
pub const SCHEMA_SQL: &str = r#"
-- Agent events table with time-based partitioning
CREATE TABLE IF NOT EXISTS agent_events (
    event_id UUID PRIMARY KEY,
    event_type VARCHAR(100) NOT NULL,
    session_id VARCHAR(255) NOT NULL,
    workflow_id VARCHAR(255),
    phase_id VARCHAR(100),
    milestone_id VARCHAR(100),
    data JSONB NOT NULL DEFAULT '{}',
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_date DATE NOT NULL DEFAULT CURRENT_DATE
) PARTITION BY RANGE (created_date);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_agent_events_session ON agent_events (session_id);
CREATE INDEX IF NOT EXISTS idx_agent_events_workflow ON agent_events (workflow_id)
    WHERE workflow_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_agent_events_type_time ON agent_events (event_type, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_agent_events_timestamp ON agent_events (timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_agent_events_data ON agent_events USING GIN (data);
"#;

const CREATE_STAGING_SQL: &str = r#"
CREATE TEMP TABLE IF NOT EXISTS agent_events_staging (
    event_id UUID,
    event_type VARCHAR(100),
    session_id VARCHAR(255),
    workflow_id VARCHAR(255),
    phase_id VARCHAR(100),
    milestone_id VARCHAR(100),
    data JSONB,
    timestamp TIMESTAMPTZ,
    created_date DATE
) ON COMMIT DROP
"#;

const COPY_STAGING_SQL: &str = "COPY agent_events_staging (event_id, event_type, session_id, \
     workflow_id, phase_id, milestone_id, data, timestamp, created_date) \
     FROM STDIN WITH (FORMAT text)";

const INSERT_FROM_STAGING_SQL: &str = "INSERT INTO agent_events (event_id, event_type, session_id, \
     workflow_id, phase_id, milestone_id, data, timestamp, created_date) \
     SELECT event_id, event_type, session_id, workflow_id, phase_id, milestone_id, \
     data, timestamp, created_date FROM agent_events_staging \
     ON CONFLICT (event_id) DO NOTHING";

/// Configuration for [`SqlBackend`]
#[derive(Debug, Clone)]
pub struct SqlBackendConfig {
    /// PostgreSQL connection string (required)
    pub database_url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    /// Batch size at which COPY replaces the parameterized insert
    pub use_copy_threshold: usize,
    pub retry: RetryPolicy,
}

impl SqlBackendConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool_min_size: 5,
            pool_max_size: 20,
            use_copy_threshold: COPY_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }
}

/// PostgreSQL backend with an adaptive bulk-insert path.
///
/// Small batches go through one parameterized multi-row INSERT; batches at
/// or above `use_copy_threshold` stream through the COPY protocol into a
/// transaction-scoped staging table. Both paths insert with
/// `ON CONFLICT (event_id) DO NOTHING`, so re-delivered batches are
/// idempotent.
pub struct SqlBackend {
    config: SqlBackendConfig,
    pool: tokio::sync::Mutex<Option<PgPool>>,
}

impl SqlBackend {
    pub fn new(config: SqlBackendConfig) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(Error::Config(
                "SqlBackend requires a database_url".to_string(),
            ));
        }
        Ok(Self {
            config,
            pool: tokio::sync::Mutex::new(None),
        })
    }

    /// Initialize the connection pool. Idempotent.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.pool.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let pool = PgPoolOptions::new()
            .min_connections(self.config.pool_min_size)
            .max_connections(self.config.pool_max_size)
            .connect(&self.config.database_url)
            .await?;
        *guard = Some(pool);
        Ok(())
    }

    async fn pool(&self) -> Result<PgPool> {
        self.pool.lock().await.clone().ok_or_else(|| {
            Error::Config("not connected to database; call connect() first".to_string())
        })
    }

    async fn write_once(&self, pool: &PgPool, batch: &[Event]) -> Result<()> {
        if batch.len() >= self.config.use_copy_threshold {
            self.write_with_copy(pool, batch).await
        } else {
            self.write_with_insert(pool, batch).await
        }
    }

    async fn write_with_insert(&self, pool: &PgPool, batch: &[Event]) -> Result<()> {
        let rows = batch.iter().map(event_row).collect::<Result<Vec<_>>>()?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO agent_events (event_id, event_type, session_id, workflow_id, \
             phase_id, milestone_id, data, timestamp, created_date) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.event_id)
                .push_bind(row.event_type)
                .push_bind(row.session_id)
                .push_bind(row.workflow_id)
                .push_bind(row.phase_id)
                .push_bind(row.milestone_id)
                .push_bind(Json(row.data))
                .push_bind(row.timestamp)
                .push_bind(row.created_date);
        });
        builder.push(" ON CONFLICT (event_id) DO NOTHING");

        builder.build().execute(pool).await?;
        Ok(())
    }

    async fn write_with_copy(&self, pool: &PgPool, batch: &[Event]) -> Result<()> {
        let mut payload = String::new();
        for event in batch {
            payload.push_str(&copy_row(event)?);
        }

        let mut tx = pool.begin().await?;
        sqlx::query(CREATE_STAGING_SQL).execute(&mut *tx).await?;

        let mut copy = tx.copy_in_raw(COPY_STAGING_SQL).await?;
        copy.send(payload.as_bytes()).await?;
        copy.finish().await?;

        sqlx::query(INSERT_FROM_STAGING_SQL)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for SqlBackend {
    async fn write(&self, batch: &[Event]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let pool = self.pool().await?;
        let retry = &self.config.retry;

        let mut attempt = 0;
        loop {
            match self.write_once(&pool, batch).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry.delay(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "retrying bulk insert"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Ok(pool) = self.pool().await else {
            return false;
        };
        matches!(
            sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await,
            Ok(1)
        )
    }

    fn retries_writes(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct EventRow {
    event_id: Uuid,
    event_type: String,
    session_id: String,
    workflow_id: Option<String>,
    phase_id: Option<String>,
    milestone_id: Option<String>,
    data: serde_json::Map<String, serde_json::Value>,
    timestamp: chrono::DateTime<chrono::Utc>,
    created_date: chrono::NaiveDate,
}

fn event_row(event: &Event) -> Result<EventRow> {
    let event_id = Uuid::parse_str(&event.event_id)
        .map_err(|_| Error::Invalid(format!("event_id is not a UUID: {}", event.event_id)))?;

    Ok(EventRow {
        event_id,
        event_type: event.event_type.as_str().to_string(),
        session_id: event.session_id.clone(),
        workflow_id: event.workflow_id.clone(),
        phase_id: event.phase_id.clone(),
        milestone_id: event.milestone_id.clone(),
        data: event.data.clone(),
        timestamp: event.timestamp,
        created_date: event.timestamp.date_naive(),
    })
}

/// One tab-separated COPY line, terminated with a newline
fn copy_row(event: &Event) -> Result<String> {
    let row = event_row(event)?;
    let data = serde_json::to_string(&row.data)?;

    let field = |value: Option<&str>| match value {
        Some(s) => escape_copy_text(s),
        None => "\\N".to_string(),
    };

    Ok(format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        row.event_id,
        escape_copy_text(&row.event_type),
        escape_copy_text(&row.session_id),
        field(row.workflow_id.as_deref()),
        field(row.phase_id.as_deref()),
        field(row.milestone_id.as_deref()),
        escape_copy_text(&data),
        row.timestamp.to_rfc3339(),
        row.created_date,
    ))
}

/// Escape a value for COPY text format (tab-separated, `\N` nulls)
fn escape_copy_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
