use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{format_timestamp, AnalysisRecord, AnalysisRun, RunStatus, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::orchestrator::Gate;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                    message: format!("Failed to create database directory: {}", e),
                })?;
            }
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// In-memory database for tests and dry runs.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_run(&self, run: &AnalysisRun) -> StorageResult<bool> {
        // Terminal rows are frozen by the WHERE clause on the update arm.
        let result = sqlx::query(
            r#"
            INSERT INTO analysis_runs
                (id, tenant_id, ticket_id, status, gate, meta, error_message, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                gate = excluded.gate,
                meta = excluded.meta,
                error_message = excluded.error_message,
                completed_at = excluded.completed_at
            WHERE analysis_runs.status = 'running'
            "#,
        )
        .bind(&run.id)
        .bind(&run.tenant_id)
        .bind(&run.ticket_id)
        .bind(run.status.as_str())
        .bind(run.gate.map(|g| g.as_str()))
        .bind(run.meta.to_string())
        .bind(&run.error_message)
        .bind(format_timestamp(&run.created_at))
        .bind(run.completed_at.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() > 0;
        debug!(run_id = %run.id, status = %run.status, applied, "Run upserted");
        Ok(applied)
    }

    async fn upsert_result(&self, record: &AnalysisRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_analyses
                (id, run_id, tenant_id, ticket_id, narrative, root_cause, resolution,
                 confidence, intent, sentiment, open_questions, risk_tags,
                 field_proposals, evidence, analysis, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                narrative = excluded.narrative,
                root_cause = excluded.root_cause,
                resolution = excluded.resolution,
                confidence = excluded.confidence,
                intent = excluded.intent,
                sentiment = excluded.sentiment,
                open_questions = excluded.open_questions,
                risk_tags = excluded.risk_tags,
                field_proposals = excluded.field_proposals,
                evidence = excluded.evidence,
                analysis = excluded.analysis
            "#,
        )
        .bind(&record.id)
        .bind(&record.run_id)
        .bind(&record.tenant_id)
        .bind(&record.ticket_id)
        .bind(&record.narrative)
        .bind(&record.root_cause)
        .bind(record.resolution.to_string())
        .bind(record.confidence)
        .bind(&record.intent)
        .bind(&record.sentiment)
        .bind(record.open_questions.to_string())
        .bind(record.risk_tags.to_string())
        .bind(record.field_proposals.to_string())
        .bind(record.evidence.to_string())
        .bind(record.analysis.to_string())
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await?;

        debug!(analysis_id = %record.id, "Result upserted");
        Ok(())
    }

    async fn get_run(&self, id: &str) -> StorageResult<Option<AnalysisRun>> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, status, gate, meta, error_message, created_at, completed_at
            FROM analysis_runs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AnalysisRun::try_from).transpose()
    }

    async fn get_runs_for_ticket(
        &self,
        tenant_id: &str,
        ticket_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<AnalysisRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, status, gate, meta, error_message, created_at, completed_at
            FROM analysis_runs
            WHERE tenant_id = ? AND ticket_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AnalysisRun::try_from).collect()
    }

    async fn get_result(
        &self,
        id: &str,
        tenant_id: &str,
    ) -> StorageResult<Option<AnalysisRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, tenant_id, ticket_id, narrative, root_cause, resolution,
                   confidence, intent, sentiment, open_questions, risk_tags,
                   field_proposals, evidence, analysis, created_at
            FROM ticket_analyses
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AnalysisRecord::from))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or(Value::Null)
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    tenant_id: String,
    ticket_id: String,
    status: String,
    gate: Option<String>,
    meta: String,
    error_message: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

impl TryFrom<RunRow> for AnalysisRun {
    type Error = StorageError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status = RunStatus::from_str(&row.status)
            .map_err(|message| StorageError::Query { message })?;
        let gate = row
            .gate
            .as_deref()
            .map(Gate::from_str)
            .transpose()
            .map_err(|message| StorageError::Query { message })?;

        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            ticket_id: row.ticket_id,
            status,
            gate,
            meta: parse_json(&row.meta),
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    run_id: String,
    tenant_id: String,
    ticket_id: String,
    narrative: String,
    root_cause: Option<String>,
    resolution: String,
    confidence: f64,
    intent: Option<String>,
    sentiment: Option<String>,
    open_questions: String,
    risk_tags: String,
    field_proposals: String,
    evidence: String,
    analysis: String,
    created_at: String,
}

impl From<RecordRow> for AnalysisRecord {
    fn from(row: RecordRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            tenant_id: row.tenant_id,
            ticket_id: row.ticket_id,
            narrative: row.narrative,
            root_cause: row.root_cause,
            resolution: parse_json(&row.resolution),
            confidence: row.confidence,
            intent: row.intent,
            sentiment: row.sentiment,
            open_questions: parse_json(&row.open_questions),
            risk_tags: parse_json(&row.risk_tags),
            field_proposals: parse_json(&row.field_proposals),
            evidence: parse_json(&row.evidence),
            analysis: parse_json(&row.analysis),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
