//! services/client/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `AnalysisRepository` port from the `core` crate. It stores analysis
//! records in the `open_blinkist` table of a PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use open_blinkist_core::domain::{AnalysisPatch, AnalysisRecord, AnalysisStatus, BookSummary};
use open_blinkist_core::ports::{AnalysisRepository, PortError, PortResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;

/// How long a single store call waits for a connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

const RECORD_COLUMNS: &str = "id, created_at, updated_at, book_name, role, num_insights, \
     response_data, processing_time_ms, api_endpoint, user_agent, status, error_message";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `AnalysisRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds an adapter without opening a connection. An unreachable
    /// database only surfaces later, as a `PortError` from each call.
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Struct
//=========================================================================================

#[derive(FromRow)]
struct AnalysisRow {
    id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_name: String,
    role: String,
    num_insights: i32,
    response_data: Option<Json<BookSummary>>,
    processing_time_ms: Option<i64>,
    api_endpoint: String,
    user_agent: Option<String>,
    status: String,
    error_message: Option<String>,
}

impl AnalysisRow {
    fn to_domain(self) -> PortResult<AnalysisRecord> {
        let status = self
            .status
            .parse::<AnalysisStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(AnalysisRecord {
            id: Some(self.id),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            book_name: self.book_name,
            role: self.role,
            num_insights: self.num_insights,
            response_data: self.response_data.map(|Json(summary)| summary),
            processing_time_ms: self.processing_time_ms,
            api_endpoint: self.api_endpoint,
            user_agent: self.user_agent,
            status,
            error_message: self.error_message,
        })
    }
}

//=========================================================================================
// `AnalysisRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnalysisRepository for DbAdapter {
    async fn create(&self, record: AnalysisRecord) -> PortResult<AnalysisRecord> {
        let sql = format!(
            "INSERT INTO open_blinkist \
                 (book_name, role, num_insights, response_data, processing_time_ms, \
                  api_endpoint, user_agent, status, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(&record.book_name)
            .bind(&record.role)
            .bind(record.num_insights)
            .bind(record.response_data.map(Json))
            .bind(record.processing_time_ms)
            .bind(&record.api_endpoint)
            .bind(&record.user_agent)
            .bind(record.status.as_str())
            .bind(&record.error_message)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        row.to_domain()
    }

    /// Only rows whose status may move to `patch.status` are updated, so a
    /// record reaches a terminal status at most once.
    async fn update(&self, id: i64, patch: AnalysisPatch) -> PortResult<AnalysisRecord> {
        let sql = format!(
            "UPDATE open_blinkist SET \
                 status = $2, \
                 response_data = COALESCE($3, response_data), \
                 processing_time_ms = COALESCE($4, processing_time_ms), \
                 error_message = COALESCE($5, error_message), \
                 updated_at = $6 \
             WHERE id = $1 AND status = ANY($7) \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let sources: Vec<String> = AnalysisStatus::sources_of(patch.status)
            .into_iter()
            .map(|status| status.as_str().to_string())
            .collect();
        let row = sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(id)
            .bind(patch.status.as_str())
            .bind(patch.response_data.map(Json))
            .bind(patch.processing_time_ms)
            .bind(&patch.error_message)
            .bind(patch.updated_at)
            .bind(sources)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Pending analysis {} not found", id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        row.to_domain()
    }

    async fn list_recent(&self, limit: i64) -> PortResult<Vec<AnalysisRecord>> {
        let sql = format!(
            "SELECT {} FROM open_blinkist ORDER BY created_at DESC, id DESC LIMIT $1",
            RECORD_COLUMNS
        );
        let rows = sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        rows.into_iter().map(AnalysisRow::to_domain).collect()
    }
}
