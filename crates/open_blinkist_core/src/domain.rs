//! crates/open_blinkist_core/src/domain.rs
//!
//! Defines the core data structures of the application: the summary returned
//! by the summarization API, the request that produces it, and the analysis
//! record mirrored into persistence for every request/response cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Summary Payload
//=========================================================================================

/// One structured unit of a summary. The order of insights inside a
/// `BookSummary` is the carousel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInsight {
    pub heading: String,
    pub bullet_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

/// The structured summary produced by the summarization API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub book_name: String,
    pub author: String,
    pub role: String,
    pub key_insights: Vec<KeyInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_theme: Option<String>,
}

//=========================================================================================
// Request
//=========================================================================================

pub const DEFAULT_ROLE: &str = "professional";
pub const DEFAULT_NUM_INSIGHTS: u8 = 5;

/// The inputs of one summarization request. Serializes to the JSON body of
/// `POST /summarize_book`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub book_name: String,
    pub role: String,
    pub num_insights: u8,
}

impl SummaryRequest {
    pub fn new(book_name: impl Into<String>, role: impl Into<String>, num_insights: u8) -> Self {
        Self {
            book_name: book_name.into(),
            role: role.into(),
            num_insights,
        }
    }

    /// A request is only sent when the title has something besides whitespace.
    pub fn is_submittable(&self) -> bool {
        !self.book_name.trim().is_empty()
    }
}

impl Default for SummaryRequest {
    fn default() -> Self {
        Self::new("", DEFAULT_ROLE, DEFAULT_NUM_INSIGHTS)
    }
}

//=========================================================================================
// Analysis Record
//=========================================================================================

/// Lifecycle of a persisted analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 3] = [
        AnalysisStatus::Pending,
        AnalysisStatus::Completed,
        AnalysisStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Only `pending` records move, and only to a terminal status.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        matches!(
            (self, next),
            (AnalysisStatus::Pending, AnalysisStatus::Completed)
                | (AnalysisStatus::Pending, AnalysisStatus::Failed)
        )
    }

    /// Every status a record may be in for it to move to `next`.
    pub fn sources_of(next: AnalysisStatus) -> Vec<AnalysisStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status '{}'", other)),
        }
    }
}

/// One request/response cycle as stored by the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub book_name: String,
    pub role: String,
    pub num_insights: i32,
    pub response_data: Option<BookSummary>,
    pub processing_time_ms: Option<i64>,
    pub api_endpoint: String,
    pub user_agent: Option<String>,
    pub status: AnalysisStatus,
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    /// Builds the record written before the remote call is issued.
    pub fn pending(
        request: &SummaryRequest,
        api_endpoint: impl Into<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            book_name: request.book_name.clone(),
            role: request.role.clone(),
            num_insights: i32::from(request.num_insights),
            response_data: None,
            processing_time_ms: None,
            api_endpoint: api_endpoint.into(),
            user_agent,
            status: AnalysisStatus::Pending,
            error_message: None,
        }
    }
}

/// A partial update applied to an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPatch {
    pub status: AnalysisStatus,
    pub response_data: Option<BookSummary>,
    pub processing_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisPatch {
    pub fn completed(summary: BookSummary, processing_time_ms: i64) -> Self {
        Self {
            status: AnalysisStatus::Completed,
            response_data: Some(summary),
            processing_time_ms: Some(processing_time_ms),
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Failed,
            response_data: None,
            processing_time_ms: None,
            error_message: Some(error_message.into()),
            updated_at: Utc::now(),
        }
    }
}
