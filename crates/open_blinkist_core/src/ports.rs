//! crates/open_blinkist_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, so the
//! controller never touches HTTP, the database, or the speech platform directly.

use async_trait::async_trait;
use std::time::Instant;

use crate::domain::{AnalysisPatch, AnalysisRecord, BookSummary, SummaryRequest};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("The request timed out")]
    Timeout,
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Remote service answered with status {status}")]
    Remote { status: u16 },
    #[error("{0} not supported on this platform")]
    Unsupported(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummarizationService: Send + Sync {
    /// Asks the remote API for a structured summary of a book.
    async fn summarize(&self, request: &SummaryRequest) -> PortResult<BookSummary>;

    /// The URL the summarize call is posted to, recorded with every analysis.
    fn endpoint(&self) -> String;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Inserts a record and returns it with its assigned id.
    async fn create(&self, record: AnalysisRecord) -> PortResult<AnalysisRecord>;

    /// Applies a partial update to the record with the given id.
    async fn update(&self, id: i64, patch: AnalysisPatch) -> PortResult<AnalysisRecord>;

    /// Most recent records first.
    async fn list_recent(&self, limit: i64) -> PortResult<Vec<AnalysisRecord>>;
}

/// Parameters of a single utterance handed to a speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Lifecycle notifications emitted by a speech engine for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Failed(String),
}

/// Callback a speech engine invokes for every lifecycle event of an utterance.
pub type SpeechListener = Box<dyn Fn(SpeechEvent) + Send + Sync + 'static>;

/// The platform's text-to-speech capability.
pub trait SpeechEngine: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Starts speaking. Events for this utterance are delivered to `listener`.
    fn speak(&self, utterance: Utterance, listener: SpeechListener) -> PortResult<()>;

    /// Stops whatever is being spoken. Must be safe to call when idle.
    fn cancel(&self);
}

/// Source of monotonic time for measuring request durations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
