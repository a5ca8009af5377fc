//! crates/open_blinkist_core/src/controller.rs
//!
//! The request/presentation controller. It owns the view state machine,
//! issues summarization requests with a bounded timeout, mirrors every
//! request/response cycle into the analysis repository, and drives the
//! carousel and the speech player.
//!
//! View modes:
//! - Input:   `step == Input`
//! - Loading: `step == Summary`, `loading`, no summary yet
//! - Summary: `step == Summary`, summary present

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::carousel::{Carousel, NavKey};
use crate::domain::{AnalysisPatch, AnalysisRecord, BookSummary, SummaryRequest};
use crate::lock;
use crate::ports::{
    AnalysisRepository, Clock, PortError, PortResult, SpeechEngine, SummarizationService,
    SystemClock,
};
use crate::speech::{format_summary_for_audio, PlayOutcome, PlaybackState, SpeechPlayer};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

//=========================================================================================
// View State
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Input,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Input,
    Loading,
    Summary,
}

/// Everything the front end needs to draw the current screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub step: Step,
    pub loading: bool,
    pub error: Option<String>,
    pub book_summary: Option<BookSummary>,
    pub carousel: Carousel,
    pub is_playing: bool,
    pub audio_loading: bool,
    pub analysis_id: Option<i64>,
}

impl ViewState {
    pub fn mode(&self) -> ViewMode {
        match (self.step, &self.book_summary) {
            (Step::Input, _) => ViewMode::Input,
            (Step::Summary, Some(_)) => ViewMode::Summary,
            (Step::Summary, None) => ViewMode::Loading,
        }
    }
}

//=========================================================================================
// Outcomes and Failure Classification
//=========================================================================================

/// Why a summarization request did not produce a summary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestFailure {
    #[error("Request timed out. The server may be busy, please try again.")]
    Timeout,
    #[error("Network error. Please check your connection and try again.")]
    Network,
    #[error("Failed to generate book summary. The book may not be found or the service is unavailable.")]
    Remote,
    #[error("{0}")]
    Other(String),
    #[error("Request cancelled.")]
    Cancelled,
}

impl From<PortError> for RequestFailure {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Timeout => RequestFailure::Timeout,
            PortError::Network(_) => RequestFailure::Network,
            PortError::Remote { .. } => RequestFailure::Remote,
            PortError::Unexpected(message) => RequestFailure::Other(message),
            other => RequestFailure::Other(other.to_string()),
        }
    }
}

/// A request that has put the view into Loading and is waiting to be sent.
#[derive(Debug)]
pub struct PendingRequest {
    request: SummaryRequest,
    cancel: CancellationToken,
    started: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened: empty title, nothing to retry, or a request is in flight.
    Ignored,
    Completed,
    Failed(String),
    /// `reset` aborted the request before it finished.
    Cancelled,
}

//=========================================================================================
// Controller
//=========================================================================================

pub struct Controller {
    summarizer: Arc<dyn SummarizationService>,
    repository: Arc<dyn AnalysisRepository>,
    clock: Arc<dyn Clock>,
    player: SpeechPlayer,
    state: Arc<Mutex<ViewState>>,
    last_request: Mutex<Option<SummaryRequest>>,
    in_flight: Mutex<Option<CancellationToken>>,
    request_timeout: Duration,
    user_agent: Option<String>,
}

impl Controller {
    pub fn new(
        summarizer: Arc<dyn SummarizationService>,
        repository: Arc<dyn AnalysisRepository>,
        speech: Arc<dyn SpeechEngine>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ViewState::default()));
        let error_target = Arc::clone(&state);
        let player = SpeechPlayer::new(speech).with_error_hook(move |message| {
            lock(&error_target).error = Some(message);
        });
        Self {
            summarizer,
            repository,
            clock: Arc::new(SystemClock),
            player,
            state,
            last_request: Mutex::new(None),
            in_flight: Mutex::new(None),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// A copy of the current view, with playback flags read from the player.
    pub fn snapshot(&self) -> ViewState {
        let mut view = lock(&self.state).clone();
        let playback = self.player.state();
        view.is_playing = playback == PlaybackState::Playing;
        view.audio_loading = playback == PlaybackState::Loading;
        view
    }

    pub fn last_request(&self) -> Option<SummaryRequest> {
        lock(&self.last_request).clone()
    }

    // --- Request Lifecycle ---

    /// Runs one summarization request end to end.
    pub async fn submit(&self, request: SummaryRequest) -> SubmitOutcome {
        match self.begin(request) {
            Some(pending) => self.complete(pending).await,
            None => SubmitOutcome::Ignored,
        }
    }

    /// Switches the view to Loading for `request` without sending it yet.
    /// Returns `None` for a blank title or while another request is in flight.
    pub fn begin(&self, request: SummaryRequest) -> Option<PendingRequest> {
        if !request.is_submittable() {
            return None;
        }

        let cancel = {
            let mut view = lock(&self.state);
            if view.loading {
                warn!("Submit ignored: a request is already in flight.");
                return None;
            }
            view.loading = true;
            view.error = None;
            view.step = Step::Summary;
            view.book_summary = None;
            view.carousel = Carousel::default();
            view.analysis_id = None;

            let token = CancellationToken::new();
            *lock(&self.in_flight) = Some(token.clone());
            token
        };
        let started = self.clock.now();
        *lock(&self.last_request) = Some(request.clone());
        info!(
            "Requesting summary of '{}' for a {} ({} insights).",
            request.book_name, request.role, request.num_insights
        );
        Some(PendingRequest {
            request,
            cancel,
            started,
        })
    }

    /// Sends a request started with `begin` and settles the view.
    pub async fn complete(&self, pending: PendingRequest) -> SubmitOutcome {
        let PendingRequest {
            request,
            cancel,
            started,
        } = pending;

        let analysis_id = self.record_pending(&request).await;
        if analysis_id.is_some() && !cancel.is_cancelled() {
            lock(&self.state).analysis_id = analysis_id;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestFailure::Cancelled),
            outcome = tokio::time::timeout(self.request_timeout, self.summarizer.summarize(&request)) => {
                match outcome {
                    Ok(Ok(summary)) => Ok(summary),
                    Ok(Err(e)) => Err(RequestFailure::from(e)),
                    Err(_) => Err(RequestFailure::Timeout),
                }
            }
        };

        // A reset that lands after the call settled still wins over its result.
        let result = if cancel.is_cancelled() {
            Err(RequestFailure::Cancelled)
        } else {
            result
        };

        let outcome = match result {
            Ok(summary) => {
                let elapsed_ms = self.clock.now().saturating_duration_since(started).as_millis();
                let processing_time_ms = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
                info!(
                    "Summary of '{}' received in {} ms ({} insights).",
                    summary.book_name,
                    processing_time_ms,
                    summary.key_insights.len()
                );
                {
                    let mut view = lock(&self.state);
                    view.carousel = Carousel::new(summary.key_insights.len());
                    view.book_summary = Some(summary.clone());
                }
                if let Some(id) = analysis_id {
                    self.record_outcome(id, AnalysisPatch::completed(summary, processing_time_ms))
                        .await;
                }
                SubmitOutcome::Completed
            }
            Err(RequestFailure::Cancelled) => {
                info!("Summary request for '{}' was cancelled.", request.book_name);
                if let Some(id) = analysis_id {
                    self.record_outcome(id, AnalysisPatch::failed(RequestFailure::Cancelled.to_string()))
                        .await;
                }
                SubmitOutcome::Cancelled
            }
            Err(failure) => {
                let message = failure.to_string();
                error!("Summary request for '{}' failed: {}", request.book_name, message);
                if let Some(id) = analysis_id {
                    self.record_outcome(id, AnalysisPatch::failed(message.clone())).await;
                }
                let mut view = lock(&self.state);
                view.error = Some(message.clone());
                view.step = Step::Input;
                SubmitOutcome::Failed(message)
            }
        };

        // The loading guard keeps submits from overlapping, so the slot is ours.
        lock(&self.in_flight).take();
        lock(&self.state).loading = false;
        outcome
    }

    /// Replays the last submitted request. Always produces a new analysis record.
    pub async fn retry(&self) -> SubmitOutcome {
        match self.last_request() {
            Some(request) => self.submit(request).await,
            None => SubmitOutcome::Ignored,
        }
    }

    pub fn dismiss_error(&self) {
        lock(&self.state).error = None;
    }

    /// Returns to the input view from anywhere, aborting an in-flight request
    /// and stopping playback.
    pub fn reset(&self) {
        if let Some(token) = lock(&self.in_flight).take() {
            token.cancel();
        }
        {
            let mut view = lock(&self.state);
            view.step = Step::Input;
            view.book_summary = None;
            view.error = None;
            view.audio_loading = false;
            view.carousel = Carousel::default();
            view.analysis_id = None;
        }
        self.player.stop();
        debug!("View reset.");
    }

    /// Recent analyses, newest first.
    pub async fn history(&self, limit: i64) -> PortResult<Vec<AnalysisRecord>> {
        self.repository.list_recent(limit).await
    }

    async fn record_pending(&self, request: &SummaryRequest) -> Option<i64> {
        let record =
            AnalysisRecord::pending(request, self.summarizer.endpoint(), self.user_agent.clone());
        match self.repository.create(record).await {
            Ok(saved) => {
                if saved.id.is_none() {
                    warn!("Analysis record was saved without an id; its outcome won't be recorded.");
                }
                saved.id
            }
            Err(e) => {
                warn!("Failed to save pending analysis: {}", e);
                None
            }
        }
    }

    async fn record_outcome(&self, id: i64, patch: AnalysisPatch) {
        let status = patch.status;
        if let Err(e) = self.repository.update(id, patch).await {
            warn!("Failed to mark analysis {} as {}: {}", id, status, e);
        }
    }

    // --- Carousel ---

    fn navigate(&self, f: impl FnOnce(&mut Carousel) -> bool) -> bool {
        let mut view = lock(&self.state);
        if view.mode() != ViewMode::Summary {
            return false;
        }
        f(&mut view.carousel)
    }

    pub fn next_insight(&self) -> bool {
        self.navigate(Carousel::next)
    }

    pub fn prev_insight(&self) -> bool {
        self.navigate(Carousel::prev)
    }

    pub fn go_to_insight(&self, index: usize) -> bool {
        self.navigate(|c| c.go_to(index))
    }

    pub fn handle_key(&self, key: NavKey) -> bool {
        self.navigate(|c| c.handle_key(key))
    }

    pub fn drag_start(&self, x: f64) {
        self.navigate(|c| {
            c.drag_start(x);
            false
        });
    }

    pub fn drag_move(&self, x: f64) {
        self.navigate(|c| {
            c.drag_move(x);
            false
        });
    }

    pub fn drag_end(&self) -> bool {
        self.navigate(Carousel::drag_end)
    }

    // --- Audio ---

    /// Reads the current summary aloud, or stops if it is already playing.
    /// Returns `None` when there is no summary to read.
    pub fn play_summary(&self) -> Option<PlayOutcome> {
        let text = {
            let view = lock(&self.state);
            format_summary_for_audio(view.book_summary.as_ref()?)
        };
        match self.player.play(&text) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Speech playback unavailable: {}", e);
                lock(&self.state).error = Some(e.to_string());
                None
            }
        }
    }

    pub fn stop_audio(&self) {
        self.player.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnalysisStatus;
    use crate::ports::{MockAnalysisRepository, MockSummarizationService, SpeechEvent};
    use crate::speech::tests::{atomic_habits, FakeEngine};
    use tokio::sync::Notify;

    const ENDPOINT: &str = "http://localhost:8080/summarize_book";

    fn request() -> SummaryRequest {
        SummaryRequest::new("Atomic Habits", "student", 3)
    }

    fn saved(id: i64, record: AnalysisRecord) -> AnalysisRecord {
        AnalysisRecord {
            id: Some(id),
            ..record
        }
    }

    fn summarizer_returning(result: PortResult<BookSummary>) -> MockSummarizationService {
        let mut summarizer = MockSummarizationService::new();
        summarizer.expect_endpoint().returning(|| ENDPOINT.to_string());
        summarizer
            .expect_summarize()
            .times(1)
            .returning(move |_| result.clone());
        summarizer
    }

    /// Expects one pending create (assigned `id`) and one update to `status`.
    fn repository_expecting(id: i64, status: AnalysisStatus) -> MockAnalysisRepository {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .withf(|record| record.status == AnalysisStatus::Pending && record.api_endpoint == ENDPOINT)
            .returning(move |record| Ok(saved(id, record)));
        repository
            .expect_update()
            .times(1)
            .withf(move |got_id, patch| *got_id == id && patch.status == status)
            .returning(|id, patch| {
                Ok(AnalysisRecord {
                    id: Some(id),
                    status: patch.status,
                    error_message: patch.error_message,
                    ..AnalysisRecord::pending(&request(), ENDPOINT, None)
                })
            });
        repository
    }

    fn controller(
        summarizer: MockSummarizationService,
        repository: MockAnalysisRepository,
    ) -> (Controller, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::default());
        let controller = Controller::new(Arc::new(summarizer), Arc::new(repository), engine.clone());
        (controller, engine)
    }

    async fn summary_view() -> (Controller, Arc<FakeEngine>) {
        let (controller, engine) = controller(
            summarizer_returning(Ok(atomic_habits())),
            repository_expecting(7, AnalysisStatus::Completed),
        );
        assert_eq!(controller.submit(request()).await, SubmitOutcome::Completed);
        (controller, engine)
    }

    /// A summarizer that parks until released, so tests can look at the view
    /// while a request is in flight.
    struct GatedSummarizer {
        entered: Notify,
        release: Notify,
        result: PortResult<BookSummary>,
    }

    #[async_trait::async_trait]
    impl SummarizationService for GatedSummarizer {
        async fn summarize(&self, _request: &SummaryRequest) -> PortResult<BookSummary> {
            self.entered.notify_one();
            self.release.notified().await;
            self.result.clone()
        }

        fn endpoint(&self) -> String {
            ENDPOINT.to_string()
        }
    }

    struct StepClock {
        base: Instant,
        calls: Mutex<u64>,
    }

    impl Clock for StepClock {
        // Each reading is 250 ms after the previous one.
        fn now(&self) -> Instant {
            let mut calls = self.calls.lock().unwrap();
            let now = self.base + Duration::from_millis(250 * *calls);
            *calls += 1;
            now
        }
    }

    #[tokio::test]
    async fn successful_submit_lands_on_the_first_insight() {
        let (controller, _engine) = summary_view().await;

        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Summary);
        assert!(!view.loading);
        assert_eq!(view.error, None);
        assert_eq!(view.carousel.current_index(), 0);
        assert_eq!(view.carousel.position_label(), "1 OF 3");
        assert_eq!(view.analysis_id, Some(7));
        let text = format_summary_for_audio(view.book_summary.as_ref().unwrap());
        assert!(text.starts_with("Atomic Habits by James Clear. "));
    }

    #[tokio::test]
    async fn completed_record_carries_payload_and_duration() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|record| Ok(saved(1, record)));
        repository
            .expect_update()
            .times(1)
            .withf(|id, patch| {
                *id == 1
                    && patch.status == AnalysisStatus::Completed
                    && patch.response_data == Some(atomic_habits())
                    && patch.processing_time_ms == Some(250)
                    && patch.error_message.is_none()
            })
            .returning(|id, _| {
                Ok(AnalysisRecord {
                    id: Some(id),
                    ..AnalysisRecord::pending(&request(), ENDPOINT, None)
                })
            });
        let clock = Arc::new(StepClock {
            base: Instant::now(),
            calls: Mutex::new(0),
        });
        let (controller, _) = controller(summarizer_returning(Ok(atomic_habits())), repository);
        let controller = controller.with_clock(clock);

        assert_eq!(controller.submit(request()).await, SubmitOutcome::Completed);
    }

    #[tokio::test]
    async fn pending_record_carries_request_inputs_and_user_agent() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .withf(|record| {
                record.book_name == "Atomic Habits"
                    && record.role == "student"
                    && record.num_insights == 3
                    && record.user_agent.as_deref() == Some("open-blinkist-test")
            })
            .returning(|record| Ok(saved(3, record)));
        repository
            .expect_update()
            .times(1)
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        let (controller, _) = controller(summarizer_returning(Ok(atomic_habits())), repository);
        let controller = controller.with_user_agent("open-blinkist-test");

        controller.submit(request()).await;
    }

    #[tokio::test]
    async fn blank_titles_are_ignored_without_any_calls() {
        let mut summarizer = MockSummarizationService::new();
        summarizer.expect_summarize().never();
        summarizer.expect_endpoint().never();
        let mut repository = MockAnalysisRepository::new();
        repository.expect_create().never();
        let (controller, _) = controller(summarizer, repository);

        for title in ["", "   ", "\t\n"] {
            let outcome = controller.submit(SummaryRequest::new(title, "student", 3)).await;
            assert_eq!(outcome, SubmitOutcome::Ignored);
        }
        assert_eq!(controller.snapshot(), ViewState::default());
        assert_eq!(controller.last_request(), None);
    }

    #[tokio::test]
    async fn remote_failure_returns_to_input_with_message() {
        let (controller, _) = controller(
            summarizer_returning(Err(PortError::Remote { status: 500 })),
            repository_expecting(9, AnalysisStatus::Failed),
        );

        let outcome = controller.submit(request()).await;
        let message = RequestFailure::Remote.to_string();
        assert_eq!(outcome, SubmitOutcome::Failed(message.clone()));

        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Input);
        assert_eq!(view.error, Some(message));
        assert!(view.book_summary.is_none());
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn failed_record_carries_the_classified_message() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|record| Ok(saved(4, record)));
        repository
            .expect_update()
            .times(1)
            .withf(|_, patch| {
                patch.status == AnalysisStatus::Failed
                    && patch.error_message.as_deref()
                        == Some("Network error. Please check your connection and try again.")
                    && patch.response_data.is_none()
            })
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        let (controller, _) = controller(
            summarizer_returning(Err(PortError::Network("connection refused".to_string()))),
            repository,
        );

        controller.submit(request()).await;
    }

    #[tokio::test]
    async fn unclassified_errors_surface_verbatim() {
        let (controller, _) = controller(
            summarizer_returning(Err(PortError::Unexpected("payload missing author".to_string()))),
            repository_expecting(2, AnalysisStatus::Failed),
        );

        controller.submit(request()).await;
        assert_eq!(controller.snapshot().error.as_deref(), Some("payload missing author"));
    }

    #[tokio::test]
    async fn slow_requests_time_out() {
        let gated = GatedSummarizer {
            entered: Notify::new(),
            release: Notify::new(),
            result: Ok(atomic_habits()),
        };
        let engine = Arc::new(FakeEngine::default());
        let controller = Controller::new(
            Arc::new(gated),
            Arc::new(repository_expecting(5, AnalysisStatus::Failed)),
            engine,
        )
        .with_request_timeout(Duration::from_millis(20));

        let outcome = controller.submit(request()).await;
        assert_eq!(outcome, SubmitOutcome::Failed(RequestFailure::Timeout.to_string()));
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Input);
        assert!(view.book_summary.is_none());
    }

    #[tokio::test]
    async fn persistence_failures_never_block_the_flow() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|_| Err(PortError::Unexpected("database unreachable".to_string())));
        repository.expect_update().never();
        let (controller, _) = controller(summarizer_returning(Ok(atomic_habits())), repository);

        assert_eq!(controller.submit(request()).await, SubmitOutcome::Completed);
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Summary);
        assert_eq!(view.error, None);
        assert_eq!(view.analysis_id, None);
    }

    #[tokio::test]
    async fn failed_outcome_update_is_swallowed() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|record| Ok(saved(8, record)));
        repository
            .expect_update()
            .times(1)
            .returning(|_, _| Err(PortError::NotFound("analysis 8".to_string())));
        let (controller, _) = controller(
            summarizer_returning(Err(PortError::Timeout)),
            repository,
        );

        let outcome = controller.submit(request()).await;
        assert_eq!(outcome, SubmitOutcome::Failed(RequestFailure::Timeout.to_string()));
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Request timed out. The server may be busy, please try again.")
        );
    }

    #[tokio::test]
    async fn view_switches_to_loading_before_the_request_resolves() {
        let gated = Arc::new(GatedSummarizer {
            entered: Notify::new(),
            release: Notify::new(),
            result: Ok(atomic_habits()),
        });
        let engine = Arc::new(FakeEngine::default());
        let controller = Arc::new(Controller::new(
            gated.clone(),
            Arc::new(repository_expecting(11, AnalysisStatus::Completed)),
            engine,
        ));

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(request()).await })
        };
        gated.entered.notified().await;

        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Loading);
        assert!(view.loading);
        assert_eq!(view.step, Step::Summary);

        // The submit control is disabled while loading.
        assert_eq!(controller.submit(request()).await, SubmitOutcome::Ignored);

        gated.release.notify_one();
        assert_eq!(task.await.unwrap(), SubmitOutcome::Completed);
        assert!(!controller.snapshot().loading);
    }

    #[tokio::test]
    async fn begin_shows_loading_before_anything_is_sent() {
        let mut summarizer = MockSummarizationService::new();
        summarizer.expect_endpoint().returning(|| ENDPOINT.to_string());
        summarizer
            .expect_summarize()
            .returning(|_| Ok(atomic_habits()));
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|record| Ok(saved(13, record)));
        repository
            .expect_update()
            .times(1)
            .withf(|_, patch| patch.error_message.as_deref() == Some("Request cancelled."))
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        let (controller, _) = controller(summarizer, repository);

        let pending = controller.begin(request()).unwrap();
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Loading);
        assert!(view.loading);
        assert!(controller.begin(request()).is_none());
        assert_eq!(controller.last_request(), Some(request()));

        controller.reset();
        assert_eq!(controller.complete(pending).await, SubmitOutcome::Cancelled);
        assert!(!controller.snapshot().loading);
    }

    #[tokio::test]
    async fn reset_aborts_an_in_flight_request() {
        let gated = Arc::new(GatedSummarizer {
            entered: Notify::new(),
            release: Notify::new(),
            result: Ok(atomic_habits()),
        });
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|record| Ok(saved(12, record)));
        repository
            .expect_update()
            .times(1)
            .withf(|id, patch| {
                *id == 12
                    && patch.status == AnalysisStatus::Failed
                    && patch.error_message.as_deref() == Some("Request cancelled.")
            })
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        let controller = Arc::new(Controller::new(
            gated.clone(),
            Arc::new(repository),
            Arc::new(FakeEngine::default()),
        ));

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(request()).await })
        };
        gated.entered.notified().await;
        controller.reset();
        gated.release.notify_one();

        assert_eq!(task.await.unwrap(), SubmitOutcome::Cancelled);
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Input);
        assert!(view.book_summary.is_none());
        assert_eq!(view.error, None);
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn retry_replays_the_last_request_as_a_new_record() {
        let mut summarizer = MockSummarizationService::new();
        summarizer.expect_endpoint().returning(|| ENDPOINT.to_string());
        let mut calls = 0;
        summarizer
            .expect_summarize()
            .times(2)
            .withf(|req| req.book_name == "Atomic Habits")
            .returning(move |_| {
                calls += 1;
                if calls == 1 {
                    Err(PortError::Network("reset by peer".to_string()))
                } else {
                    Ok(atomic_habits())
                }
            });
        let mut repository = MockAnalysisRepository::new();
        let mut next_id = 0;
        repository.expect_create().times(2).returning(move |record| {
            next_id += 1;
            Ok(saved(next_id, record))
        });
        repository
            .expect_update()
            .times(1)
            .withf(|id, patch| *id == 1 && patch.status == AnalysisStatus::Failed)
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        repository
            .expect_update()
            .times(1)
            .withf(|id, patch| *id == 2 && patch.status == AnalysisStatus::Completed)
            .returning(|id, _| Ok(saved(id, AnalysisRecord::pending(&request(), ENDPOINT, None))));
        let (controller, _) = controller(summarizer, repository);

        assert!(matches!(controller.submit(request()).await, SubmitOutcome::Failed(_)));
        assert_eq!(controller.retry().await, SubmitOutcome::Completed);
        assert_eq!(controller.snapshot().analysis_id, Some(2));
    }

    #[tokio::test]
    async fn retry_without_history_is_ignored() {
        let (controller, _) = controller(MockSummarizationService::new(), MockAnalysisRepository::new());
        assert_eq!(controller.retry().await, SubmitOutcome::Ignored);
    }

    #[tokio::test]
    async fn dismiss_error_keeps_the_step() {
        let (controller, _) = controller(
            summarizer_returning(Err(PortError::Remote { status: 404 })),
            repository_expecting(1, AnalysisStatus::Failed),
        );
        controller.submit(request()).await;

        controller.dismiss_error();
        let view = controller.snapshot();
        assert_eq!(view.error, None);
        assert_eq!(view.step, Step::Input);
    }

    #[tokio::test]
    async fn carousel_navigation_through_the_controller() {
        let (controller, _) = summary_view().await;

        assert!(controller.next_insight());
        assert!(controller.next_insight());
        assert!(!controller.next_insight());
        assert_eq!(controller.snapshot().carousel.position_label(), "3 OF 3");

        assert!(controller.handle_key(NavKey::Left));
        assert!(controller.go_to_insight(0));
        assert!(!controller.prev_insight());

        controller.drag_start(400.0);
        controller.drag_move(350.0);
        controller.drag_move(250.0);
        assert_eq!(controller.snapshot().carousel.drag().drag_offset, -150.0);
        assert!(controller.drag_end());
        let view = controller.snapshot();
        assert_eq!(view.carousel.current_index(), 1);
        assert_eq!(view.carousel.drag().drag_offset, 0.0);
    }

    #[tokio::test]
    async fn navigation_is_inert_outside_the_summary_view() {
        let (controller, _) = controller(MockSummarizationService::new(), MockAnalysisRepository::new());
        assert!(!controller.next_insight());
        assert!(!controller.handle_key(NavKey::Right));
        controller.drag_start(0.0);
        controller.drag_move(-300.0);
        assert!(!controller.drag_end());
        assert_eq!(controller.snapshot(), ViewState::default());
    }

    #[tokio::test]
    async fn play_summary_reads_the_formatted_text() {
        let (controller, engine) = summary_view().await;

        assert_eq!(controller.play_summary(), Some(PlayOutcome::Started));
        assert!(controller.snapshot().audio_loading);
        engine.fire_latest(SpeechEvent::Started);
        assert!(controller.snapshot().is_playing);

        let spoken = engine.spoken.lock().unwrap()[0].text.clone();
        assert_eq!(spoken, format_summary_for_audio(&atomic_habits()));

        assert_eq!(controller.play_summary(), Some(PlayOutcome::Stopped));
        assert!(!controller.snapshot().is_playing);
    }

    #[tokio::test]
    async fn playback_errors_show_as_a_banner_without_leaving_the_summary() {
        let (controller, engine) = summary_view().await;
        controller.play_summary();
        engine.fire_latest(SpeechEvent::Failed("audio device busy".to_string()));

        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Summary);
        assert_eq!(view.error.as_deref(), Some("Speech playback failed: audio device busy"));
        assert!(!view.is_playing);
    }

    #[tokio::test]
    async fn unsupported_speech_is_a_non_fatal_banner() {
        let engine = Arc::new(FakeEngine {
            unsupported: true,
            ..FakeEngine::default()
        });
        let controller = Controller::new(
            Arc::new(summarizer_returning(Ok(atomic_habits()))),
            Arc::new(repository_expecting(1, AnalysisStatus::Completed)),
            engine,
        );
        controller.submit(request()).await;

        assert_eq!(controller.play_summary(), None);
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Summary);
        assert_eq!(
            view.error.as_deref(),
            Some("Speech synthesis not supported on this platform")
        );
    }

    #[tokio::test]
    async fn play_without_a_summary_does_nothing() {
        let (controller, engine) = controller(MockSummarizationService::new(), MockAnalysisRepository::new());
        assert_eq!(controller.play_summary(), None);
        assert!(engine.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_while_playing_stops_audio_and_clears_the_view() {
        let (controller, engine) = summary_view().await;
        controller.next_insight();
        controller.play_summary();
        engine.fire_latest(SpeechEvent::Started);
        assert!(controller.snapshot().is_playing);

        controller.reset();
        let view = controller.snapshot();
        assert_eq!(view.mode(), ViewMode::Input);
        assert!(!view.is_playing);
        assert!(!view.audio_loading);
        assert!(view.book_summary.is_none());
        assert_eq!(view.error, None);
        assert_eq!(view.carousel.current_index(), 0);
        assert_eq!(view.carousel.drag().drag_offset, 0.0);
        assert_eq!(view.analysis_id, None);
        assert!(engine.cancel_count() >= 2);
    }

    #[tokio::test]
    async fn stop_audio_when_idle_is_a_no_op() {
        let (controller, _) = summary_view().await;
        let before = controller.snapshot();
        controller.stop_audio();
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test]
    async fn history_comes_from_the_repository() {
        let mut repository = MockAnalysisRepository::new();
        repository
            .expect_list_recent()
            .withf(|limit| *limit == 50)
            .times(1)
            .returning(|_| Ok(vec![saved(1, AnalysisRecord::pending(&request(), ENDPOINT, None))]));
        let (controller, _) = controller(MockSummarizationService::new(), repository);

        let records = controller.history(50).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, Some(1));
    }
}
