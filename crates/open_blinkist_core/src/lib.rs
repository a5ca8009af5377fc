pub mod carousel;
pub mod controller;
pub mod domain;
pub mod ports;
pub mod speech;

pub use carousel::{Carousel, DragState, NavKey, SWIPE_THRESHOLD};
pub use controller::{
    Controller, PendingRequest, RequestFailure, Step, SubmitOutcome, ViewMode, ViewState,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use domain::{
    AnalysisPatch, AnalysisRecord, AnalysisStatus, BookSummary, KeyInsight, SummaryRequest,
    DEFAULT_NUM_INSIGHTS, DEFAULT_ROLE,
};
pub use ports::{
    AnalysisRepository, Clock, PortError, PortResult, SpeechEngine, SpeechEvent, SpeechListener,
    SummarizationService, SystemClock, Utterance,
};
pub use speech::{format_summary_for_audio, PlayOutcome, PlaybackState, SpeechPlayer};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a state mutex. A panic elsewhere never leaves the view state half
/// written, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
