//! crates/open_blinkist_core/src/speech.rs
//!
//! A single-utterance player on top of the `SpeechEngine` port, and the
//! function that turns a summary into the text it reads aloud.

use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::domain::BookSummary;
use crate::lock;
use crate::ports::{PortError, PortResult, SpeechEngine, SpeechEvent, SpeechListener, Utterance};

pub const SPEECH_RATE: f32 = 0.9;
pub const SPEECH_PITCH: f32 = 1.0;
pub const SPEECH_VOLUME: f32 = 1.0;

/// Builds the narration for a summary. The ordering here is what listeners
/// hear, so it must stay stable.
pub fn format_summary_for_audio(summary: &BookSummary) -> String {
    let mut text = format!("{} by {}. ", summary.book_name, summary.author);
    if let Some(theme) = &summary.key_theme {
        text.push_str(&format!("{}. ", theme));
    }
    for (index, insight) in summary.key_insights.iter().enumerate() {
        text.push_str(&format!("Insight {}: {}. ", index + 1, insight.heading));
        for point in &insight.bullet_points {
            text.push_str(&format!("{}. ", point));
        }
        if let Some(application) = &insight.application {
            text.push_str(&format!("Application: {}. ", application));
        }
    }
    text
}

//=========================================================================================
// Player
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// Handed to the engine, start not yet confirmed.
    Loading,
    Playing,
}

/// What a call to `play` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// The player was already playing, so the press stopped it instead.
    Stopped,
}

type ErrorHook = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
struct PlayerInner {
    state: PlaybackState,
    // Bumped on every play/stop so events from superseded utterances are dropped.
    generation: u64,
}

pub struct SpeechPlayer {
    engine: Arc<dyn SpeechEngine>,
    inner: Arc<Mutex<PlayerInner>>,
    on_error: Option<ErrorHook>,
}

impl SpeechPlayer {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            inner: Arc::new(Mutex::new(PlayerInner::default())),
            on_error: None,
        }
    }

    /// Registers a callback that receives playback error messages.
    pub fn with_error_hook(mut self, hook: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.inner).state
    }

    /// Speaks `text`, or stops if something is already playing.
    pub fn play(&self, text: &str) -> PortResult<PlayOutcome> {
        if !self.engine.is_supported() {
            return Err(PortError::Unsupported("Speech synthesis".to_string()));
        }

        let (was_playing, generation) = {
            let mut inner = lock(&self.inner);
            let was_playing = inner.state == PlaybackState::Playing;
            inner.generation += 1;
            inner.state = if was_playing {
                PlaybackState::Idle
            } else {
                PlaybackState::Loading
            };
            (was_playing, inner.generation)
        };
        self.engine.cancel();

        if was_playing {
            debug!("Play pressed while playing; playback stopped.");
            return Ok(PlayOutcome::Stopped);
        }

        let utterance = Utterance {
            text: text.to_string(),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
            volume: SPEECH_VOLUME,
        };
        if let Err(e) = self.engine.speak(utterance, self.listener(generation)) {
            let mut inner = lock(&self.inner);
            if inner.generation == generation {
                inner.state = PlaybackState::Idle;
            }
            return Err(e);
        }
        Ok(PlayOutcome::Started)
    }

    /// Cancels playback. Safe from any state.
    pub fn stop(&self) {
        {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            inner.state = PlaybackState::Idle;
        }
        self.engine.cancel();
    }

    fn listener(&self, generation: u64) -> SpeechListener {
        let inner = Arc::clone(&self.inner);
        let on_error = self.on_error.clone();
        Box::new(move |event| {
            let mut guard = lock(&inner);
            if guard.generation != generation {
                return;
            }
            match event {
                SpeechEvent::Started => guard.state = PlaybackState::Playing,
                SpeechEvent::Ended => guard.state = PlaybackState::Idle,
                SpeechEvent::Failed(message) => {
                    guard.state = PlaybackState::Idle;
                    drop(guard);
                    warn!("Speech playback failed: {}", message);
                    if let Some(hook) = &on_error {
                        hook(format!("Speech playback failed: {}", message));
                    }
                }
            }
        })
    }
}
