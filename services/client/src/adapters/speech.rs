//! services/client/src/adapters/speech.rs
//!
//! This module contains the adapter for the host's text-to-speech program.
//! It implements the `SpeechEngine` port from the `core` crate by running an
//! `espeak`-compatible command for each utterance.

use open_blinkist_core::ports::{PortError, PortResult, SpeechEngine, SpeechEvent, SpeechListener, Utterance};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// `espeak`'s default speaking rate in words per minute.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechEngine` port with an external command.
pub struct CommandSpeechEngine {
    program: String,
    active: Mutex<Option<CancellationToken>>,
}

impl CommandSpeechEngine {
    /// Creates a new `CommandSpeechEngine` running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            active: Mutex::new(None),
        }
    }

    /// Maps the utterance settings onto `espeak` arguments.
    fn arguments(utterance: &Utterance) -> Vec<String> {
        let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate).round() as u32;
        let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
        let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;
        vec![
            "-s".to_string(),
            words_per_minute.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            utterance.text.clone(),
        ]
    }

    fn resolve(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }

    fn replace_active(&self, token: Option<CancellationToken>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *active, token) {
            previous.cancel();
        }
    }
}

//=========================================================================================
// `SpeechEngine` Trait Implementation
//=========================================================================================

impl SpeechEngine for CommandSpeechEngine {
    fn is_supported(&self) -> bool {
        self.resolve().is_some()
    }

    /// Spawns the speech command and reports its lifecycle to `listener`.
    /// Must be called from within a Tokio runtime.
    fn speak(&self, utterance: Utterance, listener: SpeechListener) -> PortResult<()> {
        let program = self
            .resolve()
            .ok_or_else(|| PortError::Unsupported("Speech synthesis".to_string()))?;

        let mut child = Command::new(&program)
            .args(Self::arguments(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PortError::Unexpected(format!("Failed to start {}: {}", program.display(), e)))?;

        let token = CancellationToken::new();
        self.replace_active(Some(token.clone()));
        listener(SpeechEvent::Started);

        tokio::spawn(async move {
            let cancelled = tokio::select! {
                _ = token.cancelled() => true,
                status = child.wait() => {
                    match status {
                        Ok(status) if status.success() => listener(SpeechEvent::Ended),
                        Ok(status) => listener(SpeechEvent::Failed(format!("speech command exited with {}", status))),
                        Err(e) => listener(SpeechEvent::Failed(e.to_string())),
                    }
                    false
                }
            };
            if cancelled {
                debug!("Speech cancelled; stopping the speech command.");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop the speech command: {}", e);
                }
            }
        });
        Ok(())
    }

    fn cancel(&self) {
        self.replace_active(None);
    }
}
