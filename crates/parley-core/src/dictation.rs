//! Speech capture backends.
//!
//! Capture is optional. [`select_capture`] probes the configured transcriber
//! at runtime and falls back to [`UnsupportedCapture`], which refuses to
//! start so the caller can show a notice.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Environment variable carrying the recognition locale to the transcriber
pub const LOCALE_ENV: &str = "PARLEY_DICTATION_LOCALE";

/// Default recognition locale
pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Error, Debug)]
pub enum DictationError {
    #[error("Speech recognition is not supported on this system.")]
    Unsupported,

    #[error("dictation is already running")]
    AlreadyListening,

    #[error("failed to start transcriber `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcriber produced no output stream")]
    NoOutput,
}

/// Events emitted by a capture backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    Started,
    /// One finalized utterance
    Transcript(String),
    Stopped,
    Error(String),
}

/// Dictation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictationConfig {
    /// External transcriber; each stdout line is one transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            locale: default_locale(),
        }
    }
}

/// Minimal capability surface for speech capture
pub trait SpeechCapture: Send {
    fn is_supported(&self) -> bool;

    fn start(&mut self) -> Result<(), DictationError>;

    fn stop(&mut self) -> Result<(), DictationError>;

    fn is_listening(&self) -> bool;
}

/// Stub used when no transcriber is available
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCapture;

impl SpeechCapture for UnsupportedCapture {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), DictationError> {
        Err(DictationError::Unsupported)
    }

    fn stop(&mut self) -> Result<(), DictationError> {
        Ok(())
    }

    fn is_listening(&self) -> bool {
        false
    }
}

/// Runs an external transcriber process and forwards its output lines
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
    locale: String,
    events: UnboundedSender<DictationEvent>,
    /// Live flag of the current session; each start gets a fresh one
    session: Option<Arc<AtomicBool>>,
    child: Option<Child>,
}

impl CommandCapture {
    pub fn new(config: &DictationConfig, program: impl Into<String>, events: UnboundedSender<DictationEvent>) -> Self {
        Self {
            program: program.into(),
            args: config.args.clone(),
            locale: config.locale.clone(),
            events,
            session: None,
            child: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechCapture for CommandCapture {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<(), DictationError> {
        if self.is_listening() {
            return Err(DictationError::AlreadyListening);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(LOCALE_ENV, &self.locale)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DictationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(DictationError::NoOutput)?;
        let listening = Arc::new(AtomicBool::new(true));
        self.session = Some(Arc::clone(&listening));
        self.child = Some(child);
        let _ = self.events.send(DictationEvent::Started);
        info!(program = %self.program, locale = %self.locale, "Dictation started");

        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if !listening.load(Ordering::SeqCst) {
                            break;
                        }
                        debug!(chars = line.chars().count(), "Transcript received");
                        if events.send(DictationEvent::Transcript(line.to_string())).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Transcriber output error: {}", e);
                        let _ = events.send(DictationEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            if listening.swap(false, Ordering::SeqCst) {
                let _ = events.send(DictationEvent::Stopped);
            }
        });

        Ok(())
    }

    fn stop(&mut self) -> Result<(), DictationError> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Transcriber already exited: {}", e);
            }
        }
        if let Some(listening) = self.session.take() {
            if listening.swap(false, Ordering::SeqCst) {
                let _ = self.events.send(DictationEvent::Stopped);
                info!("Dictation stopped");
            }
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|listening| listening.load(Ordering::SeqCst))
    }
}

impl Drop for CommandCapture {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

/// Pick the capture backend for this system
pub fn select_capture(config: &DictationConfig, events: UnboundedSender<DictationEvent>) -> Box<dyn SpeechCapture> {
    let Some(command) = config.command.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
        debug!("No transcriber configured, dictation disabled");
        return Box::new(UnsupportedCapture);
    };

    match which::which(command) {
        Ok(path) => {
            info!(program = %path.display(), "Dictation backend available");
            Box::new(CommandCapture::new(config, path.to_string_lossy(), events))
        }
        Err(e) => {
            warn!(program = command, "Transcriber not found, dictation disabled: {}", e);
            Box::new(UnsupportedCapture)
        }
    }
}
