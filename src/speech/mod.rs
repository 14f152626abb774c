//! Speech sensing channel.
//! An external recognizer worker is spawned once with a fixed vocabulary and
//! streams recognition results as JSON lines on stdout. A reader thread
//! classifies each phrase and pushes command events onto the orchestrator
//! channel. Wake confirmations are only forwarded while armed; the
//! fix-display phrases stay live in every state. If the worker cannot be
//! spawned or its stream ends, this channel degrades to permanently silent
//! and the amplitude channel keeps operating.

pub mod command;

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as cb;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::ActivationEvent;
use crate::state_machine::{ActivationState, StateMachine};
use command::{CommandClassifier, CommandEvent};

/// One recognition result from the worker.
#[derive(Debug, Clone)]
pub struct RecognizedPhrase {
    pub text: String,
    /// Recognizer confidence in [0, 1].
    pub confidence: f32,
    pub at: Instant,
}

#[derive(Debug)]
pub enum SpeechError {
    /// No recognizer command configured.
    NotConfigured,
    /// The worker process could not be started.
    Spawn(String),
    /// The worker's stdio pipes could not be wired up.
    Stdio(String),
}

impl std::fmt::Display for SpeechError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechError::NotConfigured => write!(f, "recognizer command not configured"),
            SpeechError::Spawn(msg) => write!(f, "recognizer spawn failed: {msg}"),
            SpeechError::Stdio(msg) => write!(f, "recognizer stdio failed: {msg}"),
        }
    }
}

/// First line sent to the worker: the grammar it should limit itself to.
#[derive(Debug, Serialize)]
struct WorkerConfig<'a> {
    vocabulary: &'a [String],
}

/// One stdout line from the worker.
#[derive(Debug, Deserialize)]
struct WorkerLine {
    text: String,
    confidence: f32,
}

/// Keeps the recognizer worker alive. Dropping kills the worker, which ends
/// the reader thread via EOF.
#[derive(Debug)]
pub struct SpeechHandle {
    child: Child,
    reader_thread: Option<std::thread::JoinHandle<()>>,
}

impl SpeechHandle {
    pub fn stop(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for SpeechHandle {
    fn drop(&mut self) {
        self.stop();
        let _ = self.child.wait();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the recognizer worker and the reader thread.
pub fn start_speech_pipeline(
    recognizer_command: &[String],
    classifier: CommandClassifier,
    state_machine: Arc<StateMachine>,
    events: cb::Sender<ActivationEvent>,
) -> Result<SpeechHandle, SpeechError> {
    let (program, args) = recognizer_command
        .split_first()
        .ok_or(SpeechError::NotConfigured)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| SpeechError::Spawn(e.to_string()))?;

    // Hand the worker its grammar before anything else.
    let vocabulary = classifier.vocabulary();
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| SpeechError::Stdio("no stdin pipe".into()))?;
    let config_line = serde_json::to_string(&WorkerConfig {
        vocabulary: &vocabulary,
    })
    .map_err(|e| SpeechError::Stdio(e.to_string()))?;
    writeln!(stdin, "{config_line}").map_err(|e| SpeechError::Stdio(e.to_string()))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SpeechError::Stdio("no stdout pipe".into()))?;

    let reader_thread = std::thread::Builder::new()
        .name("speech-sensing".into())
        .spawn(move || {
            // stdin must outlive the worker or it sees EOF and exits.
            let _stdin = stdin;
            run_reader_loop(stdout, classifier, state_machine, events);
        })
        .map_err(|e| SpeechError::Stdio(format!("failed to spawn reader thread: {e}")))?;

    info!(worker = %program, vocabulary = ?vocabulary, "speech channel started");

    Ok(SpeechHandle {
        child,
        reader_thread: Some(reader_thread),
    })
}

/// Read worker lines until EOF, classify, and forward command events.
fn run_reader_loop(
    stdout: std::process::ChildStdout,
    classifier: CommandClassifier,
    state_machine: Arc<StateMachine>,
    events: cb::Sender<ActivationEvent>,
) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "recognizer stream read failed, speech channel silent");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let parsed: WorkerLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "unparseable recognizer line skipped");
                continue;
            }
        };

        let phrase = RecognizedPhrase {
            text: parsed.text,
            confidence: parsed.confidence.clamp(0.0, 1.0),
            at: Instant::now(),
        };

        let Some(command) = classifier.classify(&phrase) else {
            continue;
        };

        // Wake matching belongs to the armed window only. The orchestrator
        // re-checks on its own thread; this gate just keeps the channel quiet
        // while the amplitude channel owns the decision.
        if command == CommandEvent::WakeWordConfirmed
            && state_machine.current() != ActivationState::ArmedAwaitingVoice
        {
            debug!("wake phrase heard outside arming window, dropped");
            continue;
        }

        if events
            .send(ActivationEvent::Command {
                command,
                at: phrase.at,
            })
            .is_err()
        {
            info!("event channel closed, speech loop exiting");
            return;
        }
    }
    warn!("recognizer stream ended, speech channel silent");
}
