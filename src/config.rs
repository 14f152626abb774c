//! Configuration: JSON file with per-field defaults.
//! Missing file → defaults are written to disk so there is something to edit.
//! Malformed file or out-of-range values → documented defaults with a warning;
//! configuration problems are never fatal. All values are immutable once loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default wake phrase.
const DEFAULT_WAKE_WORD: &str = "Jarvis";
/// Default RMS threshold on [-1.0, 1.0] normalized samples.
const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 0.5;
/// Default confidence floors for phrase matching.
const DEFAULT_WAKE_CONFIDENCE: f32 = 0.6;
const DEFAULT_COMMAND_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Phrase that confirms execution while armed.
    pub wake_word: String,
    /// RMS loudness above which a block counts as an impulse.
    pub amplitude_threshold: f32,
    /// Minimum recognizer confidence for the wake phrase (inclusive).
    pub wake_confidence: f32,
    /// Minimum recognizer confidence for command phrases (exclusive).
    pub command_confidence: f32,
    /// Minimum gap between two emitted impulses.
    pub debounce_ms: u64,
    /// Max gap after a first impulse before the pair count resets.
    pub impulse_window_ms: u64,
    /// How long the system stays armed waiting for the wake phrase.
    pub arm_timeout_ms: u64,
    /// Delay between confirmation and launch sequence start.
    pub preflight_delay_ms: u64,
    /// Gap between consecutive target launches.
    pub launch_stagger_ms: u64,
    /// Settle time after each display mode toggle.
    pub display_settle_ms: u64,
    /// Ordered launch targets, each resolved through the shell.
    pub launch_targets: Vec<String>,
    /// Acknowledgment sound file.
    pub ack_sound: PathBuf,
    /// Recognizer worker command line (program + args).
    pub recognizer_command: Vec<String>,
    /// Display output name used by the monitor handshake.
    pub display_output: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wake_word: DEFAULT_WAKE_WORD.to_string(),
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
            wake_confidence: DEFAULT_WAKE_CONFIDENCE,
            command_confidence: DEFAULT_COMMAND_CONFIDENCE,
            debounce_ms: 100,
            impulse_window_ms: 1000,
            arm_timeout_ms: 5000,
            preflight_delay_ms: 2000,
            launch_stagger_ms: 1000,
            display_settle_ms: 2000,
            launch_targets: vec!["xcalc".to_string()],
            ack_sound: PathBuf::from("assets/ack.wav"),
            recognizer_command: vec![
                "python3".to_string(),
                "stt-worker/worker.py".to_string(),
            ],
            display_output: "HDMI-1".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl Config {
    /// Load config from a JSON file. When the file is missing, the defaults
    /// are written there (best-effort) and returned. When the file is
    /// malformed, the defaults are returned with a warning.
    pub fn load_or_default(path: &Path) -> Config {
        if !path.exists() {
            let config = Config::default();
            match config.write_to_file(path) {
                Ok(()) => info!(path = %path.display(), "config file created with defaults"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            return config;
        }

        match Self::load_from_file(path) {
            Ok(config) => {
                info!(wake_word = %config.wake_word, "config loaded");
                config.sanitized()
            }
            Err(e) => {
                warn!(error = %e, "config load failed, using defaults");
                Config::default()
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp out-of-range values back to defaults, with a warning per field.
    fn sanitized(mut self) -> Config {
        if !(0.0..=1.0).contains(&self.amplitude_threshold) {
            warn!(
                value = self.amplitude_threshold,
                "amplitude_threshold out of [0,1], using default"
            );
            self.amplitude_threshold = DEFAULT_AMPLITUDE_THRESHOLD;
        }
        if !(0.0..=1.0).contains(&self.wake_confidence) {
            warn!(value = self.wake_confidence, "wake_confidence out of [0,1], using default");
            self.wake_confidence = DEFAULT_WAKE_CONFIDENCE;
        }
        if !(0.0..=1.0).contains(&self.command_confidence) {
            warn!(
                value = self.command_confidence,
                "command_confidence out of [0,1], using default"
            );
            self.command_confidence = DEFAULT_COMMAND_CONFIDENCE;
        }
        if self.wake_word.trim().is_empty() {
            warn!("wake_word is empty, using default");
            self.wake_word = DEFAULT_WAKE_WORD.to_string();
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn impulse_window(&self) -> Duration {
        Duration::from_millis(self.impulse_window_ms)
    }

    pub fn arm_timeout(&self) -> Duration {
        Duration::from_millis(self.arm_timeout_ms)
    }

    pub fn preflight_delay(&self) -> Duration {
        Duration::from_millis(self.preflight_delay_ms)
    }

    pub fn launch_stagger(&self) -> Duration {
        Duration::from_millis(self.launch_stagger_ms)
    }

    pub fn display_settle(&self) -> Duration {
        Duration::from_millis(self.display_settle_ms)
    }
}
