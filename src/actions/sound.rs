//! Sound playback: fire-and-forget via an external player process. The call
//! returns immediately; the player runs on its own detached thread so the
//! orchestrator never waits on audio output.

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use super::{ActionError, SoundPlayback};

/// Plays wav files through `aplay`. Missing file or player is logged and
/// reported; nothing here is load-bearing for activation.
pub struct AplaySoundPlayback {
    player_available: bool,
}

impl AplaySoundPlayback {
    pub fn new() -> Self {
        let player_available = probe_command("aplay");
        if !player_available {
            warn!("aplay not found, acknowledgment sounds disabled");
        }
        Self { player_available }
    }
}

impl Default for AplaySoundPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundPlayback for AplaySoundPlayback {
    fn play(&self, path: &Path) -> Result<(), ActionError> {
        if !self.player_available {
            return Err(ActionError::SoundUnavailable("aplay not found".into()));
        }
        if !path.exists() {
            warn!(path = %path.display(), "sound file missing, skipping playback");
            return Err(ActionError::SoundUnavailable(format!(
                "file missing: {}",
                path.display()
            )));
        }

        let path = path.to_path_buf();
        std::thread::spawn(move || {
            match Command::new("aplay").arg("-q").arg(&path).output() {
                Ok(out) if out.status.success() => {
                    debug!(path = %path.display(), "sound played");
                }
                Ok(out) => {
                    warn!(
                        path = %path.display(),
                        stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                        "player exited nonzero"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "player exec failed");
                }
            }
        });
        Ok(())
    }
}

/// Probe whether a command is available on PATH.
fn probe_command(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
