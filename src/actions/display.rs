//! Monitor handshake: power-cycles one display output to renegotiate a stuck
//! external signal. Uses xrandr with a settle delay after each toggle so the
//! sink has time to re-sync.

use std::process::Command;
use std::time::Duration;

use tracing::{info, warn};

use super::{ActionError, MonitorHandshake};

/// xrandr-based display power cycle: output off → settle → auto → settle.
pub struct DisplayPowerCycle {
    output: String,
    settle: Duration,
    /// Cached probe result from construction time.
    xrandr_available: bool,
}

impl DisplayPowerCycle {
    pub fn new(output: String, settle: Duration) -> Self {
        let xrandr_available = probe_command("xrandr");
        if !xrandr_available {
            warn!("xrandr not found, monitor handshake will be unavailable");
        }
        Self {
            output,
            settle,
            xrandr_available,
        }
    }

    fn xrandr(&self, args: &[&str]) -> Result<(), ActionError> {
        let output = Command::new("xrandr")
            .args(args)
            .output()
            .map_err(|e| ActionError::HandshakeFailed(format!("xrandr exec: {e}")))?;
        if !output.status.success() {
            return Err(ActionError::HandshakeFailed(format!(
                "xrandr {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl MonitorHandshake for DisplayPowerCycle {
    fn execute(&self) -> Result<(), ActionError> {
        if !self.xrandr_available {
            return Err(ActionError::HandshakeFailed("xrandr not found".into()));
        }

        info!(output = %self.output, "monitor handshake started");
        self.xrandr(&["--output", &self.output, "--off"])?;
        std::thread::sleep(self.settle);
        self.xrandr(&["--output", &self.output, "--auto"])?;
        std::thread::sleep(self.settle);
        info!("monitor handshake complete");
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
