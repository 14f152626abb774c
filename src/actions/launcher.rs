//! Launch sequence: spawns each configured target as a detached process with
//! a fixed stagger between launches. One failed target is logged and skipped;
//! the sequence always runs to the end.

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{info, warn};

use super::{ActionError, LaunchSequence};

/// Shell-resolving process launcher. Targets are plain command lines so
/// config entries like `"code ~/projects"` work without manual tokenizing.
pub struct ProcessLaunchSequence {
    targets: Vec<String>,
    stagger: Duration,
}

impl ProcessLaunchSequence {
    pub fn new(targets: Vec<String>, stagger: Duration) -> Self {
        Self { targets, stagger }
    }

    fn spawn_target(&self, target: &str) -> Result<u32, ActionError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ActionError::LaunchFailed {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        Ok(child.id())
    }
}

impl LaunchSequence for ProcessLaunchSequence {
    fn execute(&self) -> Result<(), ActionError> {
        if self.targets.is_empty() {
            warn!("no launch targets configured");
            return Ok(());
        }

        info!(count = self.targets.len(), "launch sequence started");
        for (i, target) in self.targets.iter().enumerate() {
            match self.spawn_target(target) {
                Ok(pid) => info!(target = %target, pid = pid, "launched"),
                Err(e) => warn!(error = %e, "target skipped"),
            }
            // Stagger between launches to avoid display driver stutter.
            if i + 1 < self.targets.len() {
                std::thread::sleep(self.stagger);
            }
        }
        info!("launch sequence complete");
        Ok(())
    }
}
