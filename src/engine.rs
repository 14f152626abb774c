//! Orchestrator: both sensing channels push typed events onto one unbounded
//! channel, drained here by a single thread. That thread is the only writer
//! of activation state, so a double impulse and a concurrent wake phrase can
//! never race a transition. Blocking work (pre-flight delay, launch stagger,
//! handshake settles) is pushed to detached worker threads.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as cb;
use tracing::{debug, info, warn};

use crate::actions::{LaunchSequence, MonitorHandshake, SoundPlayback};
use crate::cancellation::TaskGeneration;
use crate::config::Config;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::speech::command::CommandEvent;
use crate::state_machine::{ActivationState, StateMachine};

/// Everything the orchestrator reacts to, in arrival order.
#[derive(Debug)]
pub enum ActivationEvent {
    /// The arming gesture completed.
    DoubleImpulse { at: Instant },
    /// A classified voice command.
    Command { command: CommandEvent, at: Instant },
    /// The arming window expired. Stamped with the generation that armed it;
    /// a stale generation is dropped without touching state.
    ArmTimeout { generation: u64 },
}

/// Create the event channel shared by all sensing channels.
pub fn event_channel() -> (cb::Sender<ActivationEvent>, cb::Receiver<ActivationEvent>) {
    cb::unbounded()
}

/// What the event loop must do after a handled event. Kept separate from
/// `handle_event` so the handler itself never blocks.
#[derive(Debug, PartialEq, Eq)]
enum Directive {
    Continue,
    /// Pre-flight delay, then launch sequence, then process exit.
    BeginLaunch,
    /// Monitor handshake on a worker thread.
    RunHandshake,
}

/// The activation orchestrator. Owns the state machine writes, the pending
/// timeout generation, and the once-per-process acknowledgment latch.
pub struct Engine {
    state_machine: Arc<StateMachine>,
    timeout_gen: TaskGeneration,
    metrics: Arc<MetricsRegistry>,
    launcher: Arc<dyn LaunchSequence>,
    handshake: Arc<dyn MonitorHandshake>,
    sound: Arc<dyn SoundPlayback>,
    events_tx: cb::Sender<ActivationEvent>,
    runtime: tokio::runtime::Handle,
    ack_sound: PathBuf,
    arm_timeout: Duration,
    preflight_delay: Duration,
    ack_played: bool,
    armed_at: Option<Instant>,
    launching: bool,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        state_machine: Arc<StateMachine>,
        metrics: Arc<MetricsRegistry>,
        launcher: Arc<dyn LaunchSequence>,
        handshake: Arc<dyn MonitorHandshake>,
        sound: Arc<dyn SoundPlayback>,
        events_tx: cb::Sender<ActivationEvent>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            state_machine,
            timeout_gen: TaskGeneration::new(),
            metrics,
            launcher,
            handshake,
            sound,
            events_tx,
            runtime,
            ack_sound: config.ack_sound.clone(),
            arm_timeout: config.arm_timeout(),
            preflight_delay: config.preflight_delay(),
            ack_played: false,
            armed_at: None,
            launching: false,
        }
    }

    /// Handle one event. Never blocks; returns what the loop should offload.
    fn handle_event(&mut self, event: ActivationEvent) -> Directive {
        if self.launching {
            debug!(?event, "event dropped, launch in progress");
            return Directive::Continue;
        }
        match event {
            ActivationEvent::DoubleImpulse { at } => self.on_double_impulse(at),
            ActivationEvent::Command {
                command: CommandEvent::WakeWordConfirmed,
                at,
            } => self.on_wake_confirmed(at),
            ActivationEvent::Command {
                command: CommandEvent::FixDisplayRequested,
                ..
            } => self.on_fix_display(),
            ActivationEvent::ArmTimeout { generation } => self.on_arm_timeout(generation),
        }
    }

    fn on_double_impulse(&mut self, at: Instant) -> Directive {
        match self.state_machine.current() {
            ActivationState::ArmedAwaitingVoice => {
                // No re-arming mid-sequence: the pending timeout keeps running.
                debug!("double impulse ignored while armed");
                Directive::Continue
            }
            ActivationState::Idle => {
                self.metrics.record(
                    metric_names::EVENT_QUEUE_WAIT,
                    at.elapsed().as_micros() as f64,
                );
                if self
                    .state_machine
                    .transition(ActivationState::ArmedAwaitingVoice)
                    .is_err()
                {
                    return Directive::Continue;
                }
                self.armed_at = Some(at);
                self.spawn_arm_timeout();
                info!(
                    timeout_ms = self.arm_timeout.as_millis() as u64,
                    "armed, awaiting wake phrase"
                );
                Directive::Continue
            }
        }
    }

    /// Schedule the arming timeout. Advancing the generation cancels any
    /// prior timeout first, so at most one is ever pending.
    fn spawn_arm_timeout(&self) {
        let (token, generation) = self.timeout_gen.cancel_and_advance();
        let tx = self.events_tx.clone();
        let timeout = self.arm_timeout;
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = tx.send(ActivationEvent::ArmTimeout { generation });
                }
            }
        });
    }

    fn on_wake_confirmed(&mut self, at: Instant) -> Directive {
        if self.state_machine.current() != ActivationState::ArmedAwaitingVoice {
            debug!("wake confirmation ignored while idle");
            return Directive::Continue;
        }
        // Consume the pending timeout first. A timeout that already fired and
        // is sitting in the queue now carries a stale generation.
        self.timeout_gen.cancel_and_advance();
        if let Some(armed_at) = self.armed_at.take() {
            self.metrics.record(
                metric_names::ARM_TO_CONFIRM,
                at.duration_since(armed_at).as_micros() as f64,
            );
        }
        self.play_ack_once();
        self.launching = true;
        info!("activation confirmed");
        Directive::BeginLaunch
    }

    fn on_fix_display(&mut self) -> Directive {
        self.play_ack_once();
        info!(state = %self.state_machine.current(), "fix display requested");
        Directive::RunHandshake
    }

    fn on_arm_timeout(&mut self, generation: u64) -> Directive {
        if generation != self.timeout_gen.current_generation() {
            debug!(generation, "stale arm timeout dropped");
            return Directive::Continue;
        }
        if self.state_machine.current() == ActivationState::ArmedAwaitingVoice {
            self.armed_at = None;
            let _ = self.state_machine.transition(ActivationState::Idle);
            info!("arming window expired, disarmed");
        }
        Directive::Continue
    }

    /// The acknowledgment sound plays at most once per process lifetime,
    /// whichever qualifying event comes first.
    fn play_ack_once(&mut self) {
        if self.ack_played {
            debug!("acknowledgment sound already played this run");
            return;
        }
        self.ack_played = true;
        if let Err(e) = self.sound.play(&self.ack_sound) {
            warn!(error = %e, "acknowledgment sound skipped");
        }
    }

    #[cfg(test)]
    fn timeout_generation(&self) -> u64 {
        self.timeout_gen.current_generation()
    }
}

/// Drain the event channel on a dedicated thread until every sender is gone.
/// Directives that involve blocking work are offloaded to detached workers;
/// a successful launch ends with an unconditional process exit.
pub fn run_event_loop(
    mut engine: Engine,
    rx: cb::Receiver<ActivationEvent>,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("activation-engine".into())
        .spawn(move || loop {
            match rx.recv() {
                Ok(event) => match engine.handle_event(event) {
                    Directive::Continue => {}
                    Directive::RunHandshake => {
                        let handshake = Arc::clone(&engine.handshake);
                        std::thread::spawn(move || {
                            if let Err(e) = handshake.execute() {
                                warn!(error = %e, "monitor handshake failed");
                            }
                        });
                    }
                    Directive::BeginLaunch => {
                        let launcher = Arc::clone(&engine.launcher);
                        let delay = engine.preflight_delay;
                        std::thread::spawn(move || {
                            info!(
                                delay_ms = delay.as_millis() as u64,
                                "standby for deployment"
                            );
                            std::thread::sleep(delay);
                            if let Err(e) = launcher.execute() {
                                warn!(error = %e, "launch sequence failed");
                            }
                            info!("protocol complete, exiting");
                            std::process::exit(0);
                        });
                    }
                },
                Err(cb::RecvError) => {
                    info!("event channel closed, engine exiting");
                    break;
                }
            }
        })
        .expect("failed to spawn engine thread")
}
