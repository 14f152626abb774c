//! vigil: acoustic two-factor activation daemon.
//! A double clap arms the system, the wake phrase confirms within the arming
//! window, and confirmation runs the configured launch sequence and exits.
//! The fix-display voice command power-cycles the external monitor from any
//! state. Wiring: config load, collaborator construction, orchestrator loop,
//! sensing channel startup.

pub mod actions;
pub mod audio;
pub mod cancellation;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod speech;
pub mod state_machine;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use actions::display::DisplayPowerCycle;
use actions::launcher::ProcessLaunchSequence;
use actions::sound::AplaySoundPlayback;
use actions::{LaunchSequence, MonitorHandshake, SoundPlayback};
use config::Config;
use engine::Engine;
use metrics::MetricsRegistry;
use speech::command::CommandClassifier;
use state_machine::StateMachine;

/// Build everything and block on the orchestrator loop. Returns only if the
/// event channel closes; a successful activation exits the process from the
/// launch worker instead.
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=debug".parse().unwrap()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("vigil starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = Config::load_or_default(Path::new(&config_path));
    info!(
        wake_word = %config.wake_word,
        amplitude_threshold = config.amplitude_threshold,
        targets = config.launch_targets.len(),
        "configuration active"
    );

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");

    let metrics = Arc::new(MetricsRegistry::new());
    let state_machine = Arc::new(StateMachine::new());
    let (events_tx, events_rx) = engine::event_channel();

    let launcher: Arc<dyn LaunchSequence> = Arc::new(ProcessLaunchSequence::new(
        config.launch_targets.clone(),
        config.launch_stagger(),
    ));
    let handshake: Arc<dyn MonitorHandshake> = Arc::new(DisplayPowerCycle::new(
        config.display_output.clone(),
        config.display_settle(),
    ));
    let sound: Arc<dyn SoundPlayback> = Arc::new(AplaySoundPlayback::new());

    let engine = Engine::new(
        &config,
        Arc::clone(&state_machine),
        Arc::clone(&metrics),
        launcher,
        handshake,
        sound,
        events_tx.clone(),
        runtime.handle().clone(),
    );
    let engine_thread = engine::run_event_loop(engine, events_rx);

    // Each sensing channel may fail to start; the other keeps operating.
    let _audio = match audio::start_amplitude_pipeline(
        audio::AudioConfig::default(),
        &config,
        Arc::clone(&state_machine),
        events_tx.clone(),
        Arc::clone(&metrics),
    ) {
        Ok(handle) => {
            info!("amplitude channel online");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "amplitude channel unavailable (no mic access?)");
            None
        }
    };

    let classifier = CommandClassifier::new(
        &config.wake_word,
        config.wake_confidence,
        config.command_confidence,
    );
    let _speech = match speech::start_speech_pipeline(
        &config.recognizer_command,
        classifier,
        Arc::clone(&state_machine),
        events_tx.clone(),
    ) {
        Ok(handle) => {
            info!("speech channel online");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "speech channel unavailable");
            None
        }
    };

    drop(events_tx);
    info!("system online, double clap to arm");

    // The engine holds an event sender for its timeout tasks, so this join
    // blocks for the life of the process.
    let _ = engine_thread.join();
}
