//! Amplitude sensing channel.
//! cpal input stream → ring buffer → processing thread → impulse pipeline.
//! Capture runs on cpal's callback thread and only writes samples; the
//! processing thread reads ~20ms blocks, classifies them, and pushes
//! double-impulse events onto the orchestrator channel. Detection is gated
//! on Idle; while armed the loop keeps draining the buffer untouched.

pub mod amplitude;
pub mod impulse;
pub mod ring_buffer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as cb;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::engine::ActivationEvent;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::state_machine::{ActivationState, StateMachine};
use amplitude::AmplitudeClassifier;
use impulse::DoubleImpulseDetector;
use ring_buffer::RingBuffer;

/// Capture parameters.
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub ring_buffer_secs: f32,
    /// Samples per processing block.
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            ring_buffer_secs: 3.0,
            block_size: 320, // ~20ms at 16kHz
        }
    }
}

/// Shared state between the capture callback and the processing thread.
struct SharedAudioState {
    ring_buffer: Mutex<RingBuffer>,
}

/// Keeps the sensing channel alive. Dropping it stops the stream and joins
/// the processing thread.
pub struct AudioHandle {
    stop_flag: Arc<AtomicBool>,
    processing_thread: Option<std::thread::JoinHandle<()>>,
    _stream: cpal::Stream,
}

impl AudioHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.processing_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start the amplitude sensing channel: capture stream plus processing loop.
/// A start failure is reported to the caller, who degrades this channel to
/// silent; the speech channel is unaffected.
pub fn start_amplitude_pipeline(
    audio: AudioConfig,
    config: &crate::config::Config,
    state_machine: Arc<StateMachine>,
    events: cb::Sender<ActivationEvent>,
    metrics: Arc<MetricsRegistry>,
) -> Result<AudioHandle, String> {
    let ring = RingBuffer::new(audio.sample_rate, audio.ring_buffer_secs);
    let shared = Arc::new(SharedAudioState {
        ring_buffer: Mutex::new(ring),
    });

    let stop_flag = Arc::new(AtomicBool::new(false));

    let stream = start_capture_stream(&audio, Arc::clone(&shared))?;

    let classifier = AmplitudeClassifier::new(config.amplitude_threshold, config.debounce());
    let detector = DoubleImpulseDetector::new(config.impulse_window());

    let shared_proc = Arc::clone(&shared);
    let stop_proc = Arc::clone(&stop_flag);
    let block_size = audio.block_size;
    let processing_thread = std::thread::Builder::new()
        .name("amplitude-sensing".into())
        .spawn(move || {
            run_processing_loop(
                shared_proc,
                block_size,
                stop_proc,
                classifier,
                detector,
                state_machine,
                events,
                metrics,
            );
        })
        .map_err(|e| format!("failed to spawn amplitude processing thread: {e}"))?;

    Ok(AudioHandle {
        stop_flag,
        processing_thread: Some(processing_thread),
        _stream: stream,
    })
}

/// Build and start the cpal input stream. The callback only writes into the
/// ring buffer: no allocation, no blocking.
fn start_capture_stream(
    audio: &AudioConfig,
    shared: Arc<SharedAudioState>,
) -> Result<cpal::Stream, String> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or("no audio input device available")?;

    let stream_config = cpal::StreamConfig {
        channels: audio.channels,
        sample_rate: cpal::SampleRate(audio.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut rb = shared.ring_buffer.lock();
                rb.write(data);
            },
            |err| {
                error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| format!("failed to build input stream: {e}"))?;

    stream
        .play()
        .map_err(|e| format!("failed to start audio stream: {e}"))?;
    info!("audio capture stream started");

    Ok(stream)
}

/// Processing loop: block-by-block RMS classification and pair detection.
#[allow(clippy::too_many_arguments)]
fn run_processing_loop(
    shared: Arc<SharedAudioState>,
    block_size: usize,
    stop_flag: Arc<AtomicBool>,
    mut classifier: AmplitudeClassifier,
    mut detector: DoubleImpulseDetector,
    state_machine: Arc<StateMachine>,
    events: cb::Sender<ActivationEvent>,
    metrics: Arc<MetricsRegistry>,
) {
    let mut block_buf = vec![0i16; block_size];
    let sleep_between = Duration::from_millis(20);
    let mut first_impulse_at: Option<Instant> = None;

    info!("amplitude processing loop started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            info!("amplitude processing loop stopping");
            break;
        }

        let available = {
            let rb = shared.ring_buffer.lock();
            rb.available()
        };
        if available < block_size {
            std::thread::sleep(sleep_between);
            continue;
        }

        let read_count = {
            let mut rb = shared.ring_buffer.lock();
            rb.read(&mut block_buf)
        };
        if read_count == 0 {
            std::thread::sleep(sleep_between);
            continue;
        }

        let now = Instant::now();

        // The reset rule runs every block, impulse or not, so a lone first
        // impulse times out even over pure silence.
        detector.tick(now);

        // The amplitude channel owns the arming decision only while Idle.
        // While armed, keep draining the ring buffer without classifying.
        if state_machine.current() != ActivationState::Idle {
            first_impulse_at = None;
            continue;
        }

        let classify_start = Instant::now();
        let impulse = classifier.classify(&block_buf[..read_count], now);
        metrics.record(
            metric_names::IMPULSE_CLASSIFY,
            classify_start.elapsed().as_micros() as f64,
        );

        if let Some(impulse) = impulse {
            match detector.observe(impulse.at) {
                Some(pair) => {
                    if let Some(first) = first_impulse_at.take() {
                        metrics.record(
                            metric_names::DOUBLE_IMPULSE,
                            pair.at.duration_since(first).as_micros() as f64,
                        );
                    }
                    if events
                        .send(ActivationEvent::DoubleImpulse { at: pair.at })
                        .is_err()
                    {
                        info!("event channel closed, amplitude loop exiting");
                        break;
                    }
                }
                None => {
                    first_impulse_at = Some(impulse.at);
                }
            }
        }
    }
}
