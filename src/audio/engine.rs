//! Real-time audio engine driving a Csound performance through cpal
//!
//! The output stream's callback is the only code that touches the performer
//! while audio runs: it optionally fills the block from live input capture,
//! marshals it through the engine, and updates the peak meters. Everything
//! else goes through [`AudioEngineHandle`] from control-rate threads.

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::csound::{CsoundPerformer, Myflt};
use super::device::{get_output_device, get_supported_config, AudioConfig};
use super::input;
use crate::csd::CsdDocument;
use crate::environment::CsoundEnvironment;

#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

/// Shared state between control threads and the audio callback
struct SharedState {
    performer: RwLock<Option<CsoundPerformer>>,
    mute: AtomicBool,
    process_input: AtomicBool,
    // Output levels for metering - f32 bit patterns for lock-free access
    output_level_left: AtomicU32,
    output_level_right: AtomicU32,
}

/// Handle to control the engine from other threads
#[derive(Clone)]
pub struct AudioEngineHandle {
    shared: Arc<SharedState>,
    sample_rate: u32,
}

impl AudioEngineHandle {
    /// When muted the callback writes silence and the engine is not advanced
    pub fn set_mute(&self, mute: bool) {
        self.shared.mute.store(mute, Ordering::SeqCst);
    }

    pub fn is_muted(&self) -> bool {
        self.shared.mute.load(Ordering::SeqCst)
    }

    /// Enable feeding captured input audio through the orchestra
    pub fn set_process_input(&self, enabled: bool) {
        if enabled {
            if let Some(input) = input::get_input_handle() {
                input.clear_buffer();
            }
        }
        self.shared.process_input.store(enabled, Ordering::SeqCst);
    }

    pub fn is_processing_input(&self) -> bool {
        self.shared.process_input.load(Ordering::SeqCst)
    }

    /// Whether the orchestra compiled and audio is being produced
    pub fn is_initialized(&self) -> bool {
        self.shared
            .performer
            .read()
            .as_ref()
            .map(CsoundPerformer::is_initialized)
            .unwrap_or(false)
    }

    pub fn ksmps(&self) -> u32 {
        self.shared
            .performer
            .read()
            .as_ref()
            .map(CsoundPerformer::ksmps)
            .unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set a named control channel, as read by `chnget` in the orchestra
    pub fn set_channel(&self, name: &str, value: Myflt) {
        if let Some(performer) = self.shared.performer.read().as_ref() {
            performer.set_channel(name, value);
        }
    }

    /// Read a named control channel, as written by `chnset` in the orchestra
    pub fn channel(&self, name: &str) -> Myflt {
        self.shared
            .performer
            .read()
            .as_ref()
            .map(|p| p.channel(name))
            .unwrap_or(0.0)
    }

    pub fn set_string_channel(&self, name: &str, value: &str) {
        if let Some(performer) = self.shared.performer.read().as_ref() {
            performer.set_string_channel(name, value);
        }
    }

    pub fn string_channel(&self, name: &str) -> String {
        self.shared
            .performer
            .read()
            .as_ref()
            .map(|p| p.string_channel(name))
            .unwrap_or_default()
    }

    /// Inject a score event such as `"i1 0 10"`
    pub fn send_score_event(&self, event: &str) {
        if let Some(performer) = self.shared.performer.read().as_ref() {
            performer.send_score_event(event);
        }
    }

    pub fn table_value(&self, table: i32, index: i32) -> Myflt {
        self.shared
            .performer
            .read()
            .as_ref()
            .map(|p| p.table_value(table, index))
            .unwrap_or(0.0)
    }

    /// Snapshot the accumulated block for a named audio-rate channel
    pub fn audio_channel_snapshot(&self, name: &str) -> Option<Vec<Myflt>> {
        self.shared
            .performer
            .write()
            .as_mut()
            .and_then(|p| p.read_audio_channel(name).map(<[Myflt]>::to_vec))
    }

    /// Forward queued engine diagnostics to the log
    pub fn drain_messages(&self) {
        if let Some(performer) = self.shared.performer.read().as_ref() {
            performer.drain_messages();
        }
    }

    /// Current smoothed output peak levels (left, right)
    pub fn output_levels(&self) -> (f32, f32) {
        (
            u32_to_f32(self.shared.output_level_left.load(Ordering::Relaxed)),
            u32_to_f32(self.shared.output_level_right.load(Ordering::Relaxed)),
        )
    }
}

/// Owns the cpal output stream and the performer behind it
pub struct AudioEngine {
    _stream: cpal::Stream,
    handle: AudioEngineHandle,
    config: AudioConfig,
}

impl AudioEngine {
    /// Build the performer and start the output stream.
    ///
    /// Initialization - library load, compile, control seeding, buffer
    /// allocation - fully completes before the stream starts, so the first
    /// audio callback finds the engine ready.
    pub fn new(
        device_name: Option<&str>,
        config: AudioConfig,
        env: &CsoundEnvironment,
        document: &CsdDocument,
    ) -> Result<Self, String> {
        let device = get_output_device(device_name)?;
        let stream_config = get_supported_config(&device, &config)?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        log::info!(
            "Starting audio engine: {} Hz, {} channels, {} frame blocks",
            sample_rate,
            channels,
            config.buffer_size
        );

        let performer = CsoundPerformer::new(env, document, config.buffer_size)?;

        let shared = Arc::new(SharedState {
            performer: RwLock::new(Some(performer)),
            mute: AtomicBool::new(false),
            process_input: AtomicBool::new(false),
            output_level_left: AtomicU32::new(f32_to_u32(0.0)),
            output_level_right: AtomicU32::new(f32_to_u32(0.0)),
        });

        let shared_clone = Arc::clone(&shared);
        let level_smoothing = 0.1f32;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mute = shared_clone.mute.load(Ordering::Relaxed);
                    let process_input = shared_clone.process_input.load(Ordering::Relaxed);

                    // The host block doubles as the engine's input when input
                    // processing is on
                    if process_input {
                        if let Some(input) = input::get_input_handle() {
                            for chunk in data.chunks_mut(channels) {
                                let sample = input.read_sample();
                                chunk[0] = sample.left;
                                if channels > 1 {
                                    chunk[1] = sample.right;
                                }
                            }
                        }
                    }

                    {
                        let mut performer = shared_clone.performer.write();
                        if let Some(performer) = performer.as_mut() {
                            performer.process_block(data, channels, mute, process_input);
                        }
                    }

                    let mut peak_left = 0.0f32;
                    let mut peak_right = 0.0f32;
                    for chunk in data.chunks(channels) {
                        peak_left = peak_left.max(chunk[0].abs());
                        if channels > 1 {
                            peak_right = peak_right.max(chunk[1].abs());
                        }
                    }

                    let current =
                        u32_to_f32(shared_clone.output_level_left.load(Ordering::Relaxed));
                    shared_clone.output_level_left.store(
                        f32_to_u32(current * (1.0 - level_smoothing) + peak_left * level_smoothing),
                        Ordering::Relaxed,
                    );
                    let current =
                        u32_to_f32(shared_clone.output_level_right.load(Ordering::Relaxed));
                    shared_clone.output_level_right.store(
                        f32_to_u32(
                            current * (1.0 - level_smoothing) + peak_right * level_smoothing,
                        ),
                        Ordering::Relaxed,
                    );
                },
                |err| {
                    log::error!("Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        let handle = AudioEngineHandle {
            shared,
            sample_rate,
        };

        Ok(Self {
            _stream: stream,
            handle,
            config,
        })
    }

    pub fn handle(&self) -> AudioEngineHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Stop the performance. Dropping the engine afterwards releases the
    /// native instance exactly once.
    pub fn stop(&self) {
        if let Some(performer) = self.handle.shared.performer.read().as_ref() {
            performer.stop();
        }
    }
}
