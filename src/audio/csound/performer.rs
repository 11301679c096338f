//! Engine lifecycle and the performance-time surface
//!
//! `CsoundPerformer` ties a compiled [`CsoundBridge`] to a [`BlockAdapter`]
//! and owns the named audio-channel buffers. Everything here is built once,
//! before the first audio callback fires; the real-time path allocates
//! nothing and never logs.

use super::adapter::BlockAdapter;
use super::bridge::CsoundBridge;
use super::csound_sys::Myflt;
use crate::csd::CsdDocument;
use crate::environment::CsoundEnvironment;
use std::collections::HashMap;

/// String channel the configured sample directory is published on, so
/// orchestras can locate their sound files at render time
const SAMPLE_DIR_CHANNEL: &str = "SampleDir";

/// Pre-allocated buffers for one named audio-rate channel
struct NamedAudioChannel {
    /// Host-block-sized history, newest samples at the tail
    data: Vec<Myflt>,
    /// ksmps-sized staging buffer filled straight from the engine
    temp: Vec<Myflt>,
}

pub struct CsoundPerformer {
    bridge: CsoundBridge,
    adapter: BlockAdapter,
    named_channels: HashMap<String, NamedAudioChannel>,
}

impl CsoundPerformer {
    /// Create the engine, compile the document's csd, seed its scanned
    /// control channels, and allocate the named audio-channel buffers.
    ///
    /// `host_buffer_frames` is the host callback block size; the engine is
    /// told about it so its own I/O stays host-driven.
    pub fn new(
        env: &CsoundEnvironment,
        document: &CsdDocument,
        host_buffer_frames: u32,
    ) -> Result<Self, String> {
        let csd_path = document.path().ok_or("no csd file set")?;
        let bridge = CsoundBridge::create(env, csd_path, host_buffer_frames)?;

        // Seed every scanned control with its declared default before the
        // first audio block, so instruments see sensible values immediately.
        for control in document.controls() {
            if !control.channel.is_empty() {
                bridge.set_control_channel(&control.channel, control.value as Myflt);
            }
        }

        let adapter = if bridge.compiled_ok() {
            let ksmps = bridge.ksmps();
            let zero_dbfs = bridge.zero_dbfs();
            log::info!(
                "Csound ready: ksmps={}, kr={}, 0dbfs={}",
                ksmps,
                bridge.kr(),
                zero_dbfs
            );
            if let Some(dir) = &env.sample_dir {
                bridge.set_string_channel(SAMPLE_DIR_CHANNEL, &dir.to_string_lossy());
            }
            BlockAdapter::new(ksmps, zero_dbfs)
        } else {
            log::warn!("Orchestra failed to compile; audio processing disabled");
            BlockAdapter::disabled()
        };

        let ksmps = adapter.ksmps() as usize;
        let named_channels = document
            .audio_channel_names()
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    NamedAudioChannel {
                        data: vec![0.0; host_buffer_frames as usize],
                        temp: vec![0.0; ksmps],
                    },
                )
            })
            .collect();

        Ok(Self {
            bridge,
            adapter,
            named_channels,
        })
    }

    /// Whether the engine compiled and is producing audio
    pub fn is_initialized(&self) -> bool {
        self.adapter.is_ready()
    }

    pub fn ksmps(&self) -> u32 {
        self.adapter.ksmps()
    }

    pub fn zero_dbfs(&self) -> Myflt {
        self.bridge.zero_dbfs()
    }

    /// Real-time entry point: marshal one host block through the engine
    pub fn process_block(
        &mut self,
        samples: &mut [f32],
        channels: usize,
        mute: bool,
        process_input: bool,
    ) {
        self.adapter
            .process_block(&mut self.bridge, samples, channels, mute, process_input);
    }

    /// Pull the current engine frame of a named audio-rate channel into its
    /// pre-allocated buffer and return the accumulated block. Call this from
    /// control-rate code, not from the audio callback.
    pub fn read_audio_channel(&mut self, name: &str) -> Option<&[Myflt]> {
        let channel = self.named_channels.get_mut(name)?;
        let ksmps = channel.temp.len();
        if self.adapter.is_ready() && ksmps > 0 {
            self.bridge.read_audio_channel(name, &mut channel.temp);
            if channel.data.len() >= ksmps {
                channel.data.copy_within(ksmps.., 0);
                let tail = channel.data.len() - ksmps;
                channel.data[tail..].copy_from_slice(&channel.temp);
            }
        }
        Some(&channel.data)
    }

    /// Names of the audio-rate channels discovered in the orchestra
    pub fn audio_channel_names(&self) -> impl Iterator<Item = &str> {
        self.named_channels.keys().map(String::as_str)
    }

    pub fn set_channel(&self, name: &str, value: Myflt) {
        self.bridge.set_control_channel(name, value);
    }

    pub fn channel(&self, name: &str) -> Myflt {
        self.bridge.control_channel(name)
    }

    pub fn set_string_channel(&self, name: &str, value: &str) {
        self.bridge.set_string_channel(name, value);
    }

    pub fn string_channel(&self, name: &str) -> String {
        self.bridge.string_channel(name)
    }

    pub fn send_score_event(&self, event: &str) {
        self.bridge.send_score_event(event);
    }

    pub fn table_value(&self, table: i32, index: i32) -> Myflt {
        self.bridge.table_value(table, index)
    }

    pub fn clear_spin(&self) {
        self.bridge.clear_spin();
    }

    /// Forward queued engine diagnostics to the log. Runs off the real-time
    /// path; the engine keeps queueing while audio renders.
    pub fn drain_messages(&self) {
        for _ in 0..self.bridge.message_count() {
            match self.bridge.pop_message() {
                Some(message) => {
                    let message = message.trim_end();
                    if !message.is_empty() {
                        log::info!(target: "csound", "{}", message);
                    }
                }
                None => break,
            }
        }
    }

    pub fn stop(&self) {
        self.bridge.stop();
    }
}
