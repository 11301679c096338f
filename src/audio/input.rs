//! Live audio input capture
//!
//! Captures samples from an input device and hands them to the engine
//! callback through a lock-free ring buffer, so orchestras with input
//! processing enabled can run on microphone or line audio instead of only
//! generating sound.

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::{Mutex, RwLock};
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::buffer::StereoSample;
use super::device::{get_input_device, get_native_input_config};

#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

/// Shared state between the input stream and readers
struct InputSharedState {
    /// Ring buffer consumer. Mutex rather than RwLock because the ringbuf
    /// consumer is interiorly mutable.
    consumer: Mutex<ringbuf::HeapCons<StereoSample>>,
    input_level_left: AtomicU32,
    input_level_right: AtomicU32,
    is_active: AtomicBool,
    input_channels: u16,
    actual_sample_rate: u32,
}

/// Handle to read captured samples from the engine callback
#[derive(Clone)]
pub struct InputCaptureHandle {
    shared: Arc<InputSharedState>,
}

impl InputCaptureHandle {
    /// Read one stereo sample; silence when the buffer has run dry
    pub fn read_sample(&self) -> StereoSample {
        self.shared
            .consumer
            .lock()
            .try_pop()
            .unwrap_or_else(StereoSample::silence)
    }

    /// Current smoothed input levels (0.0 - 1.0)
    pub fn input_levels(&self) -> (f32, f32) {
        (
            u32_to_f32(self.shared.input_level_left.load(Ordering::Relaxed)),
            u32_to_f32(self.shared.input_level_right.load(Ordering::Relaxed)),
        )
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active.load(Ordering::SeqCst)
    }

    /// Drop any buffered samples; call when enabling input processing so the
    /// orchestra does not chew through stale audio first
    pub fn clear_buffer(&self) {
        let mut consumer = self.shared.consumer.lock();
        while consumer.try_pop().is_some() {}
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.actual_sample_rate
    }
}

/// Owns the cpal input stream feeding the ring buffer
pub struct InputCapture {
    _stream: cpal::Stream,
    handle: InputCaptureHandle,
    device_name: String,
}

impl InputCapture {
    /// Open `device_name` (or the default input device) at its native sample
    /// rate and start capturing into a ring buffer of `buffer_size_samples`
    /// stereo samples.
    pub fn new(device_name: Option<&str>, buffer_size_samples: usize) -> Result<Self, String> {
        let device = get_input_device(device_name)?;
        let device_name_str = device.name().unwrap_or_else(|_| "Unknown".to_string());

        log::info!("Creating input capture for device: {}", device_name_str);

        let stream_config = get_native_input_config(&device)?;
        let actual_sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;

        log::info!(
            "Input stream config: {} Hz, {} channels",
            actual_sample_rate,
            channels
        );

        let rb = HeapRb::new(buffer_size_samples);
        let (mut producer, consumer) = rb.split();

        let shared = Arc::new(InputSharedState {
            consumer: Mutex::new(consumer),
            input_level_left: AtomicU32::new(f32_to_u32(0.0)),
            input_level_right: AtomicU32::new(f32_to_u32(0.0)),
            is_active: AtomicBool::new(true),
            input_channels: channels,
            actual_sample_rate,
        });

        let shared_clone = Arc::clone(&shared);
        let level_smoothing = 0.15f32;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let channels = shared_clone.input_channels as usize;
                    let mut peak_left = 0.0f32;
                    let mut peak_right = 0.0f32;

                    for chunk in data.chunks(channels) {
                        let (left, right) = if channels == 1 {
                            // Mono input feeds both channels
                            (chunk[0], chunk[0])
                        } else {
                            (chunk[0], chunk.get(1).copied().unwrap_or(chunk[0]))
                        };

                        peak_left = peak_left.max(left.abs());
                        peak_right = peak_right.max(right.abs());

                        // Drop samples if the engine side has stalled
                        let _ = producer.try_push(StereoSample::new(left, right));
                    }

                    let current =
                        u32_to_f32(shared_clone.input_level_left.load(Ordering::Relaxed));
                    shared_clone.input_level_left.store(
                        f32_to_u32(current * (1.0 - level_smoothing) + peak_left * level_smoothing),
                        Ordering::Relaxed,
                    );
                    let current =
                        u32_to_f32(shared_clone.input_level_right.load(Ordering::Relaxed));
                    shared_clone.input_level_right.store(
                        f32_to_u32(
                            current * (1.0 - level_smoothing) + peak_right * level_smoothing,
                        ),
                        Ordering::Relaxed,
                    );
                },
                move |err| {
                    log::error!("Input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Failed to build input stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start input stream: {}", e))?;

        log::info!("Input capture started");

        let handle = InputCaptureHandle { shared };

        Ok(Self {
            _stream: stream,
            handle,
            device_name: device_name_str,
        })
    }

    pub fn handle(&self) -> InputCaptureHandle {
        self.handle.clone()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for InputCapture {
    fn drop(&mut self) {
        log::info!("Input capture stopped: {}", self.device_name);
        self.handle.shared.is_active.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Global input capture management
// ============================================================================

/// Only the handle is stored globally: cpal streams are not Send+Sync, so the
/// capture itself is leaked to keep the stream alive for the process lifetime.
static INPUT_HANDLE: once_cell::sync::OnceCell<RwLock<Option<InputCaptureHandle>>> =
    once_cell::sync::OnceCell::new();

/// Start live input capture on `device_name` (default device when None)
pub fn start_input_capture(device_name: Option<&str>) -> Result<InputCaptureHandle, String> {
    stop_input_capture();

    // ~100ms at 48kHz, 3x for jitter headroom
    let buffer_size = 4800 * 3;

    let capture = InputCapture::new(device_name, buffer_size)?;
    let handle = capture.handle();

    let handle_cell = INPUT_HANDLE.get_or_init(|| RwLock::new(None));
    *handle_cell.write() = Some(handle.clone());

    // Keep the stream alive for the process lifetime
    std::mem::forget(capture);

    Ok(handle)
}

/// Stop live input capture; the leaked stream is reclaimed at process exit
pub fn stop_input_capture() {
    if let Some(cell) = INPUT_HANDLE.get() {
        if let Some(handle) = cell.write().take() {
            handle.shared.is_active.store(false, Ordering::SeqCst);
            log::info!("Input capture stopped");
        }
    }
}

/// The active input capture handle, if any
pub fn get_input_handle() -> Option<InputCaptureHandle> {
    INPUT_HANDLE.get().and_then(|cell| cell.read().clone())
}
