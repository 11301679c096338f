//! Audio device enumeration and stream configuration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Preferred host stream parameters. `buffer_size` is the host block size in
/// frames; the engine is configured against it at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_size: 512,
        }
    }
}

fn find_device(
    devices: impl Iterator<Item = cpal::Device>,
    name: &str,
) -> Option<cpal::Device> {
    devices
        .into_iter()
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
}

/// Get list of available output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, String> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| format!("Failed to enumerate devices: {}", e))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDeviceInfo {
            is_default: Some(&name) == default_name.as_ref(),
            name,
        })
        .collect())
}

/// Get output device by name, or the default if name is None
pub fn get_output_device(name: Option<&str>) -> Result<cpal::Device, String> {
    let host = cpal::default_host();
    match name {
        Some(device_name) => {
            let devices = host
                .output_devices()
                .map_err(|e| format!("Failed to enumerate devices: {}", e))?;
            find_device(devices, device_name)
                .ok_or_else(|| format!("Device '{}' not found", device_name))
        }
        None => host
            .default_output_device()
            .ok_or_else(|| "No default output device found".to_string()),
    }
}

/// Pick an output stream config matching the preferred parameters, falling
/// back to the device default when nothing matches
pub fn get_supported_config(
    device: &cpal::Device,
    preferred: &AudioConfig,
) -> Result<cpal::StreamConfig, String> {
    let supported_configs = device
        .supported_output_configs()
        .map_err(|e| format!("Failed to get supported configs: {}", e))?;

    for config in supported_configs {
        if preferred.sample_rate >= config.min_sample_rate().0
            && preferred.sample_rate <= config.max_sample_rate().0
            && config.channels() >= preferred.channels
        {
            return Ok(cpal::StreamConfig {
                channels: preferred.channels,
                sample_rate: cpal::SampleRate(preferred.sample_rate),
                buffer_size: cpal::BufferSize::Fixed(preferred.buffer_size),
            });
        }
    }

    let default_config = device
        .default_output_config()
        .map_err(|e| format!("Failed to get default config: {}", e))?;

    Ok(cpal::StreamConfig {
        channels: default_config.channels().min(2),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}

/// Get input device by name, or the default if name is None
pub fn get_input_device(name: Option<&str>) -> Result<cpal::Device, String> {
    let host = cpal::default_host();
    match name {
        Some(device_name) => {
            let devices = host
                .input_devices()
                .map_err(|e| format!("Failed to enumerate input devices: {}", e))?;
            find_device(devices, device_name)
                .ok_or_else(|| format!("Input device '{}' not found", device_name))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| "No default input device found".to_string()),
    }
}

/// Input config at the device's native sample rate. Forcing a non-native
/// rate makes some backends reconfigure the device mid-stream.
pub fn get_native_input_config(device: &cpal::Device) -> Result<cpal::StreamConfig, String> {
    let default_config = device
        .default_input_config()
        .map_err(|e| format!("Failed to get default input config: {}", e))?;

    Ok(cpal::StreamConfig {
        channels: default_config.channels().min(2),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
