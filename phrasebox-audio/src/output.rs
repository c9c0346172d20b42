//! Audio output using cpal.
//!
//! Drives an [`AudioProcessor`] from a device output callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

use crate::processor::AudioProcessor;

/// An output device available on the default host.
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List output devices on the default host.
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = match host.output_devices() {
        Ok(d) => d,
        Err(e) => {
            log::warn!(target: "audio::output", "cannot enumerate output devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|d| d.name().ok())
        .map(|name| OutputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect()
}

fn find_device(name: Option<&str>) -> Result<Device, String> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| format!("Failed to enumerate output devices: {}", e))?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| format!("Output device not found: {}", wanted))
        }
        None => host
            .default_output_device()
            .ok_or_else(|| "No default output device".to_string()),
    }
}

/// A running output stream. Playback stops when this is dropped.
pub struct OutputStream {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl OutputStream {
    /// Open `device_name` (or the default device) and start pulling audio from
    /// `processor`. The processor's host rate is set from the device config.
    pub fn open(device_name: Option<&str>, mut processor: AudioProcessor) -> Result<Self, String> {
        let device = find_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device
            .default_output_config()
            .map_err(|e| format!("Failed to get output config: {}", e))?;
        if config.sample_format() != SampleFormat::F32 {
            return Err(format!(
                "Unsupported output sample format {:?} on {}",
                config.sample_format(),
                name
            ));
        }

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let stream_config: StreamConfig = config.into();

        if processor.set_sample_rate(sample_rate as f64) {
            log::warn!(
                target: "audio::output",
                "device reported sample rate {}; using nominal rate",
                sample_rate
            );
        }

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    processor.process_interleaved(data, channels as usize);
                },
                |err| {
                    log::error!(target: "audio::output", "Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        log::info!(
            target: "audio::output",
            "output started on {} ({} Hz, {} ch)",
            name,
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            device_name: name,
            sample_rate,
            channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
