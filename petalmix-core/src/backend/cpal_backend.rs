use super::Backend;
use crate::channel::ChannelOrdering;
use crate::config::DeviceDesc;
use crate::error::{PetalMixError, Result};
use crate::format::SampleFormat;
use crate::mixer::PcmSample;
use crate::renderer::Renderer;
use cpal::SizedSample;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Plays through the system audio device with `cpal`.
pub struct CpalBackend {
    device_name: Option<String>,
    device: Option<cpal::Device>,
    config: Option<cpal::StreamConfig>,
    sample_format: SampleFormat,
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicU64>,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    /// Uses the host's default output device.
    pub fn new() -> Self {
        Self {
            device_name: None,
            device: None,
            config: None,
            sample_format: SampleFormat::F32,
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Uses the output device whose name matches `name`.
    pub fn with_device_name(name: impl Into<String>) -> Self {
        let mut backend = Self::new();
        backend.device_name = Some(name.into());
        backend
    }

    /// Names of the output devices of the default host.
    pub fn output_device_names() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.output_devices().map_err(|e| {
            PetalMixError::AudioDevice(format!("Failed to enumerate devices: {}", e))
        })?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    /// Check if the stream is currently running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Frames rendered since the stream started.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    fn device(&self) -> Result<&cpal::Device> {
        self.device
            .as_ref()
            .ok_or_else(|| PetalMixError::Engine("Backend is not open".into()))
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut renderer: Renderer,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + PcmSample,
    {
        let is_running = self.is_running.clone();
        let frames_processed = self.frames_processed.clone();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        data.fill(T::from_f32(0.0));
                        return;
                    }
                    let frames = renderer.render_into(data);
                    frames_processed.fetch_add(frames as u64, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PetalMixError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}

fn to_cpal_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::U8 => cpal::SampleFormat::U8,
        SampleFormat::I8 => cpal::SampleFormat::I8,
        SampleFormat::I16 => cpal::SampleFormat::I16,
        SampleFormat::I32 => cpal::SampleFormat::I32,
        SampleFormat::F32 => cpal::SampleFormat::F32,
    }
}

/// ALSA exposes surround channels in the internal order; the other hosts
/// follow SMPTE.
fn host_channel_ordering() -> ChannelOrdering {
    if cfg!(target_os = "linux") {
        ChannelOrdering::Default
    } else {
        ChannelOrdering::Smpte
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = match &self.device_name {
            None => host.default_output_device().ok_or_else(|| {
                PetalMixError::AudioDevice("No default output device available".into())
            })?,
            Some(name) => host
                .output_devices()
                .map_err(|e| {
                    PetalMixError::AudioDevice(format!("Failed to enumerate devices: {}", e))
                })?
                .find(|device| device.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| PetalMixError::NotFound(format!("output device '{}'", name)))?,
        };

        log::info!(
            "Opened output device '{}' on host {:?}",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            host.id()
        );
        self.device = Some(device);
        Ok(())
    }

    fn reset(&mut self, desc: &DeviceDesc) -> Result<DeviceDesc> {
        let device = self.device()?;
        let wanted = to_cpal_format(desc.sample_format);

        let supported = device
            .supported_output_configs()
            .map_err(|e| {
                PetalMixError::AudioDevice(format!("Failed to query device configs: {}", e))
            })?
            .any(|range| {
                range.channels() == desc.channels
                    && range.sample_format() == wanted
                    && range.min_sample_rate().0 <= desc.sample_rate
                    && desc.sample_rate <= range.max_sample_rate().0
            });
        if !supported {
            return Err(PetalMixError::Configuration(format!(
                "Device does not support {} channels of {:?} at {} Hz",
                desc.channels, desc.sample_format, desc.sample_rate
            )));
        }

        let mut resolved = desc.clone();
        resolved.channel_ordering =
            Some(desc.channel_ordering.unwrap_or_else(host_channel_ordering));

        self.config = Some(cpal::StreamConfig {
            channels: desc.channels,
            sample_rate: cpal::SampleRate(desc.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        });
        self.sample_format = desc.sample_format;
        Ok(resolved)
    }

    fn start(&mut self, renderer: Renderer) -> Result<()> {
        if self.stream.is_some() {
            return Err(PetalMixError::Engine("Stream already started".into()));
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| PetalMixError::Engine("Backend was not reset".into()))?;
        let device = self.device()?;

        let stream = match self.sample_format {
            SampleFormat::U8 => self.build_stream::<u8>(device, &config, renderer)?,
            SampleFormat::I8 => self.build_stream::<i8>(device, &config, renderer)?,
            SampleFormat::I16 => self.build_stream::<i16>(device, &config, renderer)?,
            SampleFormat::I32 => self.build_stream::<i32>(device, &config, renderer)?,
            SampleFormat::F32 => self.build_stream::<f32>(device, &config, renderer)?,
        };

        self.is_running.store(true, Ordering::Relaxed);
        if let Err(e) = stream.play() {
            self.is_running.store(false, Ordering::Relaxed);
            return Err(PetalMixError::AudioDevice(format!(
                "Failed to start stream: {}",
                e
            )));
        }

        self.stream = Some(stream);
        log::info!(
            "Stream started: {} ch, {} Hz, {:?}",
            config.channels,
            config.sample_rate.0,
            self.sample_format
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_running.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream: {}", e);
            }
            drop(stream);
            log::info!(
                "Stream stopped after {} frames",
                self.frames_processed.load(Ordering::Relaxed)
            );
        }
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.stop();
        self.config = None;
        if self.device.take().is_some() {
            log::debug!("Output device released");
        }
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.close();
    }
}
