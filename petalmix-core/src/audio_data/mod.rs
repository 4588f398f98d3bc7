//! Immutable PCM buffers and the ways to build them.

mod batch_resampler;
mod default_loader;
mod load_options;
mod loader;

use crate::channel::MAX_CHANNELS;
use crate::error::{PetalMixError, Result};
use crate::format::SampleFormat;
use crate::mixer;
pub use batch_resampler::BatchResampler;
pub use default_loader::DefaultAudioLoader;
pub use load_options::{ConvertToMono, LoadOptions};
pub use loader::AudioDataLoader;
use std::sync::Arc;
use std::time::Duration;

/// Block of PCM audio shared between the application and the renderer.
///
/// Samples are stored **interleaved** as normalised `f32`, whatever the
/// representation they were uploaded in; [`bits_per_sample`](Self::bits_per_sample)
/// records that original width. The contents never change after construction,
/// so any number of sources may read one buffer concurrently.
#[derive(Debug, Clone)]
pub struct PetalMixAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
pub(crate) struct AudioDataInner {
    /// Interleaved samples, `total_frames * channels` long.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub duration: Duration,
    pub total_frames: usize,
}

impl PetalMixAudioData {
    pub(crate) fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Self {
        let total_frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(total_frames as f64 / sample_rate as f64)
        };
        Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                bits_per_sample,
                duration,
                total_frames,
            }),
        }
    }

    /// Builds a buffer from interleaved `f32` samples.
    ///
    /// # Errors
    ///
    /// Returns `AudioFormat` if the sample rate is zero, the channel count is
    /// not 1, 2, 4, 6, 7 or 8, or the sample count is not a whole number of
    /// frames.
    pub fn from_f32(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        validate_layout(samples.len(), sample_rate, channels)?;
        Ok(Self::new(samples, sample_rate, channels, 32))
    }

    /// Builds a buffer from interleaved native-endian PCM bytes.
    pub fn from_pcm_bytes(
        bytes: &[u8],
        format: SampleFormat,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let bytes_per_sample = format.bytes_per_sample();
        if bytes.len() % bytes_per_sample != 0 {
            return Err(PetalMixError::AudioFormat(format!(
                "{} bytes is not a whole number of {}-byte samples",
                bytes.len(),
                bytes_per_sample
            )));
        }
        let sample_count = bytes.len() / bytes_per_sample;
        validate_layout(sample_count, sample_rate, channels)?;

        let mut samples = vec![0.0f32; sample_count];
        mixer::unpack(bytes, format, &mut samples);
        Ok(Self::new(
            samples,
            sample_rate,
            channels,
            format.bits_per_sample(),
        ))
    }

    /// Load audio data from a file path using the default loader.
    ///
    /// # Errors
    ///
    /// Returns a `PetalMixError` if the file cannot be loaded or decoded.
    pub fn from_path(path: &str) -> Result<Arc<Self>> {
        let loader = DefaultAudioLoader;
        loader.load(path, &LoadOptions::default())
    }

    /// Load audio data from a file path with custom loading options.
    pub fn from_path_with_options(path: &str, options: &LoadOptions) -> Result<Arc<Self>> {
        let loader = DefaultAudioLoader;
        loader.load(path, options)
    }

    /// Load audio data from a file path using a custom loader.
    pub fn from_path_with_loader<L: AudioDataLoader>(
        path: &str,
        loader: &L,
        options: &LoadOptions,
    ) -> Result<Arc<Self>> {
        loader.load(path, options)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    /// Width of the PCM this buffer was uploaded from.
    pub fn bits_per_sample(&self) -> u16 {
        self.inner.bits_per_sample
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.total_frames == 0
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// One interleaved frame. Panics if `index >= total_frames()`.
    #[inline]
    pub fn frame(&self, index: usize) -> &[f32] {
        let channels = self.inner.channels as usize;
        &self.inner.samples[index * channels..(index + 1) * channels]
    }

    /// Downmix all channels to one by averaging.
    ///
    /// Only mono buffers are positioned in 3D; multichannel buffers play
    /// straight to their matching speakers.
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }

        let channels = self.inner.channels as usize;
        let mono_samples: Vec<f32> = self
            .inner
            .samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(
            mono_samples,
            self.inner.sample_rate,
            1,
            self.inner.bits_per_sample,
        )
    }

    /// Offline high-quality conversion to another sample rate using rubato.
    ///
    /// The renderer resamples on the fly, so this is only worth calling for
    /// buffers whose rate is far from the device rate.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = BatchResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            Some(1024),
        )?;

        let resampled_samples = resampler.resample_interleaved(&self.inner.samples)?;

        Ok(Self::new(
            resampled_samples,
            target_sample_rate,
            self.inner.channels,
            self.inner.bits_per_sample,
        ))
    }

    /// True when `self` and `other` can sit in one source queue.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.inner.channels == other.inner.channels
            && self.inner.sample_rate == other.inner.sample_rate
    }
}

fn validate_layout(sample_count: usize, sample_rate: u32, channels: u16) -> Result<()> {
    if sample_rate == 0 {
        return Err(PetalMixError::AudioFormat(
            "Sample rate must be greater than 0".to_string(),
        ));
    }
    if !matches!(channels, 1 | 2 | 4 | 6 | 7 | 8) || channels as usize > MAX_CHANNELS {
        return Err(PetalMixError::AudioFormat(format!(
            "Unsupported buffer channel count: {}",
            channels
        )));
    }
    if sample_count % channels as usize != 0 {
        return Err(PetalMixError::AudioFormat(format!(
            "{} samples is not a whole number of {}-channel frames",
            sample_count, channels
        )));
    }
    Ok(())
}
