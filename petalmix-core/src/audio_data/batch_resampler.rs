use crate::error::{PetalMixError, Result};
use rubato::{FftFixedIn, Resampler};

/// Offline FFT resampler for whole buffers.
///
/// The renderer's own fetcher interpolates per output frame; this one is for
/// converting a buffer once, ahead of time, when quality matters more than
/// cost.
pub struct BatchResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl BatchResampler {
    /// Creates a new batch resampler.
    ///
    /// # Arguments
    /// * `source_sample_rate` - The sample rate of the input audio
    /// * `target_sample_rate` - The desired sample rate of the output audio
    /// * `channels` - Number of channels in the audio data
    /// * `chunk_size` - Optional size of processing chunks (defaults to 1024)
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(PetalMixError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(PetalMixError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024).max(1),
        })
    }

    /// Resamples interleaved audio and returns interleaved audio.
    ///
    /// The resampler's group delay is trimmed so the output starts at the
    /// same instant as the input and is `ceil(frames * ratio)` frames long.
    pub fn resample_interleaved(&self, interleaved_samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(interleaved_samples.to_vec());
        }

        let channels = self.channels as usize;
        let frames = interleaved_samples.len() / channels;
        if frames == 0 {
            return Ok(Vec::new());
        }

        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                interleaved_samples
                    .iter()
                    .skip(ch)
                    .step_by(channels)
                    .copied()
                    .collect()
            })
            .collect();

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            channels,
        )
        .map_err(|e| PetalMixError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let delay = resampler.output_delay();
        let expected = (frames as f64 * self.resample_ratio()).ceil() as usize;
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

        let mut position = 0;
        while position < frames {
            let needed = resampler.input_frames_next();
            let end = (position + needed).min(frames);
            let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[position..end]).collect();

            let waves = if end - position == needed {
                resampler.process(&chunk, None)
            } else {
                resampler.process_partial(Some(chunk.as_slice()), None)
            }
            .map_err(|e| PetalMixError::AudioLoading(format!("Resampling error: {}", e)))?;

            for (out, wave) in output.iter_mut().zip(waves.iter()) {
                out.extend_from_slice(wave);
            }
            position = end;
        }

        // Flush whatever the delay line still holds.
        while output[0].len() < expected + delay {
            let waves = resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| PetalMixError::AudioLoading(format!("Resampling error: {}", e)))?;
            if waves.first().is_none_or(|w| w.is_empty()) {
                break;
            }
            for (out, wave) in output.iter_mut().zip(waves.iter()) {
                out.extend_from_slice(wave);
            }
        }

        let available = output[0].len().saturating_sub(delay).min(expected);
        let mut interleaved = Vec::with_capacity(available * channels);
        for frame_idx in delay..delay + available {
            for channel in &output {
                interleaved.push(channel[frame_idx]);
            }
        }

        Ok(interleaved)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Output frames per input frame.
    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_creation() {
        let resampler = BatchResampler::new(44100, 48000, 2, None).unwrap();
        assert_eq!(resampler.source_sample_rate(), 44100);
        assert_eq!(resampler.target_sample_rate(), 48000);
    }

    #[test]
    fn test_resampler_no_resampling_needed() {
        let resampler = BatchResampler::new(44100, 44100, 1, None).unwrap();
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.resample_interleaved(&samples).unwrap(), samples);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(BatchResampler::new(0, 48000, 2, None).is_err());
        assert!(BatchResampler::new(44100, 0, 2, None).is_err());
        assert!(BatchResampler::new(44100, 48000, 0, None).is_err());
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let resampler = BatchResampler::new(24000, 48000, 2, Some(256)).unwrap();
        let input = vec![0.25f32; 1000 * 2];
        let output = resampler.resample_interleaved(&input).unwrap();
        assert_eq!(output.len(), 2000 * 2);
    }
}
