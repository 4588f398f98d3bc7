use crate::{
    audio_data::{AudioDataLoader, ConvertToMono, LoadOptions, PetalMixAudioData},
    error::{PetalMixError, Result},
};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// File loader backed by Symphonia (WAV, FLAC, MP3, OGG/Vorbis, ...).
///
/// Decoded audio is converted to interleaved `f32`, optionally downmixed to
/// mono and optionally resampled offline, then wrapped in a buffer.
pub struct DefaultAudioLoader;

impl AudioDataLoader for DefaultAudioLoader {
    fn load(&self, path: &str, options: &LoadOptions) -> Result<Arc<PetalMixAudioData>> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                PetalMixError::AudioLoading(format!("Failed to probe {}: {}", path, e))
            })?;
        let mut format = probed.format;

        let track = format.default_track().ok_or_else(|| {
            PetalMixError::AudioLoading(format!("No default audio track in {}", path))
        })?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PetalMixError::AudioLoading("Sample rate not found".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| PetalMixError::AudioLoading("Channel count not found".to_string()))?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PetalMixError::AudioLoading(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break,
                Err(e) => {
                    return Err(PetalMixError::AudioLoading(format!(
                        "Error reading packet: {}",
                        e
                    )));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(e)) => {
                    log::warn!("Skipping corrupt packet in {}: {}", path, e);
                    continue;
                }
                Err(e) => {
                    return Err(PetalMixError::AudioLoading(format!(
                        "Error decoding packet: {}",
                        e
                    )));
                }
            };

            let needs_new = scratch
                .as_ref()
                .is_none_or(|buf| buf.capacity() < decoded.capacity());
            if needs_new {
                scratch = Some(SampleBuffer::<f32>::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            if let Some(buf) = scratch.as_mut() {
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
        }

        let mut audio_data = if channels > 2 && !matches!(channels, 4 | 6 | 7 | 8) {
            // Layouts buffers cannot hold are folded down before validation.
            log::info!(
                "{} has {} channels, downmixing to mono",
                path,
                channels
            );
            let mono: Vec<f32> = samples
                .chunks(channels as usize)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect();
            PetalMixAudioData::from_f32(mono, sample_rate, 1)?
        } else {
            PetalMixAudioData::from_f32(samples, sample_rate, channels)?
        };

        if options.convert_to_mono == ConvertToMono::ForceMono {
            audio_data = audio_data.to_mono();
        }

        if let Some(rate) = options.target_sample_rate {
            audio_data = audio_data.resample(rate)?;
        }

        log::debug!(
            "Loaded {}: {} frames, {} channels, {} Hz",
            path,
            audio_data.total_frames(),
            audio_data.channels(),
            audio_data.sample_rate()
        );

        Ok(Arc::new(audio_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let result = DefaultAudioLoader.load("does/not/exist.wav", &LoadOptions::default());
        assert!(matches!(result, Err(PetalMixError::Io(_))));
    }
}
