/// Channel handling applied after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertToMono {
    /// Keep the file's channels. Multichannel buffers play to their matching
    /// speakers and are not positioned.
    Original,

    /// Average all channels into one, so the buffer can be positioned in 3D.
    ForceMono,
}

/// Options for controlling how files become buffers.
///
/// ```no_run
/// # use petalmix_core::audio_data::{LoadOptions, ConvertToMono};
/// let options = LoadOptions::new()
///     .convert_to_mono(ConvertToMono::ForceMono)
///     .target_sample_rate(48000);
/// ```
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub convert_to_mono: ConvertToMono,
    /// Convert offline to this rate after decoding (None = keep the file's rate).
    pub target_sample_rate: Option<u32>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            convert_to_mono: ConvertToMono::Original,
            target_sample_rate: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert_to_mono(mut self, convert: ConvertToMono) -> Self {
        self.convert_to_mono = convert;
        self
    }

    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }
}
