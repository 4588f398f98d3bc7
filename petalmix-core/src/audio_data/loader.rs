use crate::audio_data::{LoadOptions, PetalMixAudioData};
use crate::error::Result;
use std::sync::Arc;

/// Source of decoded buffers.
///
/// [`DefaultAudioLoader`](super::DefaultAudioLoader) decodes files with
/// Symphonia; implement this trait to plug in another decoder or an asset
/// pipeline that already holds PCM in memory.
///
/// # Example
///
/// ```ignore
/// use petalmix_core::audio_data::{AudioDataLoader, LoadOptions, PetalMixAudioData};
/// use petalmix_core::error::Result;
/// use std::sync::Arc;
///
/// struct SilenceLoader;
///
/// impl AudioDataLoader for SilenceLoader {
///     fn load(&self, _path: &str, _options: &LoadOptions) -> Result<Arc<PetalMixAudioData>> {
///         Ok(Arc::new(PetalMixAudioData::from_f32(vec![0.0; 480], 48000, 1)?))
///     }
/// }
/// ```
pub trait AudioDataLoader {
    /// Decodes the file at `path` into a buffer.
    ///
    /// # Errors
    ///
    /// Returns a `PetalMixError` if the file cannot be read, decoded, or has
    /// a channel layout buffers cannot hold.
    fn load(&self, path: &str, options: &LoadOptions) -> Result<Arc<PetalMixAudioData>>;
}
