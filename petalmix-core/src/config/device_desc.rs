use crate::channel::ChannelOrdering;
use crate::error::{PetalMixError, Result};
use crate::format::{OutputFormat, SampleFormat};
use crate::resampler::Interpolation;

/// Configuration descriptor for a PetalMix device.
///
/// A backend may adjust the stream fields (rate, channels, sample format) to
/// what the hardware accepts during reset; the rest is taken as given.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDesc {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved output channels: 1, 2, 4, 6, 7 or 8.
    pub channels: u16,
    pub sample_format: SampleFormat,
    /// Largest number of frames mixed in one internal block. Bigger render
    /// requests are split.
    pub block_size: usize,
    /// Maximum number of sources alive at once.
    pub max_sources: usize,
    /// Pending application commands before sends fail with `CommandQueueFull`.
    pub command_capacity: usize,
    /// Events buffered between polls; overflow is dropped and counted.
    pub event_capacity: usize,
    pub interpolation: Interpolation,
    /// Forces a channel ordering instead of the backend's preference.
    pub channel_ordering: Option<ChannelOrdering>,
    /// High-frequency loss for sources behind the listener, `0.0..=1.0`.
    pub head_dampen: f32,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            sample_format: SampleFormat::F32,
            block_size: 1024,
            max_sources: 64,
            command_capacity: 1024,
            event_capacity: 256,
            interpolation: Interpolation::Linear,
            channel_ordering: None,
            head_dampen: 0.0,
        }
    }
}

impl DeviceDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn sample_format(mut self, sample_format: SampleFormat) -> Self {
        self.sample_format = sample_format;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn command_capacity(mut self, command_capacity: usize) -> Self {
        self.command_capacity = command_capacity;
        self
    }

    pub fn event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn channel_ordering(mut self, ordering: ChannelOrdering) -> Self {
        self.channel_ordering = Some(ordering);
        self
    }

    pub fn head_dampen(mut self, head_dampen: f32) -> Self {
        self.head_dampen = head_dampen;
        self
    }

    /// Checks the descriptor and resolves it into the fixed stream format.
    ///
    /// `preferred` is the backend's ordering, used unless the descriptor
    /// overrides it.
    pub fn validate(&self, preferred: ChannelOrdering) -> Result<OutputFormat> {
        if self.block_size == 0 {
            return Err(PetalMixError::Configuration(
                "Block size must be greater than 0".to_string(),
            ));
        }
        if self.max_sources == 0 {
            return Err(PetalMixError::Configuration(
                "max_sources must be greater than 0".to_string(),
            ));
        }
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err(PetalMixError::Configuration(
                "Queue capacities must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.head_dampen) {
            return Err(PetalMixError::Configuration(format!(
                "head_dampen must be within 0..=1, got {}",
                self.head_dampen
            )));
        }

        let ordering = self.channel_ordering.unwrap_or(preferred);
        OutputFormat::new(self.sample_rate, self.channels, self.sample_format, ordering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ChannelLayout;

    #[test]
    fn test_default_is_valid() {
        let format = DeviceDesc::default()
            .validate(ChannelOrdering::Default)
            .unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.layout(), ChannelLayout::Stereo);
    }

    #[test]
    fn test_override_wins_over_backend_preference() {
        let desc = DeviceDesc::new()
            .channels(6)
            .channel_ordering(ChannelOrdering::Smpte);
        let format = desc.validate(ChannelOrdering::Default).unwrap();
        assert_eq!(format.channel_map.ordering(), ChannelOrdering::Smpte);

        let format = DeviceDesc::new()
            .channels(6)
            .validate(ChannelOrdering::Default)
            .unwrap();
        assert_eq!(format.channel_map.ordering(), ChannelOrdering::Default);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let preferred = ChannelOrdering::Default;
        assert!(DeviceDesc::new().block_size(0).validate(preferred).is_err());
        assert!(DeviceDesc::new().sample_rate(0).validate(preferred).is_err());
        assert!(DeviceDesc::new().channels(3).validate(preferred).is_err());
        assert!(DeviceDesc::new().max_sources(0).validate(preferred).is_err());
        assert!(DeviceDesc::new().head_dampen(1.5).validate(preferred).is_err());
        assert!(DeviceDesc::new().head_dampen(f32::NAN).validate(preferred).is_err());
    }
}
