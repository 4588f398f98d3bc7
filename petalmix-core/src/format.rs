//! Output sample formats and channel layouts.

use crate::channel::{ChannelMap, ChannelOrdering};
use crate::error::{PetalMixError, Result};

/// Sample representation of the device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 0x80.
    U8,
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit, native endian.
    I16,
    /// Signed 32-bit, native endian.
    I32,
    /// 32-bit float in `[-1.0, 1.0]`, native endian.
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }
}

/// Speaker arrangement of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    Surround51,
    Surround61,
    Surround71,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Quad => 4,
            Self::Surround51 => 6,
            Self::Surround61 => 7,
            Self::Surround71 => 8,
        }
    }

    pub fn from_channels(channels: u16) -> Result<Self> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            4 => Ok(Self::Quad),
            6 => Ok(Self::Surround51),
            7 => Ok(Self::Surround61),
            8 => Ok(Self::Surround71),
            other => Err(PetalMixError::Configuration(format!(
                "Unsupported channel count: {}",
                other
            ))),
        }
    }
}

/// Fully validated device stream description, fixed from reset until close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub channel_map: ChannelMap,
}

impl OutputFormat {
    pub fn new(
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
        ordering: ChannelOrdering,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PetalMixError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        let layout = ChannelLayout::from_channels(channels)?;
        Ok(Self {
            sample_rate,
            sample_format,
            channel_map: ChannelMap::new(layout, ordering),
        })
    }

    pub fn channels(&self) -> usize {
        self.channel_map.len()
    }

    pub fn layout(&self) -> ChannelLayout {
        self.channel_map.layout()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels() * self.sample_format.bytes_per_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_channel_counts() {
        for channels in [0u16, 3, 5, 9, 16] {
            assert!(ChannelLayout::from_channels(channels).is_err());
        }
    }

    #[test]
    fn test_bytes_per_frame() {
        let format =
            OutputFormat::new(48000, 6, SampleFormat::I16, ChannelOrdering::Smpte).unwrap();
        assert_eq!(format.bytes_per_frame(), 12);
        assert_eq!(format.layout(), ChannelLayout::Surround51);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(OutputFormat::new(0, 2, SampleFormat::F32, ChannelOrdering::Default).is_err());
    }
}
