//! Speaker labels and channel order tables.
//!
//! A device exposes `N` interleaved channels; the [`ChannelMap`] says which
//! speaker each interleaved slot feeds. Two orderings are supported:
//!
//! - [`ChannelOrdering::Default`]: the internal order (`FL FR BL BR FC LFE SL SR`
//!   for the surround layouts).
//! - [`ChannelOrdering::Smpte`]: the SMPTE / WAVEFORMATEXTENSIBLE order
//!   (`FL FR FC LFE BL BR SL SR`) used by CoreAudio, WASAPI and most
//!   hardware with more than four channels.
//!
//! The two orderings only differ for 5.1 and 7.1.

use crate::format::ChannelLayout;
use std::f32::consts::PI;

/// Largest supported device or buffer channel count.
pub const MAX_CHANNELS: usize = 8;

/// Logical speaker label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontLeft,
    FrontRight,
    FrontCenter,
    Lfe,
    BackLeft,
    BackRight,
    BackCenter,
    SideLeft,
    SideRight,
}

impl Channel {
    pub fn is_lfe(self) -> bool {
        matches!(self, Self::Lfe)
    }
}

/// Which interleaving convention the device expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrdering {
    #[default]
    Default,
    Smpte,
}

/// Mapping from interleaved position to speaker label for one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    layout: ChannelLayout,
    ordering: ChannelOrdering,
    labels: [Channel; MAX_CHANNELS],
    count: usize,
}

impl ChannelMap {
    pub fn new(layout: ChannelLayout, ordering: ChannelOrdering) -> Self {
        use Channel::*;

        let table: &[Channel] = match (layout, ordering) {
            (ChannelLayout::Mono, _) => &[FrontCenter],
            (ChannelLayout::Stereo, _) => &[FrontLeft, FrontRight],
            (ChannelLayout::Quad, _) => &[FrontLeft, FrontRight, BackLeft, BackRight],
            (ChannelLayout::Surround51, ChannelOrdering::Default) => {
                &[FrontLeft, FrontRight, BackLeft, BackRight, FrontCenter, Lfe]
            }
            (ChannelLayout::Surround51, ChannelOrdering::Smpte) => {
                &[FrontLeft, FrontRight, FrontCenter, Lfe, BackLeft, BackRight]
            }
            (ChannelLayout::Surround61, _) => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackCenter,
                SideLeft,
                SideRight,
            ],
            (ChannelLayout::Surround71, ChannelOrdering::Default) => &[
                FrontLeft,
                FrontRight,
                BackLeft,
                BackRight,
                FrontCenter,
                Lfe,
                SideLeft,
                SideRight,
            ],
            (ChannelLayout::Surround71, ChannelOrdering::Smpte) => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
                SideLeft,
                SideRight,
            ],
        };

        let mut labels = [FrontCenter; MAX_CHANNELS];
        labels[..table.len()].copy_from_slice(table);

        Self {
            layout,
            ordering,
            labels,
            count: table.len(),
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn ordering(&self) -> ChannelOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn labels(&self) -> &[Channel] {
        &self.labels[..self.count]
    }

    /// Interleaved slot that feeds `channel`, if the layout has that speaker.
    pub fn index_of(&self, channel: Channel) -> Option<usize> {
        self.labels().iter().position(|&c| c == channel)
    }

    /// Nominal azimuth of `channel` in this layout, in radians.
    ///
    /// Zero is straight ahead and positive angles turn to the right. Returns
    /// `None` for the LFE channel, which has no direction.
    pub fn speaker_angle(&self, channel: Channel) -> Option<f32> {
        speaker_angle(self.layout, channel)
    }
}

/// Nominal azimuth of a speaker within `layout`, in radians.
///
/// Back speakers sit at ±135° on a quad rig, ±110° on 5.1 and ±150° on 7.1
/// where the side pair takes ±90°.
pub fn speaker_angle(layout: ChannelLayout, channel: Channel) -> Option<f32> {
    let degrees = match channel {
        Channel::FrontCenter => 0.0,
        Channel::FrontLeft => -30.0,
        Channel::FrontRight => 30.0,
        Channel::SideLeft => -90.0,
        Channel::SideRight => 90.0,
        Channel::BackCenter => 180.0,
        Channel::BackLeft | Channel::BackRight => {
            let magnitude = match layout {
                ChannelLayout::Quad => 135.0,
                ChannelLayout::Surround71 => 150.0,
                _ => 110.0,
            };
            if channel == Channel::BackLeft {
                -magnitude
            } else {
                magnitude
            }
        }
        Channel::Lfe => return None,
    };
    let radians: f32 = degrees * PI / 180.0;
    Some(radians)
}

/// Speaker label of channel `index` in a buffer with `channels` channels.
///
/// Buffers always use the SMPTE interleaving, which is what decoders produce.
pub(crate) fn buffer_channel_label(channels: usize, index: usize) -> Channel {
    let layout = match channels {
        2 => ChannelLayout::Stereo,
        4 => ChannelLayout::Quad,
        6 => ChannelLayout::Surround51,
        7 => ChannelLayout::Surround61,
        8 => ChannelLayout::Surround71,
        _ => ChannelLayout::Mono,
    };
    let map = ChannelMap::new(layout, ChannelOrdering::Smpte);
    map.labels().get(index).copied().unwrap_or(Channel::FrontCenter)
}
