use crate::channel::{ChannelMap, MAX_CHANNELS};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Pairwise constant-power panner over the device's speaker ring.
///
/// Speakers are sorted by azimuth; a direction between two neighbours is
/// split between them with `cos`/`sin` weights so the summed power stays
/// constant. The LFE channel is never part of the ring.
#[derive(Debug, Clone)]
pub struct Panner {
    channels: usize,
    /// `(azimuth in [0, 2π), output slot)` sorted by azimuth.
    ring: [(f32, usize); MAX_CHANNELS],
    ring_len: usize,
    lfe: Option<usize>,
}

impl Panner {
    pub fn new(map: &ChannelMap) -> Self {
        let mut ring = [(0.0f32, 0usize); MAX_CHANNELS];
        let mut ring_len = 0;
        let mut lfe = None;

        for (slot, &label) in map.labels().iter().enumerate() {
            match map.speaker_angle(label) {
                Some(angle) => {
                    ring[ring_len] = (angle.rem_euclid(TAU), slot);
                    ring_len += 1;
                }
                None if label.is_lfe() => lfe = Some(slot),
                None => {}
            }
        }
        ring[..ring_len].sort_by(|a, b| a.0.total_cmp(&b.0));

        Self {
            channels: map.len(),
            ring,
            ring_len,
            lfe,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Output slot of the LFE speaker, if the layout has one.
    pub fn lfe(&self) -> Option<usize> {
        self.lfe
    }

    /// Writes one gain per output channel for a sound arriving from
    /// `azimuth` radians (zero ahead, positive to the right).
    ///
    /// `gains` must be at least [`channels`](Self::channels) long; only that
    /// prefix is touched.
    pub fn pan(&self, azimuth: f32, gains: &mut [f32]) {
        let gains = &mut gains[..self.channels];
        gains.fill(0.0);

        match self.ring_len {
            0 => {}
            1 => gains[self.ring[0].1] = 1.0,
            len => {
                let azimuth = if azimuth.is_finite() {
                    azimuth.rem_euclid(TAU)
                } else {
                    0.0
                };

                // Find the pair (left, right) with left <= azimuth < right,
                // wrapping past the last speaker back to the first.
                let mut index = len - 1;
                for i in 0..len {
                    if self.ring[i].0 > azimuth {
                        index = (i + len - 1) % len;
                        break;
                    }
                }
                let (start, first) = self.ring[index];
                let (mut end, second) = self.ring[(index + 1) % len];
                let mut azimuth = azimuth;
                if end <= start {
                    end += TAU;
                }
                if azimuth < start {
                    azimuth += TAU;
                }

                let t = ((azimuth - start) / (end - start)).clamp(0.0, 1.0);
                let angle = t * FRAC_PI_2;
                gains[first] += angle.cos();
                gains[second] += angle.sin();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelOrdering};
    use crate::format::ChannelLayout;

    fn panner(layout: ChannelLayout, ordering: ChannelOrdering) -> (Panner, ChannelMap) {
        let map = ChannelMap::new(layout, ordering);
        (Panner::new(&map), map)
    }

    fn degrees(value: f32) -> f32 {
        value.to_radians()
    }

    #[test]
    fn test_mono_routes_everything_to_the_single_speaker() {
        let (panner, _) = panner(ChannelLayout::Mono, ChannelOrdering::Default);
        let mut gains = [0.0; 1];
        for azimuth in [0.0, 1.0, -2.5, 3.0] {
            panner.pan(azimuth, &mut gains);
            assert_eq!(gains, [1.0]);
        }
    }

    #[test]
    fn test_stereo_center_is_equal_power() {
        let (panner, _) = panner(ChannelLayout::Stereo, ChannelOrdering::Default);
        let mut gains = [0.0; 2];
        panner.pan(0.0, &mut gains);
        assert!((gains[0] - gains[1]).abs() < 1e-6);
        assert!((gains[0] * gains[0] + gains[1] * gains[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stereo_speaker_angles_are_hard_panned() {
        let (panner, _) = panner(ChannelLayout::Stereo, ChannelOrdering::Default);
        let mut gains = [0.0; 2];
        panner.pan(degrees(-30.0), &mut gains);
        assert!((gains[0] - 1.0).abs() < 1e-5 && gains[1].abs() < 1e-5);
        panner.pan(degrees(30.0), &mut gains);
        assert!(gains[0].abs() < 1e-5 && (gains[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_power_around_the_ring() {
        for layout in [
            ChannelLayout::Stereo,
            ChannelLayout::Quad,
            ChannelLayout::Surround51,
            ChannelLayout::Surround61,
            ChannelLayout::Surround71,
        ] {
            let (panner, _) = panner(layout, ChannelOrdering::Smpte);
            let mut gains = [0.0; MAX_CHANNELS];
            let mut azimuth = -180.0f32;
            while azimuth <= 180.0 {
                panner.pan(degrees(azimuth), &mut gains);
                let power: f32 = gains.iter().map(|g| g * g).sum();
                assert!((power - 1.0).abs() < 1e-4, "{:?} at {}", layout, azimuth);
                azimuth += 7.5;
            }
        }
    }

    #[test]
    fn test_smpte_center_only_feeds_center_slot() {
        let (panner, map) = panner(ChannelLayout::Surround51, ChannelOrdering::Smpte);
        let mut gains = [0.0; 6];
        panner.pan(0.0, &mut gains);

        let center = map.index_of(Channel::FrontCenter).unwrap();
        assert_eq!(center, 2);
        for (slot, gain) in gains.iter().enumerate() {
            if slot == center {
                assert!((gain - 1.0).abs() < 1e-6);
            } else {
                assert!(gain.abs() < 1e-6, "slot {} got {}", slot, gain);
            }
        }
    }

    #[test]
    fn test_lfe_never_receives_positional_signal() {
        let (panner, map) = panner(ChannelLayout::Surround71, ChannelOrdering::Default);
        let lfe = map.index_of(Channel::Lfe).unwrap();
        assert_eq!(panner.lfe(), Some(lfe));

        let mut gains = [0.0; 8];
        for step in 0..72 {
            panner.pan(degrees(step as f32 * 5.0), &mut gains);
            assert_eq!(gains[lfe], 0.0);
        }
    }

    #[test]
    fn test_non_finite_azimuth_faces_forward() {
        let (panner, _) = panner(ChannelLayout::Stereo, ChannelOrdering::Default);
        let mut expected = [0.0; 2];
        let mut gains = [0.0; 2];
        panner.pan(0.0, &mut expected);
        panner.pan(f32::NAN, &mut gains);
        assert_eq!(gains, expected);
    }
}
