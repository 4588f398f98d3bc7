//! Positional gain computation.
//!
//! Turns a source's parameters and the listener pose into a gain matrix
//! (buffer channel × output slot) plus the high-frequency gain that drives
//! the source's low-pass filter. Evaluated once per source per block.

mod distance;
mod panner;

pub use distance::DistanceModel;
pub use panner::Panner;

use crate::channel::{MAX_CHANNELS, buffer_channel_label, speaker_angle};
use crate::config::SourceConfig;
use crate::filter::LowPassFilter;
use crate::format::ChannelLayout;
use crate::math::{Pose, Vec3};

/// Below this a vector has no usable direction.
const DIRECTION_EPSILON: f32 = 1e-6;

/// Listener-side inputs shared by every source in a block.
#[derive(Debug, Clone, Copy)]
pub struct SpatialContext<'a> {
    pub panner: &'a Panner,
    pub listener: &'a Pose,
    pub listener_gain: f32,
    pub head_dampen: f32,
}

/// Gains of one source's dry path for the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectPath {
    /// `gains[input_channel][output_slot]`.
    pub gains: [[f32; MAX_CHANNELS]; MAX_CHANNELS],
    /// Overall gain at the filter's reference frequency, before pole prescale.
    pub gain_hf: f32,
}

impl Default for DirectPath {
    fn default() -> Self {
        Self {
            gains: [[0.0; MAX_CHANNELS]; MAX_CHANNELS],
            gain_hf: 1.0,
        }
    }
}

/// Source position in listener space as `(right, up, forward)`.
fn local_position(config: &SourceConfig, listener: &Pose) -> Vec3 {
    if config.relative {
        Vec3::new(config.position.x, config.position.y, -config.position.z)
    } else {
        listener.to_local(config.position)
    }
}

fn local_direction(config: &SourceConfig, listener: &Pose) -> Vec3 {
    if config.relative {
        Vec3::new(config.direction.x, config.direction.y, -config.direction.z)
    } else {
        listener.direction_to_local(config.direction)
    }
}

/// Azimuth of a listener-space vector: zero ahead, positive to the right.
pub fn azimuth(local: Vec3) -> f32 {
    if local.x.abs() < DIRECTION_EPSILON && local.z.abs() < DIRECTION_EPSILON {
        0.0
    } else {
        local.x.atan2(local.z)
    }
}

/// Cone gain and cone HF gain for a listener-space source position.
fn cone_gains(config: &SourceConfig, local: Vec3, listener: &Pose) -> (f32, f32) {
    let facing = local_direction(config, listener);
    let to_listener = -local;
    if facing.length() < DIRECTION_EPSILON || to_listener.length() < DIRECTION_EPSILON {
        return (1.0, 1.0);
    }

    let cone = &config.cone;
    // Full apex angle between the facing direction and the listener.
    let angle = facing.angle_between(to_listener).to_degrees() * 2.0;
    if angle > cone.inner_angle && angle <= cone.outer_angle {
        let span = (cone.outer_angle - cone.inner_angle).max(f32::EPSILON);
        let t = (angle - cone.inner_angle) / span;
        (
            1.0 + (cone.outer_gain - 1.0) * t,
            1.0 + (cone.outer_gain_hf - 1.0) * t,
        )
    } else if angle > cone.outer_angle {
        (cone.outer_gain, cone.outer_gain_hf)
    } else {
        (1.0, 1.0)
    }
}

/// High-frequency factor for sources behind the listener's head.
///
/// Scales linearly from 1 at the side to `1 - head_dampen` directly behind.
fn head_dampening(local: Vec3, head_dampen: f32) -> f32 {
    let distance = local.length();
    if head_dampen <= 0.0 || distance < DIRECTION_EPSILON || local.z >= 0.0 {
        return 1.0;
    }
    let behind = (-local.z / distance).clamp(0.0, 1.0);
    1.0 - head_dampen * behind
}

/// Applies the source's gain limits without trusting `min_gain <= max_gain`.
fn clamp_gain(gain: f32, config: &SourceConfig) -> f32 {
    gain.max(config.min_gain).min(config.max_gain)
}

/// Fills `out` for a source playing a `buffer_channels`-channel buffer.
///
/// Mono buffers are positioned; multichannel buffers keep their own layout,
/// each channel panned to its speaker's nominal angle with only the source
/// gain applied.
pub fn direct_path(
    context: &SpatialContext<'_>,
    config: &SourceConfig,
    filter: &LowPassFilter,
    buffer_channels: usize,
    out: &mut DirectPath,
) {
    let outputs = context.panner.channels();
    let shared_gain = context.listener_gain.max(0.0) * filter.gain;
    *out = DirectPath::default();

    if buffer_channels <= 1 {
        let local = local_position(config, context.listener);
        let attenuation = config.distance_model.attenuation(
            local.length(),
            config.reference_distance,
            config.rolloff_factor,
            config.max_distance,
        );
        let (cone_gain, cone_gain_hf) = cone_gains(config, local, context.listener);

        let gain = clamp_gain(config.gain * attenuation * cone_gain, config) * shared_gain;
        out.gain_hf = filter.gain_hf * cone_gain_hf * head_dampening(local, context.head_dampen);

        let row = &mut out.gains[0];
        context.panner.pan(azimuth(local), row);
        for slot in &mut row[..outputs] {
            *slot *= gain;
        }
        return;
    }

    let gain = clamp_gain(config.gain, config) * shared_gain;
    out.gain_hf = filter.gain_hf;
    let layout =
        ChannelLayout::from_channels(buffer_channels as u16).unwrap_or(ChannelLayout::Mono);

    for (input, row) in out.gains.iter_mut().enumerate().take(buffer_channels) {
        let label = buffer_channel_label(buffer_channels, input);
        if label.is_lfe() {
            if let Some(lfe) = context.panner.lfe() {
                row[lfe] = gain;
            }
            continue;
        }
        let angle = speaker_angle(layout, label).unwrap_or(0.0);
        context.panner.pan(angle, row);
        for slot in &mut row[..outputs] {
            *slot *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelMap, ChannelOrdering};
    use crate::config::Cone;
    use crate::math::Quat;

    fn stereo() -> Panner {
        Panner::new(&ChannelMap::new(
            ChannelLayout::Stereo,
            ChannelOrdering::Default,
        ))
    }

    fn compute(config: &SourceConfig, listener: &Pose, panner: &Panner, channels: usize) -> DirectPath {
        let context = SpatialContext {
            panner,
            listener,
            listener_gain: 1.0,
            head_dampen: 0.5,
        };
        let mut out = DirectPath::default();
        direct_path(&context, config, &LowPassFilter::default(), channels, &mut out);
        out
    }

    #[test]
    fn test_source_on_the_right_favours_right_speaker() {
        let panner = stereo();
        let config = SourceConfig::spatial(Vec3::new(3.0, 0.0, 0.0));
        let path = compute(&config, &Pose::identity(), &panner, 1);
        assert!(path.gains[0][1] > path.gains[0][0]);
    }

    #[test]
    fn test_listener_rotation_is_applied() {
        let panner = stereo();
        // Turned to face +X, a source at +X is straight ahead.
        let listener = Pose::new(Vec3::ZERO, Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2));
        let config = SourceConfig::spatial(Vec3::new(1.0, 0.0, 0.0));
        let path = compute(&config, &listener, &panner, 1);
        assert!((path.gains[0][0] - path.gains[0][1]).abs() < 1e-4);
    }

    #[test]
    fn test_source_at_listener_is_centred() {
        let panner = stereo();
        let config = SourceConfig::spatial(Vec3::ZERO);
        let path = compute(&config, &Pose::identity(), &panner, 1);
        assert!((path.gains[0][0] - path.gains[0][1]).abs() < 1e-6);
        assert!(path.gains[0][0] > 0.0);
    }

    #[test]
    fn test_distance_attenuates_and_gain_limits_apply() {
        let panner = stereo();
        let near = compute(&SourceConfig::spatial(Vec3::new(0.0, 0.0, -1.0)), &Pose::identity(), &panner, 1);
        let far = compute(&SourceConfig::spatial(Vec3::new(0.0, 0.0, -8.0)), &Pose::identity(), &panner, 1);
        assert!(far.gains[0][0] < near.gains[0][0]);

        let floored = SourceConfig::spatial(Vec3::new(0.0, 0.0, -1000.0)).with_gain_limits(0.5, 1.0);
        let path = compute(&floored, &Pose::identity(), &panner, 1);
        let power: f32 = path.gains[0][..2].iter().map(|g| g * g).sum();
        assert!((power.sqrt() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_relative_source_ignores_listener_pose() {
        let panner = stereo();
        let listener = Pose::new(Vec3::new(100.0, 0.0, 0.0), Quat::from_rotation_y(1.0));
        let config = SourceConfig::spatial(Vec3::new(2.0, 0.0, 0.0)).with_relative(true);
        let moved = compute(&config, &listener, &panner, 1);
        let origin = compute(&config, &Pose::identity(), &panner, 1);
        assert_eq!(moved, origin);
    }

    #[test]
    fn test_cone_outside_uses_outer_gain() {
        let panner = stereo();
        let cone = Cone {
            inner_angle: 30.0,
            outer_angle: 90.0,
            outer_gain: 0.25,
            outer_gain_hf: 0.5,
        };
        // Facing away from the listener.
        let config = SourceConfig::spatial(Vec3::new(0.0, 0.0, -1.0))
            .with_direction(Vec3::new(0.0, 0.0, -1.0))
            .with_cone(cone);
        let away = compute(&config, &Pose::identity(), &panner, 1);
        let facing = compute(
            &config.with_direction(Vec3::new(0.0, 0.0, 1.0)),
            &Pose::identity(),
            &panner,
            1,
        );
        assert!((away.gains[0][0] / facing.gains[0][0] - 0.25).abs() < 1e-4);
        assert!((away.gain_hf - 0.5).abs() < 1e-6);
        assert_eq!(facing.gain_hf, 1.0);
    }

    #[test]
    fn test_head_dampening_only_behind() {
        let panner = stereo();
        let front = compute(&SourceConfig::spatial(Vec3::new(0.0, 0.0, -2.0)), &Pose::identity(), &panner, 1);
        let behind = compute(&SourceConfig::spatial(Vec3::new(0.0, 0.0, 2.0)), &Pose::identity(), &panner, 1);
        assert_eq!(front.gain_hf, 1.0);
        assert!((behind.gain_hf - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_buffer_keeps_its_layout() {
        let panner = stereo();
        let config = SourceConfig::spatial(Vec3::new(50.0, 0.0, 0.0));
        let path = compute(&config, &Pose::identity(), &panner, 2);
        assert!((path.gains[0][0] - 1.0).abs() < 1e-5);
        assert!(path.gains[0][1].abs() < 1e-5);
        assert!(path.gains[1][0].abs() < 1e-5);
        assert!((path.gains[1][1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_surround_buffer_lfe_dropped_on_stereo() {
        let panner = stereo();
        let path = compute(&SourceConfig::default(), &Pose::identity(), &panner, 6);
        // SMPTE buffer order: FL FR FC LFE BL BR.
        assert_eq!(path.gains[3][0], 0.0);
        assert_eq!(path.gains[3][1], 0.0);
        assert!(path.gains[2][0] > 0.0 && path.gains[2][1] > 0.0);
    }
}
