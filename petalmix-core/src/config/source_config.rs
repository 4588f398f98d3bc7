use crate::math::Vec3;
use crate::playback::LoopMode;
use crate::spatial::DistanceModel;

/// Sound cone of a directional source.
///
/// Angles are full apex angles in degrees. Inside the inner cone the source
/// plays at full gain, outside the outer cone at `outer_gain`, and the two
/// are interpolated in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    pub inner_angle: f32,
    pub outer_angle: f32,
    pub outer_gain: f32,
    /// High-frequency gain outside the outer cone, fed to the source filter.
    pub outer_gain_hf: f32,
}

impl Default for Cone {
    fn default() -> Self {
        Self {
            inner_angle: 360.0,
            outer_angle: 360.0,
            outer_gain: 0.0,
            outer_gain_hf: 1.0,
        }
    }
}

/// Per-source parameters set by the application.
///
/// Positions are in world space unless [`relative`](Self::relative) is set,
/// in which case they are taken in the listener's frame (`-Z` forward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConfig {
    pub position: Vec3,
    /// Stored for completeness; the mixer applies no Doppler shift.
    pub velocity: Vec3,
    /// Facing direction. Zero makes the source omnidirectional.
    pub direction: Vec3,
    pub relative: bool,
    pub gain: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    pub pitch: f32,
    pub loop_mode: LoopMode,
    pub reference_distance: f32,
    pub rolloff_factor: f32,
    pub max_distance: f32,
    pub distance_model: DistanceModel,
    pub cone: Cone,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            direction: Vec3::ZERO,
            relative: false,
            gain: 1.0,
            min_gain: 0.0,
            max_gain: 1.0,
            pitch: 1.0,
            loop_mode: LoopMode::Once,
            reference_distance: 1.0,
            rolloff_factor: 1.0,
            max_distance: f32::MAX,
            distance_model: DistanceModel::InverseClamped,
            cone: Cone::default(),
        }
    }
}

impl SourceConfig {
    /// A source glued to the listener with no distance attenuation, used for
    /// music and UI sounds.
    pub fn non_spatial() -> Self {
        Self {
            relative: true,
            distance_model: DistanceModel::None,
            ..Default::default()
        }
    }

    /// Create a spatial source configuration with the given position
    pub fn spatial(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a spatial source configuration with position and gain
    pub fn spatial_with_gain(position: Vec3, gain: f32) -> Self {
        Self {
            position,
            gain,
            ..Default::default()
        }
    }

    pub fn is_spatial(&self) -> bool {
        !(self.relative && self.distance_model == DistanceModel::None)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_relative(mut self, relative: bool) -> Self {
        self.relative = relative;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_gain_limits(mut self, min_gain: f32, max_gain: f32) -> Self {
        self.min_gain = min_gain;
        self.max_gain = max_gain;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Sets the attenuation curve and its parameters.
    pub fn with_distance(
        mut self,
        model: DistanceModel,
        reference_distance: f32,
        rolloff_factor: f32,
        max_distance: f32,
    ) -> Self {
        self.distance_model = model;
        self.reference_distance = reference_distance;
        self.rolloff_factor = rolloff_factor;
        self.max_distance = max_distance;
        self
    }

    pub fn with_cone(mut self, cone: Cone) -> Self {
        self.cone = cone;
        self
    }

    pub fn is_looping(&self) -> bool {
        self.loop_mode == LoopMode::Infinite
    }

    /// Replaces NaN and negative values with their defaults so the render
    /// path only ever sees usable numbers.
    pub(crate) fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let non_negative = |value: f32, fallback: f32| {
            if value.is_finite() && value >= 0.0 {
                value
            } else if value == f32::INFINITY {
                f32::MAX
            } else {
                fallback
            }
        };

        if !self.position.is_finite() {
            self.position = defaults.position;
        }
        if !self.direction.is_finite() {
            self.direction = Vec3::ZERO;
        }
        self.gain = non_negative(self.gain, defaults.gain);
        self.min_gain = non_negative(self.min_gain, defaults.min_gain).min(1.0);
        self.max_gain = non_negative(self.max_gain, defaults.max_gain).min(1.0);
        if self.max_gain < self.min_gain {
            self.max_gain = self.min_gain;
        }
        self.pitch = if self.pitch.is_finite() && self.pitch > 0.0 {
            self.pitch
        } else {
            defaults.pitch
        };
        self.reference_distance = non_negative(self.reference_distance, defaults.reference_distance);
        self.rolloff_factor = non_negative(self.rolloff_factor, defaults.rolloff_factor);
        self.max_distance = non_negative(self.max_distance, defaults.max_distance);
        self.cone.inner_angle = self.cone.inner_angle.clamp(0.0, 360.0);
        self.cone.outer_angle = self.cone.outer_angle.clamp(0.0, 360.0);
        if self.cone.inner_angle.is_nan() {
            self.cone.inner_angle = 360.0;
        }
        if self.cone.outer_angle.is_nan() {
            self.cone.outer_angle = 360.0;
        }
        self.cone.outer_gain = non_negative(self.cone.outer_gain, 0.0).min(1.0);
        self.cone.outer_gain_hf = non_negative(self.cone.outer_gain_hf, 1.0).min(1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let spatial = SourceConfig::spatial(Vec3::new(1.0, 2.0, 3.0));
        assert!(spatial.is_spatial());
        assert_eq!(spatial.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(spatial.distance_model, DistanceModel::InverseClamped);

        let ambient = SourceConfig::non_spatial();
        assert!(!ambient.is_spatial());
        assert!(ambient.relative);
    }

    #[test]
    fn test_sanitized_replaces_bad_values() {
        let config = SourceConfig::default()
            .with_gain(f32::NAN)
            .with_pitch(-2.0)
            .with_gain_limits(0.8, 0.2)
            .with_position(Vec3::new(f32::INFINITY, 0.0, 0.0))
            .sanitized();
        assert_eq!(config.gain, 1.0);
        assert_eq!(config.pitch, 1.0);
        assert_eq!(config.min_gain, 0.8);
        assert_eq!(config.max_gain, 0.8);
        assert_eq!(config.position, Vec3::ZERO);
    }

    #[test]
    fn test_builder_chain() {
        let config = SourceConfig::spatial_with_gain(Vec3::X, 0.5)
            .with_loop_mode(LoopMode::Infinite)
            .with_distance(DistanceModel::Linear, 2.0, 0.5, 20.0);
        assert!(config.is_looping());
        assert_eq!(config.gain, 0.5);
        assert_eq!(config.reference_distance, 2.0);
        assert_eq!(config.max_distance, 20.0);
    }
}
