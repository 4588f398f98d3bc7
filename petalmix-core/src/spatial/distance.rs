/// Attenuation curve applied to a source's gain by its distance.
///
/// The clamped variants hold the distance within
/// `[reference_distance, max_distance]` before evaluating the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceModel {
    /// No attenuation.
    None,
    Inverse,
    #[default]
    InverseClamped,
    Linear,
    LinearClamped,
    Exponent,
    ExponentClamped,
}

impl DistanceModel {
    fn is_clamped(self) -> bool {
        matches!(
            self,
            Self::InverseClamped | Self::LinearClamped | Self::ExponentClamped
        )
    }

    /// Gain factor for a source `distance` units away.
    ///
    /// Degenerate parameters (zero reference distance, equal reference and
    /// max distance, non-finite input) fall back to unity gain rather than
    /// producing NaN.
    pub fn attenuation(
        self,
        distance: f32,
        reference_distance: f32,
        rolloff_factor: f32,
        max_distance: f32,
    ) -> f32 {
        if self == Self::None {
            return 1.0;
        }

        let reference = reference_distance.max(0.0);
        let max_distance = max_distance.max(reference);
        let rolloff = rolloff_factor.max(0.0);
        let mut distance = if distance.is_nan() {
            reference
        } else {
            distance.clamp(0.0, f32::MAX)
        };
        if self.is_clamped() {
            distance = distance.clamp(reference, max_distance);
        }

        let gain = match self {
            Self::None => 1.0,
            Self::Inverse | Self::InverseClamped => {
                let denominator = reference + rolloff * (distance - reference);
                if denominator > 0.0 {
                    reference / denominator
                } else {
                    1.0
                }
            }
            Self::Linear | Self::LinearClamped => {
                if max_distance > reference {
                    (1.0 - rolloff * (distance - reference) / (max_distance - reference)).max(0.0)
                } else {
                    1.0
                }
            }
            Self::Exponent | Self::ExponentClamped => {
                if distance > 0.0 && reference > 0.0 {
                    (distance / reference).powf(-rolloff)
                } else {
                    1.0
                }
            }
        };

        if gain.is_finite() { gain.max(0.0) } else { 1.0 }
    }
}
