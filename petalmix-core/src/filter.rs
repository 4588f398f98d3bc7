//! One-pole cascade low-pass filters.
//!
//! Every stage is the same first-order smoother, `y = x + (h - x) * a`, with
//! the stage output stored back into its history slot and fed to the next
//! stage. A coefficient of zero passes the signal through untouched, values
//! towards one darken it.

use crate::channel::MAX_CHANNELS;

/// Reference cut-off frequency the high-frequency gain is specified at.
pub const LOWPASS_CUTOFF_HZ: f32 = 5000.0;

/// History slots per channel, enough for the deepest cascade.
pub const MAX_POLES: usize = 4;

/// Gains below this make the coefficient approach one and flatten the signal.
const MIN_FILTER_GAIN: f32 = 0.01;

/// Number of cascaded one-pole stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPoles {
    One,
    #[default]
    Two,
    Four,
}

impl FilterPoles {
    pub fn count(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Scales the requested overall HF gain to the per-cascade gain handed to
    /// [`lowpass_coeff`]: squared for one pole, as-is for two, square root for
    /// four.
    pub fn prescale(self, gain_hf: f32) -> f32 {
        let gain_hf = gain_hf.max(0.0);
        match self {
            Self::One => gain_hf * gain_hf,
            Self::Two => gain_hf,
            Self::Four => gain_hf.sqrt(),
        }
    }
}

/// `cos(w)` of the reference cut-off at `sample_rate`.
pub fn cutoff_cos(sample_rate: u32) -> f32 {
    let w = 2.0 * std::f32::consts::PI * LOWPASS_CUTOFF_HZ / sample_rate as f32;
    w.cos()
}

/// Low-pass coefficient for a pre-scaled gain `g` and `cw = cos(w)`.
///
/// `g` is clamped to at least 0.01; anything at or above `1 - 1e-4` yields a
/// coefficient of zero.
pub fn lowpass_coeff(g: f32, cw: f32) -> f32 {
    let g = if g.is_nan() { 1.0 } else { g.max(MIN_FILTER_GAIN) };
    if g >= 0.9999 {
        return 0.0;
    }

    let radicand = (2.0 * g * (1.0 - cw) - g * g * (1.0 - cw * cw)).max(0.0);
    let a = (1.0 - g * cw - radicand.sqrt()) / (1.0 - g);
    if a.is_finite() { a.clamp(0.0, 0.999_999) } else { 0.0 }
}

/// Application-facing low-pass parameters attached to a source's dry path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    /// Broadband gain.
    pub gain: f32,
    /// Gain at the reference cut-off frequency.
    pub gain_hf: f32,
    pub poles: FilterPoles,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self {
            gain: 1.0,
            gain_hf: 1.0,
            poles: FilterPoles::Two,
        }
    }
}

impl LowPassFilter {
    pub fn new(gain: f32, gain_hf: f32) -> Self {
        Self {
            gain: gain.clamp(0.0, 1.0),
            gain_hf: gain_hf.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    pub fn poles(mut self, poles: FilterPoles) -> Self {
        self.poles = poles;
        self
    }
}

/// Per-source filter state: one coefficient and a fixed history block.
#[derive(Debug, Clone)]
pub struct FilterState {
    coeff: f32,
    poles: FilterPoles,
    history: [[f32; MAX_POLES]; MAX_CHANNELS],
}

impl FilterState {
    pub fn new(poles: FilterPoles) -> Self {
        Self {
            coeff: 0.0,
            poles,
            history: [[0.0; MAX_POLES]; MAX_CHANNELS],
        }
    }

    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    pub fn set_coeff(&mut self, coeff: f32) {
        self.coeff = coeff;
    }

    pub fn poles(&self) -> FilterPoles {
        self.poles
    }

    /// Changing the cascade depth clears the history; keeping the same depth
    /// leaves it alone.
    pub fn set_poles(&mut self, poles: FilterPoles) {
        if poles != self.poles {
            self.poles = poles;
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.history = [[0.0; MAX_POLES]; MAX_CHANNELS];
    }

    pub fn history(&self, channel: usize) -> &[f32] {
        &self.history[channel][..self.poles.count()]
    }

    /// Filters one sample of `channel`, updating that channel's history.
    #[inline]
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        let a = self.coeff;
        let slots = &mut self.history[channel][..self.poles.count()];

        let mut output = input;
        for slot in slots.iter_mut() {
            output += (*slot - output) * a;
            *slot = output;
        }
        output
    }
}
