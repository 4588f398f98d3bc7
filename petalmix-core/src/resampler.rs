//! Per-source sample fetching at an arbitrary rate ratio.
//!
//! A source reads its queue through a fixed-point [`Cursor`]. Each output
//! frame advances the cursor by a step of `pitch * buffer_rate / device_rate`
//! input frames expressed with [`FRACTION_BITS`] fractional bits, so playback
//! position is exact and identical from run to run.

use crate::audio_data::PetalMixAudioData;
use std::sync::Arc;

/// Fractional bits of the cursor.
pub const FRACTION_BITS: u32 = 14;
pub const FRACTION_ONE: u32 = 1 << FRACTION_BITS;
const FRACTION_MASK: u32 = FRACTION_ONE - 1;

/// Largest input frames consumed per output frame.
pub const MAX_STEP_RATIO: f32 = 255.0;

/// How samples between two input frames are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest earlier frame.
    Point,
    #[default]
    Linear,
}

/// Read position inside a source queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub buffer_index: usize,
    pub frame: usize,
    pub fraction: u32,
}

impl Cursor {
    pub fn rewind(&mut self) {
        *self = Self::default();
    }

    /// Frames from the start of the queue to the cursor.
    pub fn offset_in(&self, queue: &[Arc<PetalMixAudioData>]) -> usize {
        let before: usize = queue
            .iter()
            .take(self.buffer_index)
            .map(|buffer| buffer.total_frames())
            .sum();
        before + self.frame
    }
}

/// Result of fetching one output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// A frame was produced and more remain.
    Frame,
    /// A frame was produced and it was the last one of a non-looping queue.
    LastFrame,
    /// Nothing left to read; the output is untouched.
    Exhausted,
}

/// Queue boundaries crossed while fetching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounters {
    pub buffers_completed: u32,
    pub loops: u32,
}

/// Cursor step for one output frame, in fixed point.
///
/// The ratio is clamped to `(0, MAX_STEP_RATIO]`; non-finite or non-positive
/// inputs advance by the smallest representable step.
pub fn step_for(pitch: f32, buffer_rate: u32, device_rate: u32) -> u32 {
    if buffer_rate == 0 || device_rate == 0 {
        return FRACTION_ONE;
    }
    let ratio = pitch as f64 * buffer_rate as f64 / device_rate as f64;
    if !ratio.is_finite() || ratio <= 0.0 {
        return 1;
    }
    let ratio = ratio.min(MAX_STEP_RATIO as f64);
    ((ratio * FRACTION_ONE as f64).round() as u32).max(1)
}

/// Moves the cursor onto a readable frame, crossing buffers and wrapping when
/// `looping`. Returns `false` when nothing can be read.
pub fn normalize(
    queue: &[Arc<PetalMixAudioData>],
    cursor: &mut Cursor,
    looping: bool,
    counters: &mut FetchCounters,
) -> bool {
    loop {
        match queue.get(cursor.buffer_index) {
            Some(buffer) if cursor.frame < buffer.total_frames() => return true,
            Some(buffer) => {
                cursor.frame -= buffer.total_frames();
                cursor.buffer_index += 1;
                counters.buffers_completed += 1;
            }
            None => {
                if !looping || queue.iter().all(|buffer| buffer.is_empty()) {
                    return false;
                }
                cursor.buffer_index = 0;
                counters.loops += 1;
            }
        }
    }
}

/// Sample of `channel` one frame after `(index, frame)`, following the queue.
fn next_sample(
    queue: &[Arc<PetalMixAudioData>],
    mut index: usize,
    frame: usize,
    looping: bool,
    channel: usize,
) -> f32 {
    let mut frame = frame + 1;
    // Bounded so a queue of empty buffers cannot spin.
    for _ in 0..=queue.len() {
        match queue.get(index) {
            Some(buffer) if frame < buffer.total_frames() => {
                return buffer.frame(frame).get(channel).copied().unwrap_or(0.0);
            }
            Some(buffer) => {
                frame -= buffer.total_frames();
                index += 1;
            }
            None if looping => index = 0,
            None => return 0.0,
        }
    }
    0.0
}

/// Reads one interpolated frame into `out` and advances the cursor by `step`.
///
/// `out` should hold the queue's channel count; extra slots are left alone.
pub fn fetch_frame(
    queue: &[Arc<PetalMixAudioData>],
    cursor: &mut Cursor,
    step: u32,
    looping: bool,
    interpolation: Interpolation,
    out: &mut [f32],
    counters: &mut FetchCounters,
) -> Fetch {
    if !normalize(queue, cursor, looping, counters) {
        return Fetch::Exhausted;
    }

    let buffer = &queue[cursor.buffer_index];
    let current = buffer.frame(cursor.frame);
    if interpolation == Interpolation::Point || cursor.fraction == 0 {
        for (dst, &src) in out.iter_mut().zip(current) {
            *dst = src;
        }
    } else {
        let t = cursor.fraction as f32 / FRACTION_ONE as f32;
        for (channel, (dst, &a)) in out.iter_mut().zip(current).enumerate() {
            let b = next_sample(queue, cursor.buffer_index, cursor.frame, looping, channel);
            *dst = a + (b - a) * t;
        }
    }

    let position = cursor.fraction + step;
    cursor.frame += (position >> FRACTION_BITS) as usize;
    cursor.fraction = position & FRACTION_MASK;

    if normalize(queue, cursor, looping, counters) {
        Fetch::Frame
    } else {
        Fetch::LastFrame
    }
}
