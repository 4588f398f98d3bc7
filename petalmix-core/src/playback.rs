//! Playback state and the render-side voice.
//!
//! - [`LoopMode`]: Control how a source's queue repeats
//! - [`PlayState`]: Current playback state, mirrored to the application
//! - [`SourceStatus`]: Atomics the renderer publishes per source
//! - [`PlaybackInstance`]: The renderer's copy of a source, with cursor and
//!   filter history
//! - [`PlaybackCommand`]: Messages from the application to the renderer
//!
//! Most users will interact with playback through
//! [`PetalMixWorld`](crate::PetalMixWorld) methods like `play()`, `pause()`
//! and `stop()`, rather than using these types directly.

use crate::audio_data::PetalMixAudioData;
use crate::channel::MAX_CHANNELS;
use crate::config::SourceConfig;
use crate::filter::{FilterState, LowPassFilter, lowpass_coeff};
use crate::math::Pose;
use crate::mixer;
use crate::resampler::{self, Cursor, Fetch, FetchCounters, Interpolation};
use crate::spatial::{self, DirectPath, SpatialContext};
use crate::world::SourceId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

/// Loop behavior for audio playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play the queue once and stop.
    /// Emits SourceCompleted event when finished
    #[default]
    Once,
    /// Wrap back to the first queued buffer forever.
    /// Emits SourceLooped event at the end of each iteration
    Infinite,
}

/// Playback state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlayState {
    /// Never played, or rewound.
    #[default]
    Initial = 0,
    Playing = 1,
    Paused = 2,
    Stopped = 3,
}

impl PlayState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Stopped,
            _ => Self::Initial,
        }
    }
}

/// Per-source values written by the renderer and read by the application.
#[derive(Debug, Default)]
pub struct SourceStatus {
    state: AtomicU8,
    buffers_processed: AtomicUsize,
    offset: AtomicU64,
    queue_epoch: AtomicU64,
}

impl SourceStatus {
    pub fn state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: PlayState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Moves to `to` only if the state is still `from`.
    pub(crate) fn transition(&self, from: PlayState, to: PlayState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Buffers fully consumed, valid for the queue tagged `queue_epoch`.
    pub fn buffers_processed(&self) -> usize {
        self.buffers_processed.load(Ordering::Acquire)
    }

    /// Frames from the start of the queue to the read cursor.
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Which queue revision the counters above describe.
    pub fn queue_epoch(&self) -> u64 {
        self.queue_epoch.load(Ordering::Acquire)
    }

    fn publish(&self, processed: usize, offset: usize, queue_epoch: u64) {
        self.buffers_processed.store(processed, Ordering::Release);
        self.offset.store(offset as u64, Ordering::Release);
        // Stored last so a reader that sees this epoch also sees its counters.
        self.queue_epoch.store(queue_epoch, Ordering::Release);
    }
}

/// Render-side state of one source.
#[derive(Debug)]
pub struct PlaybackInstance {
    source_id: SourceId,
    config: SourceConfig,
    filter: LowPassFilter,
    queue: Box<[Arc<PetalMixAudioData>]>,
    queue_epoch: u64,
    cursor: Cursor,
    state: PlayState,
    filter_state: FilterState,
    loop_count: u32,
    status: Arc<SourceStatus>,
}

/// Per-block inputs shared by every voice.
pub(crate) struct MixContext<'a> {
    pub spatial: SpatialContext<'a>,
    pub device_rate: u32,
    pub cutoff_cos: f32,
    pub interpolation: Interpolation,
    pub channels: usize,
}

/// What happened to a voice during one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MixOutcome {
    pub completed: bool,
    pub counters: FetchCounters,
}

impl PlaybackInstance {
    pub fn new(source_id: SourceId, config: SourceConfig, status: Arc<SourceStatus>) -> Self {
        let filter = LowPassFilter::default();
        Self {
            source_id,
            config,
            filter,
            queue: Box::new([]),
            queue_epoch: 0,
            cursor: Cursor::default(),
            state: PlayState::Initial,
            filter_state: FilterState::new(filter.poles),
            loop_count: 0,
            status,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub(crate) fn set_config(&mut self, config: SourceConfig) {
        self.config = config;
    }

    pub(crate) fn set_filter(&mut self, filter: LowPassFilter) {
        self.filter = filter;
    }

    /// Swaps in a new queue and returns the old one for disposal off the
    /// render thread.
    pub(crate) fn replace_queue(
        &mut self,
        queue: Box<[Arc<PetalMixAudioData>]>,
        edit: QueueEdit,
        queue_epoch: u64,
    ) -> Box<[Arc<PetalMixAudioData>]> {
        let old = std::mem::replace(&mut self.queue, queue);
        self.queue_epoch = queue_epoch;
        match edit {
            QueueEdit::Append => {}
            QueueEdit::Unqueue(removed) => {
                if self.cursor.buffer_index >= removed {
                    self.cursor.buffer_index -= removed;
                } else {
                    self.cursor.rewind();
                }
            }
            // Nothing of the new queue has been played yet.
            QueueEdit::Replace => {
                self.cursor.rewind();
                self.filter_state.reset();
            }
        }
        if self.state != PlayState::Playing && self.state != PlayState::Paused {
            self.cursor.buffer_index = self.cursor.buffer_index.min(self.queue.len());
        }
        old
    }

    /// Starts from the beginning, or resumes when paused.
    pub(crate) fn play(&mut self) {
        if self.state != PlayState::Paused {
            self.cursor.rewind();
            self.filter_state.reset();
            self.loop_count = 0;
        }
        self.set_state(PlayState::Playing);
    }

    pub(crate) fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.set_state(PlayState::Paused);
        }
    }

    /// Stops and marks every queued buffer processed.
    pub(crate) fn stop(&mut self) {
        if self.state != PlayState::Initial {
            self.cursor = Cursor {
                buffer_index: self.queue.len(),
                frame: 0,
                fraction: 0,
            };
        }
        self.set_state(PlayState::Stopped);
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor.rewind();
        self.filter_state.reset();
        self.set_state(PlayState::Initial);
    }

    fn set_state(&mut self, state: PlayState) {
        self.state = state;
        self.status.set_state(state);
    }

    /// Mirrors cursor-derived counters into the shared status.
    pub(crate) fn publish(&self) {
        let processed = self.cursor.buffer_index.min(self.queue.len());
        self.status
            .publish(processed, self.cursor.offset_in(&self.queue), self.queue_epoch);
    }

    pub(crate) fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Mixes up to `frames` frames of this voice into `accum`.
    ///
    /// Frames after the end of a non-looping queue are left untouched, and
    /// the voice moves to [`PlayState::Stopped`].
    pub(crate) fn mix(
        &mut self,
        accum: &mut [f32],
        frames: usize,
        context: &MixContext<'_>,
        path: &mut DirectPath,
    ) -> MixOutcome {
        let mut outcome = MixOutcome::default();
        if self.state != PlayState::Playing {
            return outcome;
        }

        let looping = self.config.is_looping();
        let (buffer_channels, buffer_rate) = match self.queue.first() {
            Some(first) => (first.channels() as usize, first.sample_rate()),
            None => {
                if !looping {
                    outcome.completed = true;
                    self.stop();
                }
                return outcome;
            }
        };

        spatial::direct_path(
            &context.spatial,
            &self.config,
            &self.filter,
            buffer_channels,
            path,
        );
        self.filter_state.set_poles(self.filter.poles);
        self.filter_state.set_coeff(lowpass_coeff(
            self.filter.poles.prescale(path.gain_hf),
            context.cutoff_cos,
        ));

        let step = resampler::step_for(self.config.pitch, buffer_rate, context.device_rate);
        let channels = context.channels;
        let buffer_channels = buffer_channels.min(MAX_CHANNELS);
        let mut input = [0.0f32; MAX_CHANNELS];

        for out in accum.chunks_exact_mut(channels).take(frames) {
            let fetch = resampler::fetch_frame(
                &self.queue,
                &mut self.cursor,
                step,
                looping,
                context.interpolation,
                &mut input[..buffer_channels],
                &mut outcome.counters,
            );
            if fetch == Fetch::Exhausted {
                // A looping queue of empty buffers keeps playing silence.
                outcome.completed = !looping;
                break;
            }

            for (channel, &sample) in input[..buffer_channels].iter().enumerate() {
                let filtered = self.filter_state.process(channel, sample);
                mixer::accumulate_frame(out, filtered, &path.gains[channel][..channels]);
            }

            if fetch == Fetch::LastFrame {
                outcome.completed = true;
                break;
            }
        }

        self.loop_count = self.loop_count.wrapping_add(outcome.counters.loops);
        if outcome.completed {
            self.set_state(PlayState::Stopped);
        }
        outcome
    }
}

/// Objects the renderer hands back so they are freed on the application
/// thread.
#[derive(Debug)]
pub(crate) enum Retired {
    Voice(#[allow(dead_code)] Box<PlaybackInstance>),
    Queue(#[allow(dead_code)] Box<[Arc<PetalMixAudioData>]>),
}

/// How a new queue relates to the one it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEdit {
    /// Buffers were added at the tail.
    Append,
    /// This many processed buffers were taken off the head.
    Unqueue(usize),
    /// The queue was swapped out wholesale.
    Replace,
}

/// Commands sent from the application to the renderer.
///
/// These are used internally to communicate between the world and the render
/// thread. Most users will interact with playback through
/// [`PetalMixWorld`](crate::PetalMixWorld) methods instead.
#[derive(Debug)]
pub enum PlaybackCommand {
    AddSource(Box<PlaybackInstance>),
    RemoveSource(SourceId),
    UpdateConfig(SourceId, SourceConfig),
    SetFilter(SourceId, LowPassFilter),
    SetQueue {
        source_id: SourceId,
        queue: Box<[Arc<PetalMixAudioData>]>,
        edit: QueueEdit,
        queue_epoch: u64,
    },
    Play(SourceId),
    Pause(SourceId),
    Stop(SourceId),
    Rewind(SourceId),
    StopAll,
    SetListener { pose: Pose, gain: f32 },
}
