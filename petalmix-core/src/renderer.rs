//! The real-time half of the mixer.
//!
//! A [`Renderer`] is created once per world and moved onto the audio thread.
//! Each call drains pending commands, mixes every playing source block by
//! block into an `f32` accumulator and packs the result into the device
//! format. It never locks, blocks, logs or allocates: storage is sized when
//! the renderer is built, and anything that must be freed travels back to the
//! application thread.

use crate::error::Result;
use crate::events::PetalMixEvent;
use crate::filter::cutoff_cos;
use crate::format::OutputFormat;
use crate::math::Pose;
use crate::mixer::{self, PcmSample};
use crate::playback::{MixContext, PlayState, PlaybackCommand, PlaybackInstance, Retired};
use crate::resampler::Interpolation;
use crate::spatial::{DirectPath, Panner, SpatialContext};
use crate::world::{PetalMixWorld, RenderSide, SourceId};
use crossbeam_channel::Receiver;
use ringbuf::HeapProd;
use ringbuf::traits::Producer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the renderer keeps for the application.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames_rendered: AtomicU64,
    render_calls: AtomicU64,
    dropped_events: AtomicU64,
    freed_on_render_thread: AtomicU64,
}

impl RenderStats {
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn render_calls(&self) -> u64 {
        self.render_calls.load(Ordering::Relaxed)
    }

    /// Events lost because the application did not poll in time.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Objects the renderer had to free itself because the retire ring was
    /// full.
    pub fn freed_on_render_thread(&self) -> u64 {
        self.freed_on_render_thread.load(Ordering::Relaxed)
    }
}

/// Mixes a world's sources into device buffers.
pub struct Renderer {
    format: OutputFormat,
    block_size: usize,
    interpolation: Interpolation,
    head_dampen: f32,
    cutoff_cos: f32,
    panner: Panner,
    listener_pose: Pose,
    listener_gain: f32,
    max_voices: usize,
    voices: Vec<Box<PlaybackInstance>>,
    accum: Vec<f32>,
    path: DirectPath,
    commands: Receiver<PlaybackCommand>,
    events: HeapProd<PetalMixEvent>,
    retired: HeapProd<Retired>,
    stats: Arc<RenderStats>,
}

impl Renderer {
    /// Creates the renderer for `world`. Only one renderer may exist per
    /// world.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a renderer was already created.
    pub fn new(world: &PetalMixWorld) -> Result<Self> {
        let RenderSide {
            commands,
            events,
            retired,
        } = world.take_render_side()?;
        let format = *world.format();
        let desc = world.desc();
        let listener = world.listener();

        log::debug!(
            "Renderer ready: {} voices max, {} frame blocks, {:?} interpolation",
            desc.max_sources,
            desc.block_size,
            desc.interpolation
        );

        Ok(Self {
            format,
            block_size: desc.block_size,
            interpolation: desc.interpolation,
            head_dampen: desc.head_dampen,
            cutoff_cos: cutoff_cos(format.sample_rate),
            panner: Panner::new(&format.channel_map),
            listener_pose: listener.pose(),
            listener_gain: listener.gain(),
            max_voices: desc.max_sources,
            voices: Vec::with_capacity(desc.max_sources),
            accum: vec![0.0; desc.block_size * format.channels()],
            path: DirectPath::default(),
            commands,
            events,
            retired,
            stats: world.stats().clone(),
        })
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Number of sources currently known to the renderer.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders `frames` frames into `out` as native-endian bytes of the
    /// device sample format.
    ///
    /// Writes exactly `frames * bytes_per_frame` bytes, or fewer frames if
    /// `out` is too short; returns the number of frames written.
    pub fn render(&mut self, out: &mut [u8], frames: usize) -> usize {
        let bytes_per_frame = self.format.bytes_per_frame();
        let frames = frames.min(out.len() / bytes_per_frame);
        let channels = self.format.channels();
        let sample_format = self.format.sample_format;

        self.begin();
        let mut done = 0;
        while done < frames {
            let count = (frames - done).min(self.block_size);
            self.mix_block(count);
            mixer::pack(
                &self.accum[..count * channels],
                sample_format,
                &mut out[done * bytes_per_frame..(done + count) * bytes_per_frame],
            );
            done += count;
        }
        self.finish(frames);
        frames
    }

    /// Renders into a typed interleaved slice, filling all of it.
    ///
    /// Returns the number of frames written.
    pub fn render_into<T: PcmSample>(&mut self, out: &mut [T]) -> usize {
        let channels = self.format.channels();
        let frames = out.len() / channels;

        self.begin();
        let mut done = 0;
        while done < frames {
            let count = (frames - done).min(self.block_size);
            self.mix_block(count);
            mixer::pack_typed(
                &self.accum[..count * channels],
                &mut out[done * channels..(done + count) * channels],
            );
            done += count;
        }
        // A trailing partial frame, if any, is silence.
        for sample in &mut out[frames * channels..] {
            *sample = T::from_f32(0.0);
        }
        self.finish(frames);
        frames
    }

    fn begin(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn finish(&mut self, frames: usize) {
        for voice in &self.voices {
            voice.publish();
        }
        self.stats
            .frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
        self.stats.render_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn emit(&mut self, event: PetalMixEvent) {
        if self.events.try_push(event).is_err() {
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn retire(&mut self, object: Retired) {
        if let Err(object) = self.retired.try_push(object) {
            self.stats
                .freed_on_render_thread
                .fetch_add(1, Ordering::Relaxed);
            drop(object);
        }
    }

    fn voice_mut(&mut self, id: SourceId) -> Option<&mut PlaybackInstance> {
        self.voices
            .iter_mut()
            .find(|voice| voice.source_id() == id)
            .map(|voice| &mut **voice)
    }

    fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::AddSource(voice) => {
                if self.voices.len() < self.max_voices {
                    self.voices.push(voice);
                } else {
                    self.retire(Retired::Voice(voice));
                }
            }
            PlaybackCommand::RemoveSource(id) => {
                if let Some(index) = self.voices.iter().position(|v| v.source_id() == id) {
                    let voice = self.voices.swap_remove(index);
                    self.retire(Retired::Voice(voice));
                }
            }
            PlaybackCommand::UpdateConfig(id, config) => {
                if let Some(voice) = self.voice_mut(id) {
                    voice.set_config(config);
                }
            }
            PlaybackCommand::SetFilter(id, filter) => {
                if let Some(voice) = self.voice_mut(id) {
                    voice.set_filter(filter);
                }
            }
            PlaybackCommand::SetQueue {
                source_id,
                queue,
                edit,
                queue_epoch,
            } => match self.voice_mut(source_id) {
                Some(voice) => {
                    let old = voice.replace_queue(queue, edit, queue_epoch);
                    voice.publish();
                    self.retire(Retired::Queue(old));
                }
                None => self.retire(Retired::Queue(queue)),
            },
            PlaybackCommand::Play(id) => {
                if let Some(voice) = self.voice_mut(id) {
                    voice.play();
                    self.emit(PetalMixEvent::SourceStarted { source_id: id });
                }
            }
            PlaybackCommand::Pause(id) => {
                if let Some(voice) = self.voice_mut(id) {
                    if voice.state() == PlayState::Playing {
                        voice.pause();
                        self.emit(PetalMixEvent::SourcePaused { source_id: id });
                    }
                }
            }
            PlaybackCommand::Stop(id) => {
                if let Some(voice) = self.voice_mut(id) {
                    voice.stop();
                    self.emit(PetalMixEvent::SourceStopped { source_id: id });
                }
            }
            PlaybackCommand::Rewind(id) => {
                if let Some(voice) = self.voice_mut(id) {
                    voice.rewind();
                }
            }
            PlaybackCommand::StopAll => {
                for index in 0..self.voices.len() {
                    let voice = &mut self.voices[index];
                    let was_active =
                        matches!(voice.state(), PlayState::Playing | PlayState::Paused);
                    voice.stop();
                    if was_active {
                        let source_id = voice.source_id();
                        self.emit(PetalMixEvent::SourceStopped { source_id });
                    }
                }
            }
            PlaybackCommand::SetListener { pose, gain } => {
                self.listener_pose = pose;
                self.listener_gain = gain;
            }
        }
    }

    fn mix_block(&mut self, frames: usize) {
        let channels = self.format.channels();
        let accum = &mut self.accum[..frames * channels];
        mixer::clear(accum);

        let context = MixContext {
            spatial: SpatialContext {
                panner: &self.panner,
                listener: &self.listener_pose,
                listener_gain: self.listener_gain,
                head_dampen: self.head_dampen,
            },
            device_rate: self.format.sample_rate,
            cutoff_cos: self.cutoff_cos,
            interpolation: self.interpolation,
            channels,
        };

        for voice in self.voices.iter_mut() {
            if voice.state() != PlayState::Playing {
                continue;
            }
            let outcome = voice.mix(accum, frames, &context, &mut self.path);
            let source_id = voice.source_id();

            if outcome.counters.buffers_completed > 0 {
                push_event(
                    &mut self.events,
                    &self.stats,
                    PetalMixEvent::BuffersProcessed {
                        source_id,
                        processed: outcome.counters.buffers_completed as usize,
                    },
                );
            }
            if outcome.counters.loops > 0 {
                push_event(
                    &mut self.events,
                    &self.stats,
                    PetalMixEvent::SourceLooped {
                        source_id,
                        loop_count: voice.loop_count(),
                    },
                );
            }
            if outcome.completed {
                push_event(
                    &mut self.events,
                    &self.stats,
                    PetalMixEvent::SourceCompleted { source_id },
                );
            }
        }
    }
}

/// `emit` for use while the voice list is mutably borrowed.
fn push_event(events: &mut HeapProd<PetalMixEvent>, stats: &RenderStats, event: PetalMixEvent) {
    if events.try_push(event).is_err() {
        stats.dropped_events.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelOrdering};
    use crate::config::{DeviceDesc, SourceConfig};
    use crate::filter::LowPassFilter;
    use crate::format::SampleFormat;
    use crate::math::Vec3;
    use crate::playback::LoopMode;
    use std::thread;
    use std::time::Duration;

    fn setup(desc: DeviceDesc) -> (Arc<PetalMixWorld>, Renderer) {
        let world = Arc::new(PetalMixWorld::new(desc).unwrap());
        let renderer = Renderer::new(&world).unwrap();
        (world, renderer)
    }

    fn mono_desc(block_size: usize) -> DeviceDesc {
        DeviceDesc::default()
            .channels(1)
            .sample_format(SampleFormat::F32)
            .block_size(block_size)
    }

    fn render_f32(renderer: &mut Renderer, frames: usize) -> Vec<f32> {
        let mut out = vec![1.0f32; frames * renderer.format().channels()];
        assert_eq!(renderer.render_into(&mut out), frames);
        out
    }

    /// Ramp distinct from silence at every frame.
    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 + 1.0) / (len as f32 + 1.0)).collect()
    }

    #[test]
    fn test_second_renderer_is_rejected() {
        let (world, _renderer) = setup(DeviceDesc::default());
        assert!(Renderer::new(&world).is_err());
    }

    #[test]
    fn test_zero_sources_render_silence_in_every_format() {
        for (format, silence) in [
            (SampleFormat::U8, 0x80u8),
            (SampleFormat::I8, 0),
            (SampleFormat::I16, 0),
            (SampleFormat::I32, 0),
            (SampleFormat::F32, 0),
        ] {
            for channels in [1u16, 2, 4, 6, 7, 8] {
                let (_world, mut renderer) = setup(
                    DeviceDesc::default()
                        .channels(channels)
                        .sample_format(format)
                        .block_size(64),
                );
                let bytes_per_frame = renderer.format().bytes_per_frame();
                let mut out = vec![0x5au8; 300 * bytes_per_frame];
                assert_eq!(renderer.render(&mut out, 300), 300);
                assert!(out.iter().all(|&b| b == silence), "{:?} x{}", format, channels);
            }
        }
    }

    #[test]
    fn test_render_writes_exactly_the_requested_bytes() {
        let (_world, mut renderer) = setup(DeviceDesc::default().sample_format(SampleFormat::I16));
        let mut out = vec![0x5au8; 64];
        assert_eq!(renderer.render(&mut out, 10), 10);
        assert!(out[..40].iter().all(|&b| b == 0));
        assert!(out[40..].iter().all(|&b| b == 0x5a));
    }

    #[test]
    fn test_non_looping_source_stops_after_exact_length() {
        for (length, block) in [(100usize, 32usize), (96, 32), (1, 16), (37, 1)] {
            let (world, mut renderer) = setup(mono_desc(block));
            let samples = ramp(length);
            let buffer = world.create_buffer_from_f32(samples.clone(), 48000, 1).unwrap();
            let source = world.create_source(SourceConfig::non_spatial()).unwrap();
            world.set_buffer(source, Some(buffer)).unwrap();
            world.play(source).unwrap();

            let mut rendered = Vec::new();
            for _ in 0..(length / block + 3) {
                rendered.extend(render_f32(&mut renderer, block));
            }

            assert_eq!(&rendered[..length], samples.as_slice());
            assert!(rendered[length..].iter().all(|&s| s == 0.0));
            assert_eq!(world.source_state(source).unwrap(), PlayState::Stopped);
            assert_eq!(world.buffers_processed(source).unwrap(), 1);

            let events = world.poll_events();
            let completed = events
                .iter()
                .filter(|e| matches!(e, PetalMixEvent::SourceCompleted { .. }))
                .count();
            assert_eq!(completed, 1);
        }
    }

    #[test]
    fn test_looping_source_repeats_waveform() {
        let length = 50;
        let (world, mut renderer) = setup(mono_desc(16));
        let samples = ramp(length);
        let buffer = world.create_buffer_from_f32(samples.clone(), 48000, 1).unwrap();
        let source = world
            .create_source(SourceConfig::non_spatial().with_loop_mode(LoopMode::Infinite))
            .unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let mut rendered = Vec::new();
        while rendered.len() < 2 * length {
            rendered.extend(render_f32(&mut renderer, 16));
        }
        assert_eq!(&rendered[..length], samples.as_slice());
        assert_eq!(&rendered[length..2 * length], samples.as_slice());
        assert_eq!(world.source_state(source).unwrap(), PlayState::Playing);
        assert!(world
            .poll_events()
            .iter()
            .any(|e| matches!(e, PetalMixEvent::SourceLooped { .. })));
    }

    #[test]
    fn test_smpte_centre_source_feeds_only_centre_slot() {
        let (world, mut renderer) = setup(
            DeviceDesc::default()
                .channels(6)
                .channel_ordering(ChannelOrdering::Smpte),
        );
        let centre = renderer
            .format()
            .channel_map
            .index_of(Channel::FrontCenter)
            .unwrap();
        assert_eq!(centre, 2);

        let buffer = world.create_buffer_from_f32(vec![0.5; 64], 48000, 1).unwrap();
        let source = world
            .create_source(SourceConfig::spatial(Vec3::new(0.0, 0.0, -1.0)))
            .unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let out = render_f32(&mut renderer, 32);
        for frame in out.chunks_exact(6) {
            for (slot, &sample) in frame.iter().enumerate() {
                if slot == centre {
                    assert!((sample - 0.5).abs() < 1e-5);
                } else {
                    assert!(sample.abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_pitch_and_rate_conversion() {
        let (world, mut renderer) = setup(mono_desc(64));
        // 24 kHz buffer on a 48 kHz device plays each frame twice as long.
        let buffer = world
            .create_buffer_from_f32(vec![0.25, 0.75, 0.25, 0.75], 24000, 1)
            .unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let out = render_f32(&mut renderer, 10);
        assert_eq!(&out[..8], &[0.25, 0.5, 0.75, 0.5, 0.25, 0.5, 0.75, 0.375]);
        assert_eq!(&out[8..], &[0.0, 0.0]);
    }

    #[test]
    fn test_queue_crossing_and_unqueue() {
        let (world, mut renderer) = setup(mono_desc(8));
        let first = world.create_buffer_from_f32(vec![0.1; 5], 48000, 1).unwrap();
        let second = world.create_buffer_from_f32(vec![0.2; 5], 48000, 1).unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.queue_buffers(source, &[first, second]).unwrap();
        world.play(source).unwrap();

        let out = render_f32(&mut renderer, 8);
        assert_eq!(&out[..5], &[0.1; 5]);
        assert_eq!(&out[5..], &[0.2; 3]);
        assert_eq!(world.buffers_processed(source).unwrap(), 1);
        assert_eq!(world.source_offset(source).unwrap(), 8);

        assert_eq!(world.unqueue_processed(source).unwrap(), vec![first]);
        // Not yet acknowledged by the renderer.
        assert_eq!(world.buffers_processed(source).unwrap(), 0);
        render_f32(&mut renderer, 1);
        world.collect_garbage();
        world.delete_buffer(first).unwrap();

        let out = render_f32(&mut renderer, 4);
        assert_eq!(&out[..1], &[0.2]);
        assert_eq!(&out[1..], &[0.0; 3]);
    }

    #[test]
    fn test_pause_and_stop_are_observed_next_call() {
        let (world, mut renderer) = setup(mono_desc(16));
        let buffer = world.create_buffer_from_f32(vec![0.5; 64], 48000, 1).unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();
        render_f32(&mut renderer, 16);

        world.pause(source).unwrap();
        assert!(render_f32(&mut renderer, 16).iter().all(|&s| s == 0.0));
        assert_eq!(world.source_offset(source).unwrap(), 16);

        world.play(source).unwrap();
        assert!(render_f32(&mut renderer, 16).iter().all(|&s| s == 0.5));

        world.stop(source).unwrap();
        assert!(render_f32(&mut renderer, 16).iter().all(|&s| s == 0.0));
        assert_eq!(world.buffers_processed(source).unwrap(), 1);
    }

    #[test]
    fn test_filter_darkens_but_keeps_dc() {
        let (world, mut renderer) = setup(mono_desc(256));
        let buffer = world.create_buffer_from_f32(vec![0.5; 4096], 48000, 1).unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world
            .set_direct_filter(source, LowPassFilter::new(1.0, 0.1))
            .unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let out = render_f32(&mut renderer, 2048);
        assert!(out[0] < 0.5);
        assert!((out[2047] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_deleted_source_is_returned_for_cleanup() {
        let (world, mut renderer) = setup(mono_desc(16));
        let source = world.create_source(SourceConfig::default()).unwrap();
        render_f32(&mut renderer, 16);
        assert_eq!(renderer.voice_count(), 1);

        world.delete_source(source).unwrap();
        render_f32(&mut renderer, 16);
        assert_eq!(renderer.voice_count(), 0);
        assert_eq!(world.collect_garbage(), 1);
    }

    #[test]
    fn test_concurrent_parameter_changes_while_rendering() {
        let (world, mut renderer) = setup(
            DeviceDesc::default()
                .channels(2)
                .block_size(128)
                .command_capacity(64),
        );
        let tone: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let buffer = world.create_buffer_from_f32(tone, 48000, 1).unwrap();
        let config =
            SourceConfig::spatial(Vec3::new(1.0, 0.0, -1.0)).with_loop_mode(LoopMode::Infinite);
        let source = world.create_source(config).unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let render_thread = thread::spawn(move || {
            let mut out = vec![0.0f32; 512 * 2];
            for _ in 0..400 {
                renderer.render_into(&mut out);
                assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
            }
            renderer
        });

        for step in 0..2000 {
            let flip = if step % 2 == 0 { 1.0 } else { -1.0 };
            let result = world.update_source_params(source, |config| {
                config.position = Vec3::new(flip * 3.0, 0.0, -1.0);
                config.gain = if step % 3 == 0 { 0.0 } else { 1.0 };
            });
            match result {
                Ok(()) | Err(crate::error::PetalMixError::CommandQueueFull(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
            world.poll_events();
            if step % 100 == 0 {
                thread::sleep(Duration::from_micros(50));
            }
        }

        let renderer = render_thread.join().unwrap();
        assert_eq!(renderer.voice_count(), 1);
        assert_eq!(world.source_state(source).unwrap(), PlayState::Playing);
    }

    #[test]
    fn test_set_buffer_after_completion_starts_fresh() {
        let (world, mut renderer) = setup(mono_desc(8));
        let first = world.create_buffer_from_f32(vec![0.5; 4], 48000, 1).unwrap();
        let second = world.create_buffer_from_f32(vec![0.25; 4], 48000, 1).unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.set_buffer(source, Some(first)).unwrap();
        world.play(source).unwrap();
        render_f32(&mut renderer, 8);
        assert_eq!(world.source_state(source).unwrap(), PlayState::Stopped);

        world.set_buffer(source, Some(second)).unwrap();
        render_f32(&mut renderer, 8);
        assert_eq!(world.buffers_processed(source).unwrap(), 0);
        assert_eq!(world.source_offset(source).unwrap(), 0);
        assert!(world.unqueue_processed(source).unwrap().is_empty());

        world.play(source).unwrap();
        let out = render_f32(&mut renderer, 8);
        assert_eq!(&out[..4], &[0.25; 4]);
        assert_eq!(&out[4..], &[0.0; 4]);
    }

    #[test]
    fn test_pause_after_completion_stays_stopped() {
        let (world, mut renderer) = setup(mono_desc(8));
        let buffer = world.create_buffer_from_f32(vec![0.5; 4], 48000, 1).unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();
        render_f32(&mut renderer, 8);

        world.pause(source).unwrap();
        assert_eq!(world.source_state(source).unwrap(), PlayState::Stopped);
        render_f32(&mut renderer, 8);
        assert_eq!(world.source_state(source).unwrap(), PlayState::Stopped);
        assert!(world.set_buffer(source, Some(buffer)).is_ok());
    }

    #[test]
    fn test_overlapping_sources_sum_and_saturate() {
        let (world, mut renderer) = setup(
            DeviceDesc::default()
                .channels(1)
                .sample_format(SampleFormat::I16)
                .block_size(16),
        );
        let play = |value: f32, frames: usize| {
            let buffer = world
                .create_buffer_from_f32(vec![value; frames], 48000, 1)
                .unwrap();
            let source = world.create_source(SourceConfig::non_spatial()).unwrap();
            world.set_buffer(source, Some(buffer)).unwrap();
            world.play(source).unwrap();
            source
        };
        let render_i16 = |renderer: &mut Renderer, frames: usize| {
            let mut bytes = vec![0u8; frames * 2];
            assert_eq!(renderer.render(&mut bytes, frames), frames);
            bytes
                .chunks_exact(2)
                .map(|b| i16::from_ne_bytes([b[0], b[1]]))
                .collect::<Vec<_>>()
        };

        play(0.25, 8);
        play(0.125, 6);
        play(-0.0625, 4);
        let out = render_i16(&mut renderer, 10);
        let expected: Vec<i16> = [0.3125; 4]
            .into_iter()
            .chain([0.375; 2])
            .chain([0.25; 2])
            .chain([0.0; 2])
            .map(i16::from_f32)
            .collect();
        assert_eq!(out, expected);

        for value in [0.5, 0.75, 0.5] {
            play(value, 4);
        }
        let out = render_i16(&mut renderer, 4);
        assert!(out.iter().all(|&s| s == i16::MAX));

        for _ in 0..3 {
            play(-0.75, 4);
        }
        let out = render_i16(&mut renderer, 4);
        assert!(out.iter().all(|&s| s == i16::MIN));
    }

    #[test]
    fn test_looping_source_reports_nothing_processed() {
        let (world, mut renderer) = setup(mono_desc(8));
        let first = world.create_buffer_from_f32(vec![0.1; 4], 48000, 1).unwrap();
        let second = world.create_buffer_from_f32(vec![0.2; 4], 48000, 1).unwrap();
        let source = world
            .create_source(SourceConfig::non_spatial().with_loop_mode(LoopMode::Infinite))
            .unwrap();
        world.queue_buffers(source, &[first, second]).unwrap();
        world.play(source).unwrap();

        render_f32(&mut renderer, 6);
        assert_eq!(world.buffers_processed(source).unwrap(), 0);
        assert!(world.unqueue_processed(source).unwrap().is_empty());
        assert_eq!(world.source_state(source).unwrap(), PlayState::Playing);
    }
}
