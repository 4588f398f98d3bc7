use crate::audio_data::PetalMixAudioData;
use crate::config::{DeviceDesc, SourceConfig};
use crate::error::{PetalMixError, Result};
use crate::events::PetalMixEvent;
use crate::filter::LowPassFilter;
use crate::format::{OutputFormat, SampleFormat};
use crate::math::Pose;
use crate::playback::{
    PlayState, PlaybackCommand, PlaybackInstance, QueueEdit, Retired, SourceStatus,
};
use crate::renderer::RenderStats;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to a source created by [`PetalMixWorld::create_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Handle to a buffer stored in a [`PetalMixWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// The single listener of a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetalMixAudioListener {
    pub(crate) pose: Pose,
    pub(crate) gain: f32,
}

impl Default for PetalMixAudioListener {
    fn default() -> Self {
        Self {
            pose: Pose::identity(),
            gain: 1.0,
        }
    }
}

impl PetalMixAudioListener {
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Master gain applied to every source.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

/// Application-side record of a source.
struct SourceRecord {
    config: SourceConfig,
    filter: LowPassFilter,
    queue: Vec<BufferId>,
    queue_epoch: u64,
    status: Arc<SourceStatus>,
}

/// Everything the renderer takes from the world when it is created.
pub(crate) struct RenderSide {
    pub commands: Receiver<PlaybackCommand>,
    pub events: HeapProd<PetalMixEvent>,
    pub retired: HeapProd<Retired>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Main world object that owns buffers, sources and the listener.
///
/// `PetalMixWorld` is the application-facing half of the mixer. Every method
/// takes `&self` and may be called from any thread; changes reach the render
/// thread as [`PlaybackCommand`]s over a bounded channel and take effect at
/// the start of the next render call.
///
/// # Architecture
///
/// - **Application threads**: create buffers and sources, change parameters,
///   poll events
/// - **Render thread**: owns a [`Renderer`](crate::Renderer), drains
///   commands, mixes, and publishes per-source status through atomics
pub struct PetalMixWorld {
    desc: DeviceDesc,
    format: OutputFormat,
    buffers: Mutex<HashMap<BufferId, Arc<PetalMixAudioData>>>,
    sources: Mutex<HashMap<SourceId, SourceRecord>>,
    listener: Mutex<PetalMixAudioListener>,
    next_id: AtomicU64,
    command_sender: Sender<PlaybackCommand>,
    render_side: Mutex<Option<RenderSide>>,
    events: Mutex<HeapCons<PetalMixEvent>>,
    retired: Mutex<HeapCons<Retired>>,
    stats: Arc<RenderStats>,
}

impl PetalMixWorld {
    /// Creates a world for the stream described by `desc`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the descriptor does not validate.
    pub fn new(desc: DeviceDesc) -> Result<Self> {
        let format = desc.validate(desc.channel_ordering.unwrap_or_default())?;

        let (command_sender, command_receiver) = bounded(desc.command_capacity);
        let (event_producer, event_consumer) =
            HeapRb::<PetalMixEvent>::new(desc.event_capacity).split();
        // Room for every voice and one replaced queue per pending command.
        let (retired_producer, retired_consumer) =
            HeapRb::<Retired>::new(desc.max_sources + desc.command_capacity).split();

        log::info!(
            "PetalMix world: {} Hz, {} channels ({:?}, {:?} order), {:?}, block {} frames",
            format.sample_rate,
            format.channels(),
            format.layout(),
            format.channel_map.ordering(),
            format.sample_format,
            desc.block_size
        );

        Ok(Self {
            desc,
            format,
            buffers: Mutex::new(HashMap::new()),
            sources: Mutex::new(HashMap::new()),
            listener: Mutex::new(PetalMixAudioListener::default()),
            next_id: AtomicU64::new(1),
            command_sender,
            render_side: Mutex::new(Some(RenderSide {
                commands: command_receiver,
                events: event_producer,
                retired: retired_producer,
            })),
            events: Mutex::new(event_consumer),
            retired: Mutex::new(retired_consumer),
            stats: Arc::new(RenderStats::default()),
        })
    }

    pub fn desc(&self) -> &DeviceDesc {
        &self.desc
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// Returns the sample rate of the output stream.
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Counters published by the renderer.
    pub fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    pub(crate) fn take_render_side(&self) -> Result<RenderSide> {
        lock(&self.render_side).take().ok_or_else(|| {
            PetalMixError::Configuration("A renderer already exists for this world".to_string())
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.command_sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => PetalMixError::CommandQueueFull(self.desc.command_capacity),
            TrySendError::Disconnected(_) => {
                PetalMixError::Engine("Renderer is no longer receiving commands".to_string())
            }
        })
    }

    // ---- buffers -------------------------------------------------------

    /// Uploads interleaved native-endian PCM.
    pub fn create_buffer_from_pcm(
        &self,
        bytes: &[u8],
        format: SampleFormat,
        sample_rate: u32,
        channels: u16,
    ) -> Result<BufferId> {
        let data = PetalMixAudioData::from_pcm_bytes(bytes, format, sample_rate, channels)?;
        self.insert_buffer(data)
    }

    /// Uploads interleaved `f32` samples.
    pub fn create_buffer_from_f32(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<BufferId> {
        let data = PetalMixAudioData::from_f32(samples, sample_rate, channels)?;
        self.insert_buffer(data)
    }

    /// Stores already decoded audio, for example from
    /// [`PetalMixAudioData::from_path`].
    ///
    /// No resampling happens here; sources convert on the fly.
    pub fn add_buffer(&self, audio_data: Arc<PetalMixAudioData>) -> Result<BufferId> {
        // A fresh handle, so the caller's copy does not count as a user.
        self.insert_buffer(PetalMixAudioData::clone(&audio_data))
    }

    fn insert_buffer(&self, data: PetalMixAudioData) -> Result<BufferId> {
        let id = BufferId(self.next_id());
        log::debug!(
            "Created {}: {} frames, {} ch, {} Hz",
            id,
            data.total_frames(),
            data.channels(),
            data.sample_rate()
        );
        lock(&self.buffers).insert(id, Arc::new(data));
        Ok(id)
    }

    /// Returns a handle to the buffer's audio, if it exists.
    pub fn buffer(&self, id: BufferId) -> Option<PetalMixAudioData> {
        lock(&self.buffers)
            .get(&id)
            .map(|data| PetalMixAudioData::clone(data))
    }

    pub fn buffer_ids(&self) -> Vec<BufferId> {
        lock(&self.buffers).keys().copied().collect()
    }

    /// Deletes a buffer that no source uses.
    ///
    /// # Errors
    ///
    /// `BufferInUse` if a source queues it or the renderer has not released
    /// it yet; `NotFound` if the id is unknown. The buffer is left untouched
    /// on error.
    pub fn delete_buffer(&self, id: BufferId) -> Result<()> {
        self.collect_garbage();

        let sources = lock(&self.sources);
        if sources.values().any(|record| record.queue.contains(&id)) {
            return Err(PetalMixError::BufferInUse(id.0));
        }

        let mut buffers = lock(&self.buffers);
        let data = buffers
            .get(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;
        if Arc::strong_count(data) > 1 {
            return Err(PetalMixError::BufferInUse(id.0));
        }
        buffers.remove(&id);
        log::debug!("Deleted {}", id);
        Ok(())
    }

    // ---- sources -------------------------------------------------------

    /// Creates a source with an empty queue.
    ///
    /// # Errors
    ///
    /// `Engine` when `max_sources` sources already exist,
    /// `CommandQueueFull` when the renderer is behind.
    pub fn create_source(&self, config: SourceConfig) -> Result<SourceId> {
        let mut sources = lock(&self.sources);
        if sources.len() >= self.desc.max_sources {
            return Err(PetalMixError::Engine(format!(
                "Source limit of {} reached",
                self.desc.max_sources
            )));
        }

        let id = SourceId(self.next_id());
        let config = config.sanitized();
        let status = Arc::new(SourceStatus::default());
        let instance = PlaybackInstance::new(id, config, status.clone());
        self.send(PlaybackCommand::AddSource(Box::new(instance)))?;

        sources.insert(
            id,
            SourceRecord {
                config,
                filter: LowPassFilter::default(),
                queue: Vec::new(),
                queue_epoch: 0,
                status,
            },
        );
        log::debug!("Created {}", id);
        Ok(id)
    }

    pub fn delete_source(&self, id: SourceId) -> Result<()> {
        let mut sources = lock(&self.sources);
        if !sources.contains_key(&id) {
            return Err(PetalMixError::NotFound(id.to_string()));
        }
        self.send(PlaybackCommand::RemoveSource(id))?;
        sources.remove(&id);
        log::debug!("Deleted {}", id);
        Ok(())
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        lock(&self.sources).keys().copied().collect()
    }

    /// Replaces all parameters of a source.
    pub fn set_source_params(&self, id: SourceId, config: SourceConfig) -> Result<()> {
        let mut sources = lock(&self.sources);
        let record = sources
            .get_mut(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;
        let config = config.sanitized();
        self.send(PlaybackCommand::UpdateConfig(id, config))?;
        record.config = config;
        Ok(())
    }

    /// Edits the current parameters in place.
    ///
    /// ```no_run
    /// # use petalmix_core::{PetalMixWorld, DeviceDesc, SourceConfig, math::Vec3};
    /// # let world = PetalMixWorld::new(DeviceDesc::default()).unwrap();
    /// # let id = world.create_source(SourceConfig::default()).unwrap();
    /// world.update_source_params(id, |c| c.position = Vec3::new(1.0, 0.0, -2.0))?;
    /// # Ok::<(), petalmix_core::PetalMixError>(())
    /// ```
    pub fn update_source_params<F>(&self, id: SourceId, update: F) -> Result<()>
    where
        F: FnOnce(&mut SourceConfig),
    {
        let mut config = self.source_params(id)?;
        update(&mut config);
        self.set_source_params(id, config)
    }

    pub fn source_params(&self, id: SourceId) -> Result<SourceConfig> {
        lock(&self.sources)
            .get(&id)
            .map(|record| record.config)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))
    }

    /// Attaches a low-pass filter to the source's dry path.
    pub fn set_direct_filter(&self, id: SourceId, filter: LowPassFilter) -> Result<()> {
        let mut sources = lock(&self.sources);
        let record = sources
            .get_mut(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;
        let filter = LowPassFilter::new(filter.gain, filter.gain_hf).poles(filter.poles);
        self.send(PlaybackCommand::SetFilter(id, filter))?;
        record.filter = filter;
        Ok(())
    }

    // ---- queues --------------------------------------------------------

    /// Makes `buffer` the whole queue of a stopped source, or clears it.
    pub fn set_buffer(&self, id: SourceId, buffer: Option<BufferId>) -> Result<()> {
        let mut sources = lock(&self.sources);
        let record = sources
            .get_mut(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;
        if matches!(record.status.state(), PlayState::Playing | PlayState::Paused) {
            return Err(PetalMixError::Engine(format!(
                "Cannot replace the queue of active {}",
                id
            )));
        }

        let queue: Vec<BufferId> = buffer.into_iter().collect();
        let resolved = self.resolve_queue(&queue)?;
        self.send_queue(id, record, queue, resolved, QueueEdit::Replace)
    }

    /// Appends buffers to the end of the source's queue.
    ///
    /// # Errors
    ///
    /// `AudioFormat` if the buffers differ in channel count or sample rate
    /// from each other or from what is already queued.
    pub fn queue_buffers(&self, id: SourceId, buffers: &[BufferId]) -> Result<()> {
        let mut sources = lock(&self.sources);
        let record = sources
            .get_mut(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;

        let mut queue = record.queue.clone();
        queue.extend_from_slice(buffers);
        let resolved = self.resolve_queue(&queue)?;
        self.send_queue(id, record, queue, resolved, QueueEdit::Append)
    }

    /// Removes the buffers the source has finished with and returns them.
    pub fn unqueue_processed(&self, id: SourceId) -> Result<Vec<BufferId>> {
        let mut sources = lock(&self.sources);
        let record = sources
            .get_mut(&id)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))?;

        let processed = Self::processed_for(record).min(record.queue.len());
        if processed == 0 {
            return Ok(Vec::new());
        }
        let remaining = record.queue[processed..].to_vec();
        let removed = record.queue[..processed].to_vec();
        let resolved = self.resolve_queue(&remaining)?;
        self.send_queue(id, record, remaining, resolved, QueueEdit::Unqueue(processed))?;
        Ok(removed)
    }

    fn resolve_queue(&self, queue: &[BufferId]) -> Result<Vec<Arc<PetalMixAudioData>>> {
        let buffers = lock(&self.buffers);
        let resolved = queue
            .iter()
            .map(|id| {
                buffers
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PetalMixError::NotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(first) = resolved.first() {
            if let Some(odd) = resolved.iter().find(|data| !first.same_layout(data)) {
                return Err(PetalMixError::AudioFormat(format!(
                    "Queued buffers must share a layout: {} ch @ {} Hz vs {} ch @ {} Hz",
                    first.channels(),
                    first.sample_rate(),
                    odd.channels(),
                    odd.sample_rate()
                )));
            }
        }
        Ok(resolved)
    }

    fn send_queue(
        &self,
        id: SourceId,
        record: &mut SourceRecord,
        queue: Vec<BufferId>,
        resolved: Vec<Arc<PetalMixAudioData>>,
        edit: QueueEdit,
    ) -> Result<()> {
        let queue_epoch = record.queue_epoch + 1;
        self.send(PlaybackCommand::SetQueue {
            source_id: id,
            queue: resolved.into_boxed_slice(),
            edit,
            queue_epoch,
        })?;
        record.queue = queue;
        record.queue_epoch = queue_epoch;
        Ok(())
    }

    /// Processed count, or zero while the renderer has not seen the latest
    /// queue yet. A looping queue is never done with its buffers.
    fn processed_for(record: &SourceRecord) -> usize {
        if record.config.is_looping() {
            0
        } else if record.status.queue_epoch() == record.queue_epoch {
            record.status.buffers_processed()
        } else {
            0
        }
    }

    // ---- playback ------------------------------------------------------

    fn status(&self, id: SourceId) -> Result<Arc<SourceStatus>> {
        lock(&self.sources)
            .get(&id)
            .map(|record| record.status.clone())
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))
    }

    /// Starts a source from the beginning of its queue, or resumes it if
    /// paused.
    pub fn play(&self, id: SourceId) -> Result<()> {
        let status = self.status(id)?;
        self.send(PlaybackCommand::Play(id))?;
        status.set_state(PlayState::Playing);
        Ok(())
    }

    pub fn pause(&self, id: SourceId) -> Result<()> {
        let status = self.status(id)?;
        self.send(PlaybackCommand::Pause(id))?;
        // The renderer may have stopped the source in the meantime.
        status.transition(PlayState::Playing, PlayState::Paused);
        Ok(())
    }

    /// Stops a source; every queued buffer counts as processed.
    pub fn stop(&self, id: SourceId) -> Result<()> {
        let status = self.status(id)?;
        self.send(PlaybackCommand::Stop(id))?;
        status.set_state(PlayState::Stopped);
        Ok(())
    }

    /// Returns a source to its initial state at the start of its queue.
    pub fn rewind(&self, id: SourceId) -> Result<()> {
        let status = self.status(id)?;
        self.send(PlaybackCommand::Rewind(id))?;
        status.set_state(PlayState::Initial);
        Ok(())
    }

    pub fn stop_all(&self) -> Result<()> {
        self.send(PlaybackCommand::StopAll)?;
        for record in lock(&self.sources).values() {
            record.status.set_state(PlayState::Stopped);
        }
        Ok(())
    }

    pub fn source_state(&self, id: SourceId) -> Result<PlayState> {
        Ok(self.status(id)?.state())
    }

    pub fn buffers_processed(&self, id: SourceId) -> Result<usize> {
        lock(&self.sources)
            .get(&id)
            .map(Self::processed_for)
            .ok_or_else(|| PetalMixError::NotFound(id.to_string()))
    }

    /// Playback position in frames from the start of the queue.
    pub fn source_offset(&self, id: SourceId) -> Result<u64> {
        Ok(self.status(id)?.offset())
    }

    // ---- listener ------------------------------------------------------

    pub fn set_listener_pose(&self, pose: Pose) -> Result<()> {
        let mut listener = lock(&self.listener);
        let mut updated = *listener;
        updated.pose = pose;
        self.send(PlaybackCommand::SetListener {
            pose: updated.pose,
            gain: updated.gain,
        })?;
        *listener = updated;
        Ok(())
    }

    pub fn set_listener_gain(&self, gain: f32) -> Result<()> {
        let gain = if gain.is_finite() { gain.max(0.0) } else { 1.0 };
        let mut listener = lock(&self.listener);
        let mut updated = *listener;
        updated.gain = gain;
        self.send(PlaybackCommand::SetListener {
            pose: updated.pose,
            gain: updated.gain,
        })?;
        *listener = updated;
        Ok(())
    }

    pub fn listener(&self) -> PetalMixAudioListener {
        *lock(&self.listener)
    }

    // ---- render feedback -----------------------------------------------

    /// Drains pending events, oldest first.
    pub fn poll_events(&self) -> Vec<PetalMixEvent> {
        self.collect_garbage();
        lock(&self.events).pop_iter().collect()
    }

    /// Frees voices and queues the renderer has let go of. Returns how many
    /// objects were released.
    pub fn collect_garbage(&self) -> usize {
        lock(&self.retired).pop_iter().count()
    }
}
