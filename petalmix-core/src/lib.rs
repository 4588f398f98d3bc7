//! Real-time positional audio mixing.
//!
//! Applications upload PCM into a [`PetalMixWorld`], create sources that
//! queue those buffers, and move a listener around. A [`Renderer`] running on
//! the audio thread resamples, filters, spatialises and sums every playing
//! source into interleaved device frames. [`PetalMixDevice`] wires a world and
//! its renderer to an output [`Backend`].
//!
//! ```no_run
//! use petalmix_core::{CpalBackend, DeviceDesc, PetalMixDevice, SourceConfig, math::Vec3};
//!
//! let device = PetalMixDevice::open(CpalBackend::new(), DeviceDesc::default())?;
//! let world = device.world();
//! let tone: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.0576).sin() * 0.3).collect();
//! let buffer = world.create_buffer_from_f32(tone, 48000, 1)?;
//! let source = world.create_source(SourceConfig::spatial(Vec3::new(2.0, 0.0, -1.0)))?;
//! world.set_buffer(source, Some(buffer))?;
//! world.play(source)?;
//! # Ok::<(), petalmix_core::PetalMixError>(())
//! ```

pub mod audio_data;
pub mod backend;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod filter;
pub mod format;
pub mod math;
pub mod mixer;
pub mod playback;
pub mod renderer;
pub mod resampler;
pub mod spatial;
pub mod world;

pub use audio_data::PetalMixAudioData;
pub use backend::{Backend, CpalBackend, LoopbackBackend};
pub use channel::{Channel, ChannelMap, ChannelOrdering};
pub use config::{Cone, DeviceDesc, SourceConfig};
pub use device::PetalMixDevice;
pub use error::{PetalMixError, Result};
pub use events::PetalMixEvent;
pub use filter::{FilterPoles, LowPassFilter};
pub use format::{ChannelLayout, OutputFormat, SampleFormat};
pub use playback::{LoopMode, PlayState, PlaybackCommand, PlaybackInstance, QueueEdit};
pub use renderer::{RenderStats, Renderer};
pub use resampler::Interpolation;
pub use spatial::DistanceModel;
pub use world::{BufferId, PetalMixAudioListener, PetalMixWorld, SourceId};
