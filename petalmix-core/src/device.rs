use crate::backend::Backend;
use crate::config::DeviceDesc;
use crate::error::Result;
use crate::format::OutputFormat;
use crate::renderer::Renderer;
use crate::world::PetalMixWorld;
use std::sync::Arc;

/// An open output device: a backend, the world it plays and the renderer
/// running inside the backend.
///
/// Dropping the device stops and closes the backend. Use
/// [`close`](Self::close) to see errors from stopping.
pub struct PetalMixDevice<B: Backend> {
    backend: B,
    world: Arc<PetalMixWorld>,
    closed: bool,
}

impl<B: Backend> PetalMixDevice<B> {
    /// Opens `backend`, settles the stream format from `desc` and starts
    /// rendering.
    ///
    /// # Errors
    ///
    /// Any error from the backend, or `Configuration` if the resolved format
    /// is not supported. The backend is closed again on failure.
    pub fn open(mut backend: B, desc: DeviceDesc) -> Result<Self> {
        match Self::start_backend(&mut backend, &desc) {
            Ok(world) => {
                log::info!("Device opened on {} backend", backend.name());
                Ok(Self {
                    backend,
                    world,
                    closed: false,
                })
            }
            Err(e) => {
                log::error!("Failed to open {} backend: {}", backend.name(), e);
                backend.close();
                Err(e)
            }
        }
    }

    fn start_backend(backend: &mut B, desc: &DeviceDesc) -> Result<Arc<PetalMixWorld>> {
        backend.open()?;
        let resolved = backend.reset(desc)?;
        let world = Arc::new(PetalMixWorld::new(resolved)?);
        let renderer = Renderer::new(&world)?;
        backend.start(renderer)?;
        Ok(world)
    }

    pub fn world(&self) -> &Arc<PetalMixWorld> {
        &self.world
    }

    pub fn format(&self) -> &OutputFormat {
        self.world.format()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Stops rendering and releases the backend.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let stopped = self.backend.stop();
        self.backend.close();
        self.world.collect_garbage();
        log::info!("Device on {} backend closed", self.backend.name());
        stopped
    }
}

impl<B: Backend> Drop for PetalMixDevice<B> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.backend.stop() {
                log::warn!("Error stopping {} backend: {}", self.backend.name(), e);
            }
            self.backend.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LoopbackBackend;
    use crate::channel::ChannelOrdering;
    use crate::config::SourceConfig;
    use crate::error::PetalMixError;
    use crate::format::SampleFormat;
    use crate::mixer::PcmSample;
    use crate::playback::PlayState;

    #[test]
    fn test_loopback_lifecycle() {
        let mut device = PetalMixDevice::open(
            LoopbackBackend::new(),
            DeviceDesc::default().channels(1).sample_format(SampleFormat::I16),
        )
        .unwrap();
        assert!(device.backend().is_started());
        assert_eq!(device.format().channels(), 1);

        let world = device.world().clone();
        let buffer = world
            .create_buffer_from_f32(vec![0.5; 32], 48000, 1)
            .unwrap();
        let source = world.create_source(SourceConfig::non_spatial()).unwrap();
        world.set_buffer(source, Some(buffer)).unwrap();
        world.play(source).unwrap();

        let mut out = vec![0i16; 64];
        assert_eq!(device.backend_mut().pull_into(&mut out), 64);
        assert!(out[..32].iter().all(|&s| s == i16::from_f32(0.5)));
        assert!(out[32..].iter().all(|&s| s == 0));
        assert_eq!(world.source_state(source).unwrap(), PlayState::Stopped);

        device.close().unwrap();
        // The renderer is gone, so commands can no longer be delivered.
        assert!(matches!(
            world.play(source),
            Err(PetalMixError::Engine(_))
        ));
    }

    #[test]
    fn test_loopback_resolves_ordering() {
        let device = PetalMixDevice::open(
            LoopbackBackend::new(),
            DeviceDesc::default()
                .channels(6)
                .channel_ordering(ChannelOrdering::Smpte),
        )
        .unwrap();
        assert_eq!(
            device.format().channel_map.ordering(),
            ChannelOrdering::Smpte
        );
        assert_eq!(
            device.backend().format().map(|f| f.channels()),
            Some(6)
        );
    }

    #[test]
    fn test_invalid_desc_fails_before_start() {
        let result =
            PetalMixDevice::open(LoopbackBackend::new(), DeviceDesc::default().channels(3));
        assert!(matches!(result, Err(PetalMixError::Configuration(_))));
    }

    #[test]
    fn test_pull_before_start_is_empty() {
        let mut backend = LoopbackBackend::new();
        let mut out = vec![0u8; 16];
        assert_eq!(backend.pull(&mut out, 4), 0);
    }

    #[test]
    fn test_drop_closes_backend() {
        let device = PetalMixDevice::open(LoopbackBackend::new(), DeviceDesc::default()).unwrap();
        let world = device.world().clone();
        drop(device);
        assert!(world.stop_all().is_err());
    }

    #[test]
    fn test_pull_into_requires_device_sample_type() {
        let mut device = PetalMixDevice::open(
            LoopbackBackend::new(),
            DeviceDesc::default().channels(1).sample_format(SampleFormat::I16),
        )
        .unwrap();
        let mut floats = vec![1.0f32; 8];
        assert_eq!(device.backend_mut().pull_into(&mut floats), 0);
        assert!(floats.iter().all(|&s| s == 1.0));
        assert_eq!(device.world().stats().frames_rendered(), 0);

        let mut samples = vec![1i16; 8];
        assert_eq!(device.backend_mut().pull_into(&mut samples), 8);
        assert!(samples.iter().all(|&s| s == 0));
    }
}
