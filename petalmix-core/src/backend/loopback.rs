use super::Backend;
use crate::config::DeviceDesc;
use crate::error::{PetalMixError, Result};
use crate::format::OutputFormat;
use crate::mixer::PcmSample;
use crate::renderer::Renderer;

/// A backend with no device behind it: the application pulls rendered audio
/// itself, for offline rendering, capture to file, or tests.
#[derive(Default)]
pub struct LoopbackBackend {
    open: bool,
    format: Option<OutputFormat>,
    renderer: Option<Renderer>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn format(&self) -> Option<&OutputFormat> {
        self.format.as_ref()
    }

    /// Renders `frames` frames into `out` in the device sample format.
    ///
    /// Returns the frames written, zero until the backend is started.
    pub fn pull(&mut self, out: &mut [u8], frames: usize) -> usize {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.render(out, frames),
            None => 0,
        }
    }

    /// Typed variant of [`pull`](Self::pull) that fills all of `out`.
    ///
    /// Writes nothing unless `T` is the device sample type.
    pub fn pull_into<T: PcmSample>(&mut self, out: &mut [T]) -> usize {
        match self.renderer.as_mut() {
            Some(renderer) if renderer.format().sample_format == T::FORMAT => {
                renderer.render_into(out)
            }
            _ => 0,
        }
    }
}

impl Backend for LoopbackBackend {
    fn name(&self) -> &str {
        "loopback"
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn reset(&mut self, desc: &DeviceDesc) -> Result<DeviceDesc> {
        if !self.open {
            return Err(PetalMixError::Engine("Backend is not open".into()));
        }
        let mut resolved = desc.clone();
        let ordering = desc.channel_ordering.unwrap_or_default();
        resolved.channel_ordering = Some(ordering);
        self.format = Some(resolved.validate(ordering)?);
        Ok(resolved)
    }

    fn start(&mut self, renderer: Renderer) -> Result<()> {
        if self.format.is_none() {
            return Err(PetalMixError::Engine("Backend was not reset".into()));
        }
        if self.renderer.is_some() {
            return Err(PetalMixError::Engine("Loopback already started".into()));
        }
        self.renderer = Some(renderer);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.renderer = None;
        Ok(())
    }

    fn close(&mut self) {
        self.renderer = None;
        self.format = None;
        self.open = false;
    }
}
