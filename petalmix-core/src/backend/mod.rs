//! Output backends.
//!
//! A backend owns the connection to whatever consumes mixed audio. The device
//! drives it through a fixed lifecycle:
//!
//! ```text
//! open ──► reset(desc) ──► start(renderer) ──► stop ──► close
//! ```
//!
//! `reset` settles the stream format before any audio is rendered. From
//! `start` on the backend owns the [`Renderer`] and calls it from its own
//! thread, or on demand for [`LoopbackBackend`].

mod cpal_backend;
mod loopback;

pub use cpal_backend::CpalBackend;
pub use loopback::LoopbackBackend;

use crate::config::DeviceDesc;
use crate::error::Result;
use crate::renderer::Renderer;

pub trait Backend {
    /// Short human readable name, used in logs.
    fn name(&self) -> &str;

    /// Acquires the underlying device.
    fn open(&mut self) -> Result<()>;

    /// Checks `desc` against the device and returns it with every choice the
    /// backend makes filled in, notably the channel ordering.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` or `AudioDevice` if the device cannot play the
    /// requested format.
    fn reset(&mut self, desc: &DeviceDesc) -> Result<DeviceDesc>;

    /// Hands over the renderer and begins pulling audio.
    fn start(&mut self, renderer: Renderer) -> Result<()>;

    /// Stops pulling audio. The renderer is dropped.
    fn stop(&mut self) -> Result<()>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}
