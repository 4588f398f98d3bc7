//! Notifications pushed from the renderer to the application.
//!
//! Events travel through a fixed-size lock-free ring and are drained with
//! [`PetalMixWorld::poll_events`](crate::PetalMixWorld::poll_events). When the
//! ring is full new events are dropped and counted in
//! [`RenderStats::dropped_events`](crate::renderer::RenderStats::dropped_events).

use crate::world::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetalMixEvent {
    /// A source entered the playing state.
    SourceStarted { source_id: SourceId },
    SourcePaused { source_id: SourceId },
    /// Stopped by the application.
    SourceStopped { source_id: SourceId },
    /// A non-looping source played its last queued frame.
    SourceCompleted { source_id: SourceId },
    /// A looping source wrapped back to its first buffer.
    SourceLooped {
        source_id: SourceId,
        loop_count: u32,
    },
    /// One or more queued buffers were fully consumed.
    BuffersProcessed {
        source_id: SourceId,
        processed: usize,
    },
}

impl PetalMixEvent {
    pub fn source_id(&self) -> SourceId {
        match self {
            Self::SourceStarted { source_id }
            | Self::SourcePaused { source_id }
            | Self::SourceStopped { source_id }
            | Self::SourceCompleted { source_id }
            | Self::SourceLooped { source_id, .. }
            | Self::BuffersProcessed { source_id, .. } => *source_id,
        }
    }

    /// True for events that end playback.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SourceStopped { .. } | Self::SourceCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_and_terminal() {
        let id = SourceId(7);
        let completed = PetalMixEvent::SourceCompleted { source_id: id };
        let looped = PetalMixEvent::SourceLooped {
            source_id: id,
            loop_count: 2,
        };
        assert_eq!(completed.source_id(), id);
        assert_eq!(looped.source_id(), id);
        assert!(completed.is_terminal());
        assert!(!looped.is_terminal());
    }
}
