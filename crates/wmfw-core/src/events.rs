//! Event system for UI decoupling.
//!
//! Lets front ends follow a conversion run without the core knowing how
//! progress is shown.

use std::fmt;
use std::path::PathBuf;

use crate::container::ContainerId;

/// Conversion pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertPhase {
    /// Reading and parsing containers.
    Parse,
    /// Looking up the memory map for the part.
    Resolve,
    /// Building and chunking block lists.
    BlockLayout,
    /// Building the control list and metadata.
    Controls,
    /// All stages done.
    Complete,
    /// Run aborted.
    Error,
}

impl fmt::Display for ConvertPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertPhase::Parse => write!(f, "Parse"),
            ConvertPhase::Resolve => write!(f, "Resolve"),
            ConvertPhase::BlockLayout => write!(f, "Block Layout"),
            ConvertPhase::Controls => write!(f, "Controls"),
            ConvertPhase::Complete => write!(f, "Complete"),
            ConvertPhase::Error => write!(f, "Error"),
        }
    }
}

/// Events emitted by a conversion session.
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    PhaseChanged { from: ConvertPhase, to: ConvertPhase },
    /// A container was read from disk and parsed.
    ContainerParsed {
        container: ContainerId,
        path: PathBuf,
        blocks: usize,
    },
    /// A block list is final.
    BlocksResolved {
        container: ContainerId,
        blocks: usize,
        bytes: usize,
    },
    ControlsAssembled { count: usize },
    Error { message: String },
    Complete,
}

/// Observer trait for receiving conversion events.
pub trait ConvertObserver: Send + Sync {
    fn on_event(&self, event: &ConvertEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl ConvertObserver for NullObserver {
    fn on_event(&self, _event: &ConvertEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl ConvertObserver for TracingObserver {
    fn on_event(&self, event: &ConvertEvent) {
        match event {
            ConvertEvent::PhaseChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Phase changed");
            }
            ConvertEvent::ContainerParsed {
                container,
                path,
                blocks,
            } => {
                tracing::info!(container = %container, path = %path.display(), blocks, "Parsed container");
            }
            ConvertEvent::BlocksResolved {
                container,
                blocks,
                bytes,
            } => {
                tracing::info!(container = %container, blocks, bytes, "Block list ready");
            }
            ConvertEvent::ControlsAssembled { count } => {
                tracing::info!(count, "Controls assembled");
            }
            ConvertEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
            ConvertEvent::Complete => {
                tracing::info!("Conversion complete");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub events: Mutex<Vec<ConvertEvent>>,
    }

    impl ConvertObserver for RecordingObserver {
        fn on_event(&self, event: &ConvertEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
        }
    }
}
