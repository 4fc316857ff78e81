use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of an orchestrator. Only `Ready` admits inference calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    ShuttingDown = 3,
    Terminated = 4,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceState::Uninitialized,
            1 => ServiceState::Initializing,
            2 => ServiceState::Ready,
            3 => ServiceState::ShuttingDown,
            _ => ServiceState::Terminated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
            ServiceState::ShuttingDown => "shutting_down",
            ServiceState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder for the current [`ServiceState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ServiceState::Uninitialized as u8))
    }

    pub(crate) fn load(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ServiceState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from → to` atomically. On failure returns the state actually found.
    pub(crate) fn transition(&self, from: ServiceState, to: ServiceState) -> Result<(), ServiceState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ServiceState::from_u8)
    }
}
