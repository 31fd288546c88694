//! Holds a thread safe status implementation shared by the sync components.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Holds a thread safe representation of a StatusType.
#[derive(Debug, Clone)]
pub struct AtomicStatus(Arc<AtomicUsize>);

impl AtomicStatus {
    /// Creates a new AtomicStatus
    pub fn new(status: u16) -> Self {
        Self(Arc::new(AtomicUsize::new(status as usize)))
    }

    /// Loads the value held in the AtomicStatus
    pub fn load(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the value held in the AtomicStatus
    pub fn store(&self, status: usize) {
        self.0.store(status, Ordering::SeqCst);
    }
}

/// Status of the indexer's components.
///
/// Statuses at or above `Closing` are shutdown signals; workers observing
/// them finish the batch in flight and exit.
#[derive(Debug, PartialEq, Clone)]
pub enum StatusType {
    /// Running initial startup routine.
    Spawning = 0,
    /// Component is driving a sync batch.
    Syncing = 1,
    /// Component is idle and ready.
    Ready = 2,
    /// Component is busy working.
    Busy = 3,
    /// Running shutdown routine.
    Closing = 4,
    /// Offline.
    Offline = 5,
    /// Non critical errors, the component keeps running.
    RecoverableError = 6,
    /// Critical errors, the component has stopped.
    CriticalError = 7,
}

impl From<usize> for StatusType {
    fn from(value: usize) -> Self {
        match value {
            0 => StatusType::Spawning,
            1 => StatusType::Syncing,
            2 => StatusType::Ready,
            3 => StatusType::Busy,
            4 => StatusType::Closing,
            5 => StatusType::Offline,
            6 => StatusType::RecoverableError,
            _ => StatusType::CriticalError,
        }
    }
}

impl From<StatusType> for usize {
    fn from(status: StatusType) -> Self {
        status as usize
    }
}

impl From<StatusType> for u16 {
    fn from(status: StatusType) -> Self {
        status as u16
    }
}
