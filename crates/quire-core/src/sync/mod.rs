//! Offline-first synchronization core

mod connectivity;
mod events;
mod processor;
mod reconciler;
mod scheduler;

pub use connectivity::ConnectivityGate;
pub use events::{SyncEvent, SyncEvents};
pub use processor::{DrainReport, SyncQueueProcessor};
pub use reconciler::{IdentityReconciler, Promotion, ReconcileError};
pub use scheduler::{DrainTrigger, SyncHandle, SyncScheduler};
