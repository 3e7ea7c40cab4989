//! Long-lived services shared by every front-end.

mod local_store;
mod sync_service;

pub use local_store::LocalStore;
pub use sync_service::SyncService;
