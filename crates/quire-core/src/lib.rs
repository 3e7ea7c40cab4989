//! quire-core - Core library for Quire
//!
//! This crate contains the offline-first synchronization core shared by all
//! Quire front-ends: the on-device record cache, the pending-mutation queue,
//! identity reconciliation for records created offline, debounced editing
//! sessions and the connectivity-gated queue processor.

pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ContainerId, GroupId, Note, NotePatch, RecordId};
pub use services::{LocalStore, SyncService};
