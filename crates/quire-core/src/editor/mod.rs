//! Editing sessions and note title rules

mod session;
mod title;

pub use session::{EditSession, EditorSettings, SessionContext, SyncedCallback};
pub use title::{derive_title, is_placeholder, unique_title, DEFAULT_TITLE, PLACEHOLDER_TITLES};
