pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod list;
pub mod new;
pub mod status;
pub mod sync;
