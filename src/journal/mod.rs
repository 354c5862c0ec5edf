//! Journal Module
//! The downstream write paths that sit behind the access guard

pub mod api;
pub mod store;

pub use api::JournalState;
pub use store::{JournalStore, Post};
