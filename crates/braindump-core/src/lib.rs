//! Braindump core library - shared types, traits, and search semantics.
//!
//! This crate contains no filesystem or index I/O. Backends implement
//! [`Store`]; everything that is the same regardless of backend (identifier
//! resolution, relevance ranking, input normalization) lives here.

mod error;
mod memory;
mod note;
mod rank;
mod resolve;
mod service;
mod slug;
mod store;

pub use error::Error;
pub use memory::MemoryStore;
pub use note::{
    validate_category, CategoryCount, Location, Note, NoteRef, NoteUpdate, ReindexReport,
};
pub use rank::{match_preview, rank, score};
pub use resolve::resolve;
pub use service::BraindumpService;
pub use slug::{slugify, MAX_SLUG_LEN};
pub use store::{Store, SEARCH_LIMIT};
