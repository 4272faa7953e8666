//! File-based storage implementation for braindump.
//!
//! Notes are markdown files with YAML frontmatter, one directory per
//! category, plus a hidden SQLite search index that points back at them:
//!
//! ```text
//! ~/.braindump/
//!   .index/
//!     search.db              # derived, rebuildable
//!   creds/
//!     stripe-key.md
//!     my-note.md
//!     my-note-1a2b3c4d.md    # second "My Note?" in the same category
//!   infra/
//!     aws.md
//! ```
//!
//! The files are the source of truth. The index can be deleted at any time;
//! it is rebuilt the next time the store is opened.

mod repository;
mod store;

pub use repository::{NoteRepository, NOTE_EXT};
pub use store::{FileStore, INDEX_DIR, INDEX_FILE};
