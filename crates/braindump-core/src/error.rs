use thiserror::Error;

use crate::NoteRef;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("corrupt record {location}: {reason}")]
    CorruptRecord { location: String, reason: String },

    #[error("multiple notes found with ID prefix \"{query}\" ({count} matches)", count = .candidates.len())]
    AmbiguousId {
        query: String,
        candidates: Vec<NoteRef>,
    },

    #[error("multiple notes found with title \"{query}\" ({count} matches)", count = .candidates.len())]
    AmbiguousTitle {
        query: String,
        candidates: Vec<NoteRef>,
    },

    #[error("index out of sync with notes: {0}")]
    IndexSyncFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Candidate notes carried by an ambiguity error.
    pub fn candidates(&self) -> Option<&[NoteRef]> {
        match self {
            Error::AmbiguousId { candidates, .. } | Error::AmbiguousTitle { candidates, .. } => {
                Some(candidates)
            }
            _ => None,
        }
    }
}
