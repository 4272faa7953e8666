//! Mapping a loose user identifier to exactly one note.

use crate::{Error, Note, Store};

/// Resolve `query` as an exact ID, an ID prefix, or an exact title.
///
/// Order of precedence:
/// 1. exact ID;
/// 2. a unique ID prefix (several prefix matches is [`Error::AmbiguousId`],
///    even if a title also matches);
/// 3. a unique exact title (several is [`Error::AmbiguousTitle`]).
///
/// Nothing matching is [`Error::NotFound`]. Candidates are reported in
/// listing order, so repeated calls over the same notes agree.
pub fn resolve<S: Store + ?Sized>(store: &S, query: &str) -> Result<Note, Error> {
    if query.trim().is_empty() {
        return Err(Error::Validation("note identifier cannot be empty".into()));
    }

    match store.get(query) {
        Ok(note) => return Ok(note),
        Err(Error::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let (mut id_matches, mut title_matches) = (Vec::new(), Vec::new());
    for note in store.list("")? {
        if note.id.starts_with(query) {
            id_matches.push(note.clone());
        }
        if note.title == query {
            title_matches.push(note);
        }
    }

    match id_matches.len() {
        1 => return Ok(id_matches.remove(0)),
        0 => {}
        _ => {
            return Err(Error::AmbiguousId {
                query: query.to_string(),
                candidates: id_matches.iter().map(Note::to_ref).collect(),
            })
        }
    }

    match title_matches.len() {
        0 => Err(Error::NotFound(query.to_string())),
        1 => Ok(title_matches.remove(0)),
        _ => Err(Error::AmbiguousTitle {
            query: query.to_string(),
            candidates: title_matches.iter().map(Note::to_ref).collect(),
        }),
    }
}
