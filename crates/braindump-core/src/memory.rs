//! In-memory [`Store`] for tests and embedding.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::{slugify, validate_category, Error, Note, ReindexReport, Store, SEARCH_LIMIT};

/// Store that keeps notes in a map. There is no derived index, so it can
/// never diverge; search is a case-insensitive substring match of every
/// whitespace-separated term against title, content and tags.
#[derive(Default)]
pub struct MemoryStore {
    notes: Mutex<BTreeMap<String, Note>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notes(&self) -> Result<MutexGuard<'_, BTreeMap<String, Note>>, Error> {
        self.notes
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))
    }

    /// Notes in the same order a file-backed store lists them.
    fn sorted(notes: impl Iterator<Item = Note>) -> Vec<Note> {
        let mut notes: Vec<Note> = notes.collect();
        notes.sort_by(|a, b| {
            (a.category.as_str(), slugify(&a.title), a.id.as_str())
                .cmp(&(b.category.as_str(), slugify(&b.title), b.id.as_str()))
        });
        notes
    }
}

fn matches_term(note: &Note, term: &str) -> bool {
    let haystack = format!("{} {} {}", note.title, note.content, note.tags.join(" ")).to_lowercase();
    term.split_whitespace()
        .all(|t| haystack.contains(&t.to_lowercase()))
}

impl Store for MemoryStore {
    fn add(&self, note: &Note) -> Result<(), Error> {
        validate_category(&note.category)?;
        let mut notes = self.notes()?;
        if notes.contains_key(&note.id) {
            return Err(Error::Validation(format!("note {} already exists", note.id)));
        }
        notes.insert(note.id.clone(), note.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Note, Error> {
        self.notes()?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn get_by_title(&self, category: &str, title: &str) -> Result<Note, Error> {
        let notes = self.notes()?;
        Self::sorted(notes.values().cloned())
            .into_iter()
            .find(|n| n.category == category && n.title == title)
            .ok_or_else(|| Error::NotFound(format!("{}/{}", category, title)))
    }

    fn list(&self, category: &str) -> Result<Vec<Note>, Error> {
        let notes = self.notes()?;
        Ok(Self::sorted(
            notes
                .values()
                .filter(|n| category.is_empty() || n.category == category)
                .cloned(),
        ))
    }

    fn update(&self, note: &mut Note) -> Result<(), Error> {
        validate_category(&note.category)?;
        let mut notes = self.notes()?;
        if !notes.contains_key(&note.id) {
            return Err(Error::NotFound(note.id.clone()));
        }
        note.updated = Utc::now();
        notes.insert(note.id.clone(), note.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        self.notes()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn search(&self, term: &str, category: &str, tags: &[String]) -> Result<Vec<Note>, Error> {
        let notes = self.notes()?;
        let mut found = Self::sorted(
            notes
                .values()
                .filter(|n| category.is_empty() || n.category == category)
                .filter(|n| matches_term(n, term))
                .filter(|n| tags.is_empty() || n.has_any_tag(tags))
                .cloned(),
        );
        found.truncate(SEARCH_LIMIT);
        Ok(found)
    }

    fn categories(&self) -> Result<Vec<String>, Error> {
        let notes = self.notes()?;
        let set: BTreeSet<String> = notes.values().map(|n| n.category.clone()).collect();
        Ok(set.into_iter().collect())
    }

    fn tags(&self) -> Result<Vec<String>, Error> {
        let notes = self.notes()?;
        let mut by_key: BTreeMap<String, String> = BTreeMap::new();
        for tag in Self::sorted(notes.values().cloned()).iter().flat_map(|n| n.tags.iter()) {
            if let btree_map::Entry::Vacant(e) = by_key.entry(tag.to_lowercase()) {
                e.insert(tag.clone());
            }
        }
        Ok(by_key.into_values().collect())
    }

    fn reindex(&self) -> Result<ReindexReport, Error> {
        Ok(ReindexReport {
            indexed: self.notes()?.len(),
            skipped: 0,
        })
    }

    fn close(self) -> Result<(), Error> {
        Ok(())
    }
}
