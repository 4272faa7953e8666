use braindump_core::{
    slugify, validate_category, Error, Location, Note, ReindexReport, Store, SEARCH_LIMIT,
};
use braindump_sqlite::SearchIndex;
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{NoteRepository, NOTE_EXT};

/// Hidden directory under the store root that holds the search index.
pub const INDEX_DIR: &str = ".index";
/// File name of the search index inside [`INDEX_DIR`].
pub const INDEX_FILE: &str = "search.db";

/// Markdown files plus a search index kept in lockstep with them.
///
/// Writes go to the record first and the index second; removals go the other
/// way. A crash in between leaves at worst a record without an index row,
/// which [`Store::reindex`] repairs.
pub struct FileStore {
    repo: NoteRepository,
    index: SearchIndex,
}

impl FileStore {
    /// Open the store at `root`, creating it if needed.
    ///
    /// If the index file does not exist yet it is built from whatever
    /// records are already on disk.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let repo = NoteRepository::open(root.as_ref())?;

        let index_dir = root.as_ref().join(INDEX_DIR);
        fs::create_dir_all(&index_dir)
            .map_err(|e| Error::Storage(format!("Failed to create index dir: {}", e)))?;
        let index_path = index_dir.join(INDEX_FILE);
        let fresh = !index_path.exists();

        let store = Self {
            repo,
            index: SearchIndex::open(&index_path)?,
        };

        if fresh {
            let report = store.reindex()?;
            if report.indexed > 0 || report.skipped > 0 {
                info!(
                    indexed = report.indexed,
                    skipped = report.skipped,
                    "built search index from existing notes"
                );
            }
        }
        Ok(store)
    }

    pub fn repository(&self) -> &NoteRepository {
        &self.repo
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Read every location, skipping records that cannot be read.
    fn hydrate(&self, locations: impl IntoIterator<Item = Location>) -> Vec<Note> {
        locations
            .into_iter()
            .filter_map(|location| match self.repo.read(&location) {
                Ok(note) => Some(note),
                Err(e) => {
                    warn!(%location, error = %e, "skipping unreadable note");
                    None
                }
            })
            .collect()
    }

    /// Write the record, then index it. If indexing fails the record is
    /// removed again so no orphan is left behind.
    fn write_and_index(&self, note: &Note) -> Result<Location, Error> {
        let location = self.repo.write(note)?;
        debug!(id = %note.id, %location, "wrote note");

        if let Err(e) = self.index.upsert(note, &location) {
            return Err(match self.repo.delete(&location) {
                Ok(()) => Error::IndexSyncFailed(format!(
                    "could not index note {}, record rolled back: {}",
                    note.id, e
                )),
                Err(cleanup) => Error::IndexSyncFailed(format!(
                    "could not index note {} and record {} is orphaned ({}); run reindex: {}",
                    note.id, location, cleanup, e
                )),
            });
        }
        Ok(location)
    }

    /// Undo a failed update or delete of note `id`: remove `stray` (a record
    /// written for the new state) and put the index row for the record at
    /// `old` back. Returns `cause` if that worked, otherwise
    /// [`Error::IndexSyncFailed`].
    fn restore(&self, id: &str, old: &Location, stray: Option<&Location>, cause: Error) -> Error {
        if let Some(stray) = stray {
            if let Err(e) = self.repo.delete(stray) {
                return Error::IndexSyncFailed(format!(
                    "note {} left a stray record at {} ({}); run reindex: {}",
                    id, stray, e, cause
                ));
            }
        }
        let restored = self
            .repo
            .read(old)
            .and_then(|previous| self.index.upsert(&previous, old));
        match restored {
            Ok(()) => {
                debug!(%id, location = %old, "restored index row");
                cause
            }
            Err(e) => Error::IndexSyncFailed(format!(
                "note {} could not be restored at {} ({}); run reindex: {}",
                id, old, e, cause
            )),
        }
    }
}

impl Store for FileStore {
    fn add(&self, note: &Note) -> Result<(), Error> {
        validate_category(&note.category)?;
        match self.index.location_of(&note.id) {
            Ok(_) => {
                return Err(Error::Validation(format!(
                    "note {} already exists",
                    note.id
                )))
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.write_and_index(note)?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Note, Error> {
        let location = self.index.location_of(id)?;
        self.repo.read(&location).map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(id.to_string()),
            e => e,
        })
    }

    fn get_by_title(&self, category: &str, title: &str) -> Result<Note, Error> {
        if validate_category(category).is_ok() {
            let direct = Location::new(category, &format!("{}.{}", slugify(title), NOTE_EXT));
            if let Ok(note) = self.repo.read(&direct) {
                if note.title == title && note.category == category {
                    return Ok(note);
                }
            }
        }

        let location = self.index.location_by_title(category, title)?;
        self.repo.read(&location)
    }

    fn list(&self, category: &str) -> Result<Vec<Note>, Error> {
        let locations = self.index.list_by_category(category)?;
        Ok(self.hydrate(locations))
    }

    fn update(&self, note: &mut Note) -> Result<(), Error> {
        validate_category(&note.category)?;
        let old = self.index.location_of(&note.id)?;
        note.updated = Utc::now();

        self.index.remove(&note.id)?;
        debug!(id = %note.id, location = %old, "deindexed note for update");

        // New record before the old one goes, so a failed write loses nothing.
        let location = match self.repo.write(note) {
            Ok(location) => location,
            Err(e) => return Err(self.restore(&note.id, &old, None, e)),
        };

        if location != old {
            if let Err(e) = self.repo.delete(&old) {
                warn!(location = %old, error = %e, "failed to remove previous record");
                return Err(self.restore(&note.id, &old, Some(&location), e));
            }
            debug!(id = %note.id, from = %old, to = %location, "relocated note");
        }

        self.index.upsert(note, &location).map_err(|e| {
            Error::IndexSyncFailed(format!(
                "note {} written to {} but not indexed; run reindex: {}",
                note.id, location, e
            ))
        })
    }

    fn delete(&self, id: &str) -> Result<(), Error> {
        let location = self.index.location_of(id)?;

        self.index.remove(id)?;
        if let Err(e) = self.repo.delete(&location) {
            return Err(self.restore(id, &location, None, e));
        }
        debug!(%id, %location, "deleted note");
        Ok(())
    }

    fn search(&self, term: &str, category: &str, tags: &[String]) -> Result<Vec<Note>, Error> {
        let hits = self.index.search(term, category, tags)?;
        let mut notes = self.hydrate(hits.into_iter().map(|(location, _)| location));
        if !tags.is_empty() {
            notes.retain(|n| n.has_any_tag(tags));
            notes.truncate(SEARCH_LIMIT);
        }
        Ok(notes)
    }

    fn categories(&self) -> Result<Vec<String>, Error> {
        self.index.distinct_categories()
    }

    fn tags(&self) -> Result<Vec<String>, Error> {
        self.index.distinct_tags()
    }

    fn reindex(&self) -> Result<ReindexReport, Error> {
        self.index.clear()?;

        let mut report = ReindexReport::default();
        let mut seen = HashSet::new();
        for location in self.repo.locations()? {
            let note = match self.repo.read(&location) {
                Ok(note) => note,
                Err(e) => {
                    warn!(%location, error = %e, "not indexing unreadable note");
                    report.skipped += 1;
                    continue;
                }
            };
            if !seen.insert(note.id.clone()) {
                warn!(%location, id = %note.id, "not indexing duplicate note ID");
                report.skipped += 1;
                continue;
            }
            self.index.upsert(&note, &location)?;
            report.indexed += 1;
        }

        info!(indexed = report.indexed, skipped = report.skipped, "reindexed notes");
        Ok(report)
    }

    fn close(self) -> Result<(), Error> {
        self.index.close()
    }
}
