use crate::{Error, Note, ReindexReport};

/// Upper bound on rows returned by one index search.
pub const SEARCH_LIMIT: usize = 100;

/// Note storage abstraction.
///
/// Implementations own both the durable records and whatever they derive from
/// them (the search index), and must keep the two in lockstep: every durable
/// note has exactly one index row and every index row points at a readable
/// record. Operations are synchronous and assume a single writer.
pub trait Store {
    /// Persist a new note. The note's ID must not exist yet and its category
    /// must pass [`validate_category`](crate::validate_category).
    fn add(&self, note: &Note) -> Result<(), Error>;

    /// Get a note by exact ID.
    ///
    /// [`Error::NotFound`] if there is no such ID or its record is gone. A
    /// record that exists but cannot be parsed is [`Error::CorruptRecord`],
    /// not `NotFound`, so a damaged note is never mistaken for a deleted one.
    fn get(&self, id: &str) -> Result<Note, Error>;

    /// Get a note by exact category and title.
    fn get_by_title(&self, category: &str, title: &str) -> Result<Note, Error>;

    /// List notes in `category`, or all notes if it is empty, ordered by location.
    ///
    /// Records that cannot be read are skipped.
    fn list(&self, category: &str) -> Result<Vec<Note>, Error>;

    /// Replace an existing note, relocating its record if category or title
    /// changed. Refreshes `note.updated`. The category is checked as in
    /// [`add`](Store::add).
    fn update(&self, note: &mut Note) -> Result<(), Error>;

    /// Delete a note by exact ID.
    fn delete(&self, id: &str) -> Result<(), Error>;

    /// Full-text search, optionally restricted to a category and to notes
    /// sharing at least one tag (case-insensitive) with `tags`.
    ///
    /// Results come back in the index's native order, capped at
    /// [`SEARCH_LIMIT`] after the tag filter, so a tag-only search finds
    /// tagged notes however many untagged ones there are. Records that cannot
    /// be read are skipped.
    fn search(&self, term: &str, category: &str, tags: &[String]) -> Result<Vec<Note>, Error>;

    /// Distinct categories, sorted.
    fn categories(&self) -> Result<Vec<String>, Error>;

    /// Distinct tags, sorted and deduplicated ignoring case. The first
    /// spelling seen wins.
    fn tags(&self) -> Result<Vec<String>, Error>;

    /// Rebuild everything derived from the durable records.
    fn reindex(&self) -> Result<ReindexReport, Error>;

    /// Release held resources, reporting any failure to do so.
    ///
    /// Dropping a store also releases them, silently.
    fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}
