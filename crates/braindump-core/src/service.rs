use tracing::debug;

use crate::{
    rank, resolve, validate_category, CategoryCount, Error, Note, NoteUpdate, ReindexReport,
    Store,
};

/// The main service that contains all business logic.
/// Generic over the store implementation.
pub struct BraindumpService<S: Store> {
    store: S,
}

impl<S: Store> BraindumpService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add a new note and return it with its assigned ID.
    pub fn add_note(
        &self,
        category: &str,
        title: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<Note, Error> {
        let category = normalize_category(category)?;
        let title = normalize_title(title)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("content cannot be empty".into()));
        }

        let note = Note::new(&category, &title, content, normalize_tags(tags));
        self.store.add(&note)?;
        debug!(id = %note.id, category = %note.category, "added note");
        Ok(note)
    }

    /// Get a note by exact ID.
    pub fn get_note(&self, id: &str) -> Result<Note, Error> {
        self.store.get(id)
    }

    /// Get a note by exact category and title.
    pub fn get_by_title(&self, category: &str, title: &str) -> Result<Note, Error> {
        self.store.get_by_title(category.trim(), title.trim())
    }

    /// Resolve a loose identifier (ID, ID prefix or title) to one note.
    pub fn find_note(&self, query: &str) -> Result<Note, Error> {
        resolve(&self.store, query.trim())
    }

    /// List notes, optionally in one category.
    pub fn list_notes(&self, category: Option<&str>) -> Result<Vec<Note>, Error> {
        self.store.list(category.map(str::trim).unwrap_or(""))
    }

    /// List a category, keeping notes whose title contains `pattern`
    /// (case-insensitive). An empty pattern keeps everything.
    pub fn notes_in(&self, category: &str, pattern: &str) -> Result<Vec<Note>, Error> {
        let category = normalize_category(category)?;
        let pattern = pattern.trim().to_lowercase();
        let mut notes = self.store.list(&category)?;
        if !pattern.is_empty() {
            notes.retain(|n| n.title.to_lowercase().contains(&pattern));
        }
        Ok(notes)
    }

    /// Update the note `query` resolves to.
    pub fn update_note(&self, query: &str, update: NoteUpdate) -> Result<Note, Error> {
        if update.is_empty() {
            return Err(Error::Validation(
                "at least one of title, content, tags, or category must be provided".into(),
            ));
        }

        let update = NoteUpdate {
            title: update.title.as_deref().map(normalize_title).transpose()?,
            category: update.category.as_deref().map(normalize_category).transpose()?,
            content: update.content.map(|c| c.trim().to_string()),
            tags: update.tags.map(normalize_tags),
        };
        if update.content.as_deref() == Some("") {
            return Err(Error::Validation("content cannot be empty".into()));
        }

        let mut note = self.find_note(query)?;
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.content = content;
        }
        if let Some(tags) = update.tags {
            note.tags = tags;
        }
        if let Some(category) = update.category {
            note.category = category;
        }

        self.store.update(&mut note)?;
        debug!(id = %note.id, "updated note");
        Ok(note)
    }

    /// Append a line to the content of the note `query` resolves to.
    pub fn append_note(&self, query: &str, addition: &str) -> Result<Note, Error> {
        let addition = addition.trim();
        if addition.is_empty() {
            return Err(Error::Validation("nothing to append".into()));
        }

        let mut note = self.find_note(query)?;
        note.content = format!("{}\n{}", note.content, addition);
        self.store.update(&mut note)?;
        Ok(note)
    }

    /// Delete the note `query` resolves to and return it.
    pub fn delete_note(&self, query: &str) -> Result<Note, Error> {
        let note = self.find_note(query)?;
        self.store.delete(&note.id)?;
        debug!(id = %note.id, "deleted note");
        Ok(note)
    }

    /// Search notes, most relevant first.
    pub fn search(
        &self,
        term: &str,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<Note>, Error> {
        let term = term.trim();
        let tags = normalize_tags(tags.to_vec());
        let notes = self
            .store
            .search(term, category.map(str::trim).unwrap_or(""), &tags)?;
        debug!(term, hits = notes.len(), "search");
        Ok(rank(notes, term))
    }

    /// List all categories with note counts.
    pub fn categories(&self) -> Result<Vec<CategoryCount>, Error> {
        let names = self.store.categories()?;
        let notes = self.store.list("")?;
        Ok(names
            .into_iter()
            .map(|name| CategoryCount {
                count: notes.iter().filter(|n| n.category == name).count(),
                name,
            })
            .collect())
    }

    /// List all distinct tags.
    pub fn tags(&self) -> Result<Vec<String>, Error> {
        self.store.tags()
    }

    /// Rebuild the search index from durable records.
    pub fn reindex(&self) -> Result<ReindexReport, Error> {
        self.store.reindex()
    }

    /// Close the underlying store.
    pub fn close(self) -> Result<(), Error> {
        self.store.close()
    }
}

fn normalize_title(title: &str) -> Result<String, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title cannot be empty".into()));
    }
    Ok(title.to_string())
}

fn normalize_category(category: &str) -> Result<String, Error> {
    let category = category.trim();
    validate_category(category)?;
    Ok(category.to_string())
}

/// Trim, drop empty, join inner whitespace with `-`, deduplicate ignoring case.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.split_whitespace().collect::<Vec<_>>().join("-");
        if tag.is_empty() {
            continue;
        }
        if !out.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
            out.push(tag);
        }
    }
    out
}
