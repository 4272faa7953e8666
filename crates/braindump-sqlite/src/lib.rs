//! SQLite FTS5 search index for braindump.
//!
//! The index is derived data: one row per live note, pointing at the note's
//! durable record by [`Location`]. It can always be thrown away and rebuilt
//! from the records, so there are no schema migrations.
//!
//! Matching uses the FTS5 `unicode61` tokenizer over title, content and
//! tags. A search term is split into alphanumeric tokens and every token
//! must match as a prefix, so `"strip ke"` finds "Stripe Key". Arbitrary
//! substrings inside a word are not matched.

use braindump_core::{Error, Location, Note, SEARCH_LIMIT};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
    id UNINDEXED,
    title,
    content,
    tags,
    category UNINDEXED,
    location UNINDEXED,
    tokenize = 'unicode61'
)";

/// FTS5-backed index of notes.
pub struct SearchIndex {
    conn: Mutex<Connection>,
}

impl SearchIndex {
    /// Open the index at the given path, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            Error::Index(format!(
                "Failed to open search index {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::init(conn)
    }

    /// Open an in-memory index.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Index(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Index(format!("Failed to create search index: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::Index("search index lock poisoned".into()))
    }

    /// Insert or replace the row for `note.id`.
    pub fn upsert(&self, note: &Note, location: &Location) -> Result<(), Error> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Index(e.to_string()))?;

        tx.execute("DELETE FROM notes_fts WHERE id = ?1", params![note.id])
            .map_err(|e| Error::Index(e.to_string()))?;
        tx.execute(
            "INSERT INTO notes_fts (id, title, content, tags, category, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id,
                note.title,
                note.content,
                note.tags.join(" "),
                note.category,
                location.as_str()
            ],
        )
        .map_err(|e| Error::Index(e.to_string()))?;

        tx.commit().map_err(|e| Error::Index(e.to_string()))?;
        debug!(id = %note.id, %location, "indexed note");
        Ok(())
    }

    /// Remove the row for `id`. Returns false if there was none.
    pub fn remove(&self, id: &str) -> Result<bool, Error> {
        let conn = self.conn()?;
        let rows = conn
            .execute("DELETE FROM notes_fts WHERE id = ?1", params![id])
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(rows > 0)
    }

    /// Location of the note with this exact ID.
    pub fn location_of(&self, id: &str) -> Result<Location, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT location FROM notes_fts WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| Error::Index(e.to_string()))?
        .map(Location::from)
        .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Location of the first note (by location) with this exact category and title.
    pub fn location_by_title(&self, category: &str, title: &str) -> Result<Location, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT location FROM notes_fts
             WHERE category = ?1 AND title = ?2
             ORDER BY location LIMIT 1",
            params![category, title],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| Error::Index(e.to_string()))?
        .map(Location::from)
        .ok_or_else(|| Error::NotFound(format!("{}/{}", category, title)))
    }

    /// All locations, or those in `category` if it is not empty, ordered by location.
    pub fn list_by_category(&self, category: &str) -> Result<Vec<Location>, Error> {
        let conn = self.conn()?;

        let mut sql = String::from("SELECT location, 0.0 FROM notes_fts");
        let mut params_vec: Vec<String> = Vec::new();
        if !category.is_empty() {
            sql.push_str(" WHERE category = ?1");
            params_vec.push(category.to_string());
        }
        sql.push_str(" ORDER BY location");

        Self::query_locations(&conn, &sql, &params_vec)
            .map(|rows| rows.into_iter().map(|(loc, _)| loc).collect())
    }

    /// Full-text search, returning locations with the engine's rank
    /// (lower is better). A term without any word characters matches every
    /// row, ordered by location, with rank 0.
    ///
    /// Non-empty `tags` restrict hits to rows whose tags column holds one of
    /// them as a phrase. That test is coarser than exact tag equality, so
    /// callers re-check tags on the hydrated notes. With tags the result is
    /// not capped, since the exact filter runs after this; without tags it is
    /// capped at [`SEARCH_LIMIT`].
    pub fn search(
        &self,
        term: &str,
        category: &str,
        tags: &[String],
    ) -> Result<Vec<(Location, f64)>, Error> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut params_vec: Vec<String> = Vec::new();

        let match_expr = match (fts_query(term), fts_tag_filter(tags)) {
            (Some(q), Some(t)) => Some(format!("({}) AND {}", q, t)),
            (Some(q), None) => Some(q),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        };
        if let Some(ref q) = match_expr {
            conditions.push(format!("notes_fts MATCH ?{}", params_vec.len() + 1));
            params_vec.push(q.clone());
        }
        if !category.is_empty() {
            conditions.push(format!("category = ?{}", params_vec.len() + 1));
            params_vec.push(category.to_string());
        }

        let mut sql = if match_expr.is_some() {
            String::from("SELECT location, rank FROM notes_fts")
        } else {
            String::from("SELECT location, 0.0 FROM notes_fts")
        };
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if match_expr.is_some() {
            sql.push_str(" ORDER BY rank");
        } else {
            sql.push_str(" ORDER BY location");
        }
        if tags.is_empty() {
            sql.push_str(&format!(" LIMIT {}", SEARCH_LIMIT));
        }

        Self::query_locations(&conn, &sql, &params_vec)
    }

    /// Distinct categories, sorted.
    pub fn distinct_categories(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT category FROM notes_fts ORDER BY category")
            .map_err(|e| Error::Index(e.to_string()))?;
        let categories = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::Index(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(categories)
    }

    /// Distinct tags across all rows, sorted ignoring case. Tags differing
    /// only in case are listed once, spelled as in the first row by location.
    pub fn distinct_tags(&self) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT tags FROM notes_fts WHERE tags != '' ORDER BY location")
            .map_err(|e| Error::Index(e.to_string()))?;
        let joined = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Index(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Index(e.to_string()))?;

        let mut tags: BTreeMap<String, String> = BTreeMap::new();
        for tag in joined.iter().flat_map(|s| s.split_whitespace()) {
            tags.entry(tag.to_lowercase())
                .or_insert_with(|| tag.to_string());
        }
        Ok(tags.into_values().collect())
    }

    /// Every indexed ID with its location, ordered by location.
    pub fn entries(&self) -> Result<Vec<(String, Location)>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, location FROM notes_fts ORDER BY location")
            .map_err(|e| Error::Index(e.to_string()))?;
        let entries = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, Location::from(row.get::<_, String>(1)?)))
            })
            .map_err(|e| Error::Index(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(entries)
    }

    /// Remove every row.
    pub fn clear(&self) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM notes_fts", [])
            .map_err(|e| Error::Index(e.to_string()))?;
        Ok(())
    }

    /// Close the underlying connection, reporting failures.
    pub fn close(self) -> Result<(), Error> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::Index("search index lock poisoned".into()))?;
        conn.close()
            .map_err(|(_, e)| Error::Index(format!("Failed to close search index: {}", e)))
    }

    fn query_locations(
        conn: &Connection,
        sql: &str,
        params_vec: &[String],
    ) -> Result<Vec<(Location, f64)>, Error> {
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|p| p as &dyn rusqlite::ToSql)
            .collect();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Index(e.to_string()))?;

        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let location: String = row.get(0)?;
                let rank: f64 = row.get(1)?;
                Ok((Location::from(location), rank))
            })
            .map_err(|e| Error::Index(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Index(e.to_string()))?;

        Ok(rows)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Turn free text into an FTS5 query: every alphanumeric token as a quoted
/// prefix term, all required. `None` if there are no tokens.
fn fts_query(term: &str) -> Option<String> {
    let terms: Vec<String> = tokens(term).map(|t| format!("\"{}\"*", t)).collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// FTS5 filter on the tags column matching any of `tags` as a phrase.
///
/// `None` if there are no tags, or if some tag has no word characters and so
/// cannot be expressed; the caller's exact check then does all the work.
fn fts_tag_filter(tags: &[String]) -> Option<String> {
    let mut phrases = Vec::with_capacity(tags.len());
    for tag in tags {
        let words: Vec<&str> = tokens(tag).collect();
        if words.is_empty() {
            return None;
        }
        phrases.push(format!("tags : \"{}\"", words.join(" ")));
    }
    if phrases.is_empty() {
        None
    } else {
        Some(format!("({})", phrases.join(" OR ")))
    }
}
