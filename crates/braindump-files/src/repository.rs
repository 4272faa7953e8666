use braindump_core::{slugify, validate_category, Error, Location, Note};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of note files.
pub const NOTE_EXT: &str = "md";

const FRONTMATTER_OPEN: &str = "---\n";
const FRONTMATTER_CLOSE: &str = "\n---\n";

/// Header of a note file. The content is the body after the frontmatter.
#[derive(Debug, Serialize, Deserialize)]
struct NoteMeta {
    id: String,
    title: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    category: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

/// Durable note records: one markdown file per note under its category
/// directory. Knows nothing about the search index.
pub struct NoteRepository {
    root: PathBuf,
}

impl NoteRepository {
    /// Open a repository rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("Failed to create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a record.
    pub fn path_of(&self, location: &Location) -> PathBuf {
        self.root
            .join(location.category())
            .join(location.file_name())
    }

    pub fn exists(&self, location: &Location) -> bool {
        self.path_of(location).is_file()
    }

    /// Where `note` should live.
    ///
    /// Normally `<category>/<slug>.md`. If that file belongs to another note
    /// (or cannot be read), the short ID is appended to the slug, and failing
    /// that the full ID. A file already holding this note's ID is reused.
    /// A category that is not a plain directory name is a validation error.
    pub fn location_for(&self, note: &Note) -> Result<Location, Error> {
        validate_category(&note.category)?;
        let slug = match slugify(&note.title) {
            s if s.is_empty() => "untitled".to_string(),
            s => s,
        };
        let candidates = [
            slug.clone(),
            format!("{}-{}", slug, note.short_id()),
            format!("{}-{}", slug, note.id),
        ];

        for (i, stem) in candidates.iter().enumerate() {
            let location = Location::new(&note.category, &format!("{}.{}", stem, NOTE_EXT));
            match self.holder_of(&location) {
                None => return Ok(location),
                Some(id) if id == note.id => return Ok(location),
                Some(_) if i + 1 < candidates.len() => {
                    warn!(%location, id = %note.id, "slug taken by another note, disambiguating");
                }
                Some(_) => {}
            }
        }

        Err(Error::Storage(format!(
            "no free location for note {} in {}",
            note.id, note.category
        )))
    }

    /// Write `note` at the location chosen by [`location_for`](Self::location_for)
    /// and return it. Creates the category directory if needed.
    pub fn write(&self, note: &Note) -> Result<Location, Error> {
        let location = self.location_for(note)?;
        self.write_at(&location, note)?;
        Ok(location)
    }

    /// Write `note` at `location`, replacing whatever is there.
    ///
    /// Writes to a temp file and renames it into place, so readers never see
    /// a partial record.
    pub fn write_at(&self, location: &Location, note: &Note) -> Result<(), Error> {
        let path = self.path_of(location);
        let dir = self.root.join(location.category());
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Failed to create category dir: {}", e)))?;

        let contents = encode(note)?;
        let temp_path = dir.join(format!(".{}.tmp", location.file_name()));

        let mut file = File::create(&temp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

        fs::rename(&temp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))?;
        Ok(())
    }

    /// Read and parse the record at `location`.
    pub fn read(&self, location: &Location) -> Result<Note, Error> {
        let path = self.path_of(location);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(location.to_string()))
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read {}: {}",
                    location, e
                )))
            }
        };
        decode(&contents).map_err(|reason| Error::CorruptRecord {
            location: location.to_string(),
            reason,
        })
    }

    /// Remove the record at `location`. A missing file is not an error.
    pub fn delete(&self, location: &Location) -> Result<(), Error> {
        match fs::remove_file(self.path_of(location)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to delete {}: {}",
                location, e
            ))),
        }
    }

    /// Every note file under every category, ordered by location.
    /// Hidden directories and files are skipped.
    pub fn locations(&self) -> Result<Vec<Location>, Error> {
        let mut locations = Vec::new();

        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", self.root.display(), e)))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Storage(format!("Failed to read dir entry: {}", e)))?;
            let path = entry.path();
            let Some(category) = visible_name(&path) else {
                continue;
            };
            if !path.is_dir() {
                continue;
            }

            let files = fs::read_dir(&path)
                .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            for file in files.flatten() {
                let file_path = file.path();
                let Some(file_name) = visible_name(&file_path) else {
                    continue;
                };
                if file_path.is_file() && file_path.extension().map(|e| e == NOTE_EXT).unwrap_or(false) {
                    locations.push(Location::new(category, file_name));
                }
            }
        }

        locations.sort();
        Ok(locations)
    }

    /// ID of the note stored at `location`, `Some("")` if the file exists
    /// but cannot be parsed, `None` if there is no file.
    fn holder_of(&self, location: &Location) -> Option<String> {
        match self.read(location) {
            Ok(note) => Some(note.id),
            Err(Error::NotFound(_)) => None,
            Err(_) => Some(String::new()),
        }
    }
}

fn visible_name(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
}

fn encode(note: &Note) -> Result<String, Error> {
    let meta = NoteMeta {
        id: note.id.clone(),
        title: note.title.clone(),
        created: note.created,
        updated: note.updated,
        tags: note.tags.clone(),
        category: note.category.clone(),
        metadata: note.metadata.clone(),
    };
    let yaml = serde_yaml::to_string(&meta)
        .map_err(|e| Error::Storage(format!("Failed to serialize note {}: {}", note.id, e)))?;

    Ok(format!("{}{}---\n\n{}\n", FRONTMATTER_OPEN, yaml, note.content))
}

/// Parse a note file. On failure returns the reason the record is corrupt.
fn decode(contents: &str) -> Result<Note, String> {
    let rest = contents
        .strip_prefix(FRONTMATTER_OPEN)
        .ok_or_else(|| "missing frontmatter".to_string())?;
    let (yaml, body) = rest
        .split_once(FRONTMATTER_CLOSE)
        .ok_or_else(|| "malformed frontmatter".to_string())?;

    let meta: NoteMeta =
        serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse frontmatter: {}", e))?;

    Ok(Note {
        id: meta.id,
        category: meta.category,
        title: meta.title,
        content: body.trim().to_string(),
        tags: meta.tags,
        created: meta.created,
        updated: meta.updated,
        metadata: meta.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, NoteRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = NoteRepository::open(temp_dir.path()).unwrap();
        (temp_dir, repo)
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let (_temp, repo) = setup();
        let note = Note::new(
            "creds",
            "Stripe Key: \"live\"",
            "line one\n\n---\nline after a rule",
            vec!["payment".into(), "stripe".into()],
        );

        let location = repo.write(&note).unwrap();
        assert_eq!(location.as_str(), "creds/stripe-key-live.md");
        assert_eq!(repo.read(&location).unwrap(), note);
    }

    #[test]
    fn test_file_layout() {
        let (temp, repo) = setup();
        let note = Note::new("creds", "Stripe Key", "sk_test_123", vec![]);
        repo.write(&note).unwrap();

        let raw = fs::read_to_string(temp.path().join("creds").join("stripe-key.md")).unwrap();
        assert!(raw.starts_with("---\n"));
        assert!(raw.contains(&format!("id: {}", note.id)));
        assert!(raw.contains("category: creds"));
        assert!(!raw.contains("tags:"));
        assert!(raw.ends_with("---\n\nsk_test_123\n"));
    }

    #[test]
    fn test_reads_header_without_metadata() {
        let (temp, repo) = setup();
        fs::create_dir_all(temp.path().join("notes")).unwrap();
        fs::write(
            temp.path().join("notes").join("hello.md"),
            "---\nid: abc\ntitle: Hello\ncreated: 2024-05-01T10:00:00.5-05:00\nupdated: 2024-05-01T10:00:00.5-05:00\ncategory: notes\n---\n\n  hello world  \n",
        )
        .unwrap();

        let note = repo.read(&Location::new("notes", "hello.md")).unwrap();
        assert_eq!(note.id, "abc");
        assert_eq!(note.content, "hello world");
        assert!(note.tags.is_empty());
        assert!(note.metadata.is_empty());
        assert_eq!(note.created.to_rfc3339(), "2024-05-01T15:00:00.500+00:00");
    }

    #[test]
    fn test_corrupt_records() {
        let (temp, repo) = setup();
        let dir = temp.path().join("bad");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("none.md"), "just text").unwrap();
        fs::write(dir.join("open.md"), "---\nid: x\n").unwrap();
        fs::write(
            dir.join("time.md"),
            "---\nid: x\ntitle: t\ncreated: yesterday\nupdated: yesterday\ncategory: bad\n---\n\nbody\n",
        )
        .unwrap();

        for name in ["none.md", "open.md", "time.md"] {
            let err = repo.read(&Location::new("bad", name)).unwrap_err();
            assert!(matches!(err, Error::CorruptRecord { .. }), "{}: {:?}", name, err);
        }
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_temp, repo) = setup();
        let err = repo.read(&Location::new("x", "y.md")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_slug_collision_is_disambiguated() {
        let (_temp, repo) = setup();
        let first = Note::new("c", "My Note!", "one", vec![]);
        let second = Note::new("c", "My Note?", "two", vec![]);

        let a = repo.write(&first).unwrap();
        let b = repo.write(&second).unwrap();

        assert_eq!(a.as_str(), "c/my-note.md");
        assert_eq!(b.as_str(), format!("c/my-note-{}.md", second.short_id()));
        assert_eq!(repo.read(&a).unwrap().content, "one");
        assert_eq!(repo.read(&b).unwrap().content, "two");
    }

    #[test]
    fn test_rewrite_same_note_reuses_location() {
        let (_temp, repo) = setup();
        let mut note = Note::new("c", "Title", "one", vec![]);
        let a = repo.write(&note).unwrap();
        note.content = "two".into();
        let b = repo.write(&note).unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.locations().unwrap().len(), 1);
    }

    #[test]
    fn test_unparseable_file_is_not_overwritten() {
        let (temp, repo) = setup();
        fs::create_dir_all(temp.path().join("c")).unwrap();
        fs::write(temp.path().join("c").join("title.md"), "hand written").unwrap();

        let note = Note::new("c", "Title", "body", vec![]);
        let location = repo.write(&note).unwrap();
        assert_ne!(location.as_str(), "c/title.md");
        assert_eq!(
            fs::read_to_string(temp.path().join("c").join("title.md")).unwrap(),
            "hand written"
        );
    }

    #[test]
    fn test_empty_slug() {
        let (_temp, repo) = setup();
        let note = Note::new("c", "???", "body", vec![]);
        assert_eq!(repo.write(&note).unwrap().as_str(), "c/untitled.md");
    }

    #[test]
    fn test_write_rejects_unsafe_categories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        let repo = NoteRepository::open(&root).unwrap();
        for category in ["..", "", "a/b", ".index"] {
            let note = Note::new(category, "Escaped", "x", vec![]);
            assert!(
                matches!(repo.write(&note), Err(Error::Validation(_))),
                "{:?} should be rejected",
                category
            );
        }
        assert!(!temp.path().join("escaped.md").exists());
        assert!(!root.join("escaped.md").exists());
        assert!(!root.join("a").exists());
        assert!(repo.locations().unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let (_temp, repo) = setup();
        let note = Note::new("c", "Title", "body", vec![]);
        let location = repo.write(&note).unwrap();
        repo.delete(&location).unwrap();
        repo.delete(&location).unwrap();
        assert!(!repo.exists(&location));
    }

    #[test]
    fn test_locations_skip_hidden_and_foreign_files() {
        let (temp, repo) = setup();
        repo.write(&Note::new("b", "Two", "x", vec![])).unwrap();
        repo.write(&Note::new("a", "One", "x", vec![])).unwrap();
        fs::create_dir_all(temp.path().join(".index")).unwrap();
        fs::write(temp.path().join(".index").join("x.md"), "").unwrap();
        fs::write(temp.path().join("a").join("notes.txt"), "").unwrap();
        fs::write(temp.path().join("a").join(".draft.md"), "").unwrap();
        fs::write(temp.path().join("stray.md"), "").unwrap();

        let locations: Vec<_> = repo
            .locations()
            .unwrap()
            .into_iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(locations, vec!["a/one.md", "b/two.md"]);
    }
}
