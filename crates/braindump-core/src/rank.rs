//! Relevance ordering for search results.

use crate::Note;

/// Relevance of `note` for `query`, case-insensitive.
///
/// Title: +100 for an exact match, otherwise +50 if it contains the query.
/// Content: +30 if it starts with the query, otherwise +10 if it contains it.
pub fn score(note: &Note, query: &str) -> i32 {
    let query = query.to_lowercase();
    let title = note.title.to_lowercase();
    let content = note.content.to_lowercase();

    let mut score = 0;
    if title == query {
        score += 100;
    } else if title.contains(&query) {
        score += 50;
    }

    if content.starts_with(&query) {
        score += 30;
    } else if content.contains(&query) {
        score += 10;
    }
    score
}

/// Order notes by descending [`score`]. Equal scores keep their input order.
pub fn rank(notes: Vec<Note>, query: &str) -> Vec<Note> {
    let mut scored: Vec<(i32, Note)> = notes.into_iter().map(|n| (score(&n, query), n)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, n)| n).collect()
}

/// A short excerpt of `content` around the first occurrence of `query`.
///
/// Shows 20 characters before and 40 after the match, with `...` where the
/// excerpt is cut and newlines flattened to spaces. Without a match, the
/// first 80 characters.
pub fn match_preview(content: &str, query: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let folded: Vec<char> = chars.iter().map(|c| fold(*c)).collect();
    let needle: Vec<char> = query.chars().map(fold).collect();

    let found = if needle.is_empty() {
        None
    } else {
        folded.windows(needle.len()).position(|w| w == needle.as_slice())
    };

    let (start, end) = match found {
        Some(idx) => (
            idx.saturating_sub(20),
            (idx + needle.len() + 40).min(chars.len()),
        ),
        None => (0, chars.len().min(80)),
    };

    let mut preview: String = chars[start..end]
        .iter()
        .map(|c| if *c == '\n' || *c == '\r' { ' ' } else { *c })
        .collect();
    if start > 0 {
        preview.insert_str(0, "...");
    }
    if end < chars.len() {
        preview.push_str("...");
    }
    preview
}

// One-to-one lowercase so character offsets line up with the original.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
