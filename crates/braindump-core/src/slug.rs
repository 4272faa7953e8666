//! Filesystem-safe names derived from note titles.

/// Maximum slug length in bytes. Slugs are ASCII, so bytes == chars.
pub const MAX_SLUG_LEN: usize = 100;

/// Derive a filesystem-safe name from a title.
///
/// Lowercases, maps spaces and underscores to `-`, drops every other
/// character that is not an ASCII letter or digit, collapses runs of `-`,
/// trims `-` from both ends and caps the length at [`MAX_SLUG_LEN`].
///
/// Slugs are not unique: `"My Note!"` and `"My Note?"` both become `my-note`.
/// May return an empty string for titles without any usable character.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());

    for c in title.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'a'..='z' | '0'..='9' => c,
            ' ' | '_' => '-',
            _ => continue,
        };
        if mapped == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(mapped);
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(slugify("Stripe Key"), "stripe-key");
        assert_eq!(slugify("snake_case_title"), "snake-case-title");
    }

    #[test]
    fn test_drops_punctuation_and_collapses() {
        assert_eq!(slugify("My Note!"), "my-note");
        assert_eq!(slugify("My Note?"), "my-note");
        assert_eq!(slugify("  a -- b  "), "a-b");
        assert_eq!(slugify("pre-existing"), "preexisting");
        assert_eq!(slugify("v2.0 release (final)"), "v20-release-final");
    }

    #[test]
    fn test_non_ascii_dropped() {
        assert_eq!(slugify("café au lait"), "caf-au-lait");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_length_cap_does_not_leave_trailing_hyphen() {
        let title = format!("{} tail", "a".repeat(MAX_SLUG_LEN - 1));
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }
}
