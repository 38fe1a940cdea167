//! Note slug generation.
//!
//! Slugs have the form `{YYYY-MM-DD}-{slugified title}`. The repository
//! appends `-2`, `-3`, … when a slug is already taken.

use chrono::NaiveDate;

/// Lowercase ASCII slug of `text`.
///
/// ASCII alphanumerics are kept; every other run of characters becomes a
/// single `-`. Leading and trailing separators are dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Date-prefixed slug for a note titled `title`.
///
/// A title with no usable characters yields just the date.
pub fn date_slug(title: &str, date: NaiveDate) -> String {
    let base = slugify(title);
    let day = date.format("%Y-%m-%d");
    if base.is_empty() {
        day.to_string()
    } else {
        format!("{}-{}", day, base)
    }
}

/// `base` with a numeric suffix for the `n`-th clash (`n >= 2`).
pub fn with_suffix(base: &str, n: u32) -> String {
    format!("{}-{}", base, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & Postgres!  "), "rust-postgres");
        assert_eq!(slugify("a--b__c"), "a-b-c");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café crème"), "caf-cr-me");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn test_date_slug() {
        assert_eq!(date_slug("My First Note", day()), "2026-10-19-my-first-note");
        assert_eq!(date_slug("???", day()), "2026-10-19");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("2026-10-19-note", 2), "2026-10-19-note-2");
    }
}
