//! Sort-key normalization for text fields.
//!
//! Every sortable text column has a `sort_*` companion computed here so that
//! "The Beatles", "beatles" and "Beatles, The" land next to each other.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+[,\d]*)").expect("valid regex"));
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(a|an|the) ").expect("valid regex"));
static EMBEDDED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" (\d+)").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

fn canonical_number(raw: &str) -> String {
    let digits = raw.replace(',', "");
    match digits.parse::<i64>() {
        Ok(n) => format!("~{n:06}"),
        Err(_) => raw.to_string(),
    }
}

/// Normalize a value into its sort key.
#[must_use]
pub fn make_sort(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let s = strip_accents(value).to_lowercase();
    let s = LEADING_NUMBER.replace(&s, |caps: &regex::Captures<'_>| canonical_number(&caps[1]));
    let s = NON_ALNUM.replace_all(&s, " ");
    let s = ARTICLE.replace(&s, " ");
    let s = EMBEDDED_NUMBER.replace_all(&s, "~$1");
    let s = SPACES.replace_all(&s, " ");
    s.trim_end_matches('~').trim().to_string()
}

/// Like [`make_sort`], but drops featured artists.
#[must_use]
pub fn make_sort_artist(value: &str) -> String {
    let s = make_sort(value);
    let cut = [" feat ", " featuring ", " with "]
        .iter()
        .find_map(|sep| s.split_once(sep).map(|(head, _)| head.to_string()));
    cut.unwrap_or(s).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_sort_articles_and_case() {
        assert_eq!(make_sort("The Beatles"), "beatles");
        assert_eq!(make_sort("A Tribe Called Quest"), "tribe called quest");
        assert_eq!(make_sort("Anthrax"), "anthrax");
    }

    #[test]
    fn test_make_sort_accents_and_punctuation() {
        assert_eq!(make_sort("Björk"), "bjork");
        assert_eq!(make_sort("AC/DC"), "ac dc");
        assert_eq!(make_sort("  Sigur   Rós  "), "sigur ros");
    }

    #[test]
    fn test_make_sort_numbers() {
        assert_eq!(make_sort("1,000 Forms of Fear"), "~001000 forms of fear");
        assert_eq!(make_sort("Track 7"), "track~7");
    }

    #[test]
    fn test_make_sort_empty() {
        assert_eq!(make_sort(""), "");
        assert_eq!(make_sort("!!!"), "");
    }

    #[test]
    fn test_make_sort_artist_drops_featured() {
        assert_eq!(make_sort_artist("Daft Punk feat. Pharrell"), "daft punk");
        assert_eq!(make_sort_artist("Santana featuring Rob Thomas"), "santana");
        assert_eq!(make_sort_artist("Simon with Garfunkel"), "simon");
        assert_eq!(make_sort_artist("The Who"), "who");
    }
}
