//! Text normalization shared by the store and the matcher.
//!
//! Two catalogs maintained by different people rarely agree on accents or
//! capitalization, so identity comparisons go through [`fold`], and fuzzy
//! comparisons through [`words`].

use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Strip diacritics and lower-case: `"Beyoncé"` -> `"beyonce"`.
///
/// Uses NFKD decomposition and drops the combining marks. Surrounding
/// whitespace is trimmed; inner whitespace is left alone.
pub fn fold(s: &str) -> String {
    s.trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tokenize into folded, alphanumeric-only words.
///
/// Everything that is not a letter or digit splits words, so
/// `"Sgt. Pepper's"` yields `{"sgt", "pepper", "s"}`.
pub fn words(s: &str) -> BTreeSet<String> {
    fold(s)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Number of words shared by two token sets.
pub fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("Beyoncé"), "beyonce");
        assert_eq!(fold("  MOTÖRHEAD "), "motorhead");
        assert_eq!(fold("Sigur Rós"), "sigur ros");
    }

    #[test]
    fn test_fold_equal_for_accent_variants() {
        assert_eq!(fold("Café Tacvba"), fold("cafe tacvba"));
    }

    #[test]
    fn test_words_splits_on_punctuation() {
        let w = words("Sgt. Pepper's Lonely-Hearts");
        let expected: BTreeSet<String> = ["sgt", "pepper", "s", "lonely", "hearts"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(w, expected);
    }

    #[test]
    fn test_words_of_empty_string() {
        assert!(words("").is_empty());
        assert!(words(" -- ").is_empty());
    }

    #[test]
    fn test_overlap_counts_shared_words() {
        let a = words("The Dark Side of the Moon");
        let b = words("Dark Side Of The Moon (Remastered)");
        assert_eq!(overlap(&a, &b), 5);
        assert_eq!(overlap(&a, &words("Animals")), 0);
    }
}
