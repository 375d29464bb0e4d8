//! Lexical overlap between two observations.
//!
//! Jaccard index over lowercase whitespace-separated word sets. Cheap enough
//! to run on every insert; near-duplicates phrased differently slip through.

use std::collections::HashSet;

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// `|A ∩ B| / |A ∪ B|` over the word sets of `a` and `b`, in `[0, 1]`.
///
/// Two texts without any words score `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_words = word_set(a);
    let b_words = word_set(b);
    let union = a_words.union(&b_words).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a_words.intersection(&b_words).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(similarity("Build failed on main", "Build failed on main"), 1.0);
    }

    #[test]
    fn comparison_ignores_case_and_spacing() {
        assert_eq!(similarity("Login  ERROR", "login error"), 1.0);
    }

    #[test]
    fn symmetric() {
        let a = "reviewing pull request 42";
        let b = "pull request 42 merged";
        assert_eq!(similarity(a, b), similarity(b, a));
    }

    #[test]
    fn partial_overlap() {
        // {login, error} vs {login, error, occurred}: 2 / 3
        let score = similarity("login error", "login error occurred");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert!(score < 0.8);
    }

    #[test]
    fn disjoint_and_empty_inputs() {
        assert_eq!(similarity("alpha beta", "gamma delta"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("   ", "words"), 0.0);
    }

    #[test]
    fn repeated_words_count_once() {
        assert_eq!(similarity("ok ok ok", "ok"), 1.0);
    }
}
