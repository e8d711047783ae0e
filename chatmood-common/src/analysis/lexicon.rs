//! Fixed negative-word lexicon
//!
//! Matching is a case-insensitive substring test, so "trashy" matches "trash"
//! and "studied" matches "die". That over-matching is accepted: the lexical
//! signal only nudges the model score, it never decides alone.

/// Words whose presence boosts the toxicity score
pub const NEGATIVE_WORDS: &[&str] = &[
    "idiot", "stupid", "dumb", "moron", "noob", "trash",
    "garbage", "worthless", "useless", "terrible", "awful", "horrible",
    "disgusting", "ugly", "pathetic", "lame", "loser", "clown",
    "hate", "kill", "die", "suicide", "burn", "toxic", "annoying",
    "bastard", "bitch", "fuck", "shit", "crap", "jerk", "asshole",
    "liar", "cheater", "scammer", "retard", "sucks", "crazy", "insane",
];

/// Return every lexicon word found in `text`, in lexicon order
pub fn detect_negative_words(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();
    NEGATIVE_WORDS
        .iter()
        .copied()
        .filter(|word| text.contains(word))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_case_insensitively() {
        assert_eq!(detect_negative_words("You are STUPID"), vec!["stupid"]);
    }

    #[test]
    fn test_substring_matches_count() {
        let hits = detect_negative_words("that play was trashy");
        assert_eq!(hits, vec!["trash"]);
    }

    #[test]
    fn test_multiple_hits_in_lexicon_order() {
        let hits = detect_negative_words("you idiot i hate this");
        assert_eq!(hits, vec!["idiot", "hate"]);
    }

    #[test]
    fn test_clean_text_has_no_hits() {
        assert!(detect_negative_words("great stream today").is_empty());
        assert!(detect_negative_words("").is_empty());
    }
}
