//! Text normalization
//!
//! Produces the canonical string handed to the classifier:
//! 1. pictographs → `:textual_name:`
//! 2. URL-like tokens removed
//! 3. everything except ASCII letters, whitespace and `?` removed
//! 4. whitespace collapsed and trimmed
//! 5. lowercased
//!
//! The output alphabet is therefore `[a-z ?]`.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://\S+|www\.\S+").expect("URL pattern is valid")
});

static NON_ALPHA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z\s?]").expect("non-alpha pattern is valid")
});

static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace pattern is valid")
});

/// Longest emoji sequence we try to match (ZWJ families, flags, keycaps)
const MAX_EMOJI_CHARS: usize = 10;

/// Normalize a raw chat message
pub fn normalize(raw: &str) -> String {
    let text = demojize(raw);
    let text = URL_PATTERN.replace_all(&text, "");
    let text = NON_ALPHA_PATTERN.replace_all(&text, "");
    let text = WHITESPACE_PATTERN.replace_all(&text, " ");
    text.trim().to_ascii_lowercase()
}

/// Replace every pictograph with its name, e.g. 😠 → `:angry_face:`
pub fn demojize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(first) = rest.chars().next() {
        match longest_emoji_prefix(rest) {
            Some((len, emoji)) => {
                out.push(':');
                out.push_str(&emoji.name().replace(' ', "_"));
                out.push(':');
                rest = &rest[len..];
            }
            None => {
                out.push(first);
                rest = &rest[first.len_utf8()..];
            }
        }
    }

    out
}

fn longest_emoji_prefix(s: &str) -> Option<(usize, &'static emojis::Emoji)> {
    let mut chars = s.chars();
    let first = chars.next()?;
    // Plain ASCII only starts an emoji as a keycap base ("1️⃣", "#️⃣")
    if first.is_ascii() && chars.next().map_or(true, |c| c.is_ascii()) {
        return None;
    }

    let ends: Vec<usize> = s
        .char_indices()
        .take(MAX_EMOJI_CHARS)
        .map(|(i, c)| i + c.len_utf8())
        .collect();

    ends.iter()
        .rev()
        .find_map(|&end| emojis::get(&s[..end]).map(|emoji| (end, emoji)))
}
