//! Text utilities: markdown cleanup, sanity checks, fuzzy phrase matching,
//! and German sentence segmentation.

use strsim::normalized_levenshtein;

/// German-language phrases that end a conversation, matched fuzzily against
/// user input (the user rarely says these verbatim — "ja tschüss dann" vs.
/// "tschüss" should still count).
pub const END_PHRASES: &[&str] = &[
    "stop chat", "exit", "bye", "finish", "halt stoppen", "chat beenden",
    "auf wiedersehen", "tschüss", "ende", "schluss",
    "tschau", "ciao", "bis später", "wir sehen uns",
    "ich geh jetzt", "das wars", "das war's", "schluss jetzt",
    "genug für heute", "mach's gut",
];

/// Fuzzy-match `sentence` against [`END_PHRASES`] using normalized
/// Levenshtein similarity; `threshold` is on the same `0.0..=1.0` scale
/// (the original used a 0-100 fuzzy-match score with an 80 cutoff, i.e.
/// `0.80` here). Implementers of a different matcher should document
/// their own threshold the same way.
pub fn is_conversation_ending(sentence: &str, threshold: f64) -> bool {
    let lower = sentence.to_lowercase();
    END_PHRASES.iter().any(|phrase| {
        // A direct substring match always counts; otherwise fall back to
        // whole-string similarity for near-miss phrasing.
        lower.contains(phrase) || normalized_levenshtein(&lower, phrase) >= threshold
    })
}

/// True if `text` looks like a plausible German utterance worth acting on:
/// at least 3 characters long, and containing at least one alphabetic
/// "word" of length >= 2 using the German Latin alphabet (including
/// umlauts and eszett). This is a deliberately loose heuristic — its job is
/// to reject silence, coughs-as-noise-transcripts, and single-letter STT
/// artifacts, not to validate grammar.
pub fn is_sane_input_german(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    trimmed.split_whitespace().any(|word| {
        let letters: String = word
            .chars()
            .filter(|c| c.is_alphabetic() || "äöüÄÖÜß".contains(*c))
            .collect();
        letters.chars().count() >= 2
    })
}

/// Markdown/formatting cleanup before handing assistant text to TTS.
/// Idempotent: running it twice produces the same output as running it once.
pub fn clean_str_from_markdown(text: &str) -> String {
    let mut out = text.replace('\n', ". ");

    // Strip markdown emphasis/quote characters the TTS voice would
    // otherwise read aloud literally.
    out = out.chars().filter(|c| !"*_#`'\"".contains(*c)).collect();

    // Collapse "word.," "word.!" etc. into a single terminal punctuation
    // mark left over from stripped markdown.
    out = collapse_double_punctuation(&out);

    // Ensure a space follows a sentence-final period that isn't part of a
    // decimal number, so sentence splitting doesn't merge two sentences.
    out = insert_space_after_period(&out);

    // Drop enumeration fragments like ".1." left behind by stripped
    // ordered-list markers.
    out = remove_enumeration_fragments(&out);

    out
}

fn collapse_double_punctuation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if "?:!.,".contains(c) && chars.get(i + 1) == Some(&'.') {
            result.push(c);
            i += 2;
            continue;
        }
        result.push(c);
        i += 1;
    }
    result
}

fn insert_space_after_period(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len() + 8);
    for i in 0..chars.len() {
        let c = chars[i];
        result.push(c);
        if c == '.' {
            let prev_is_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let next = chars.get(i + 1).copied();
            let next_is_digit_or_space = next.map(|n| n.is_ascii_digit() || n.is_whitespace()).unwrap_or(true);
            if !prev_is_digit && !next_is_digit_or_space {
                result.push(' ');
            }
        }
    }
    result
}

fn remove_enumeration_fragments(text: &str) -> String {
    // Replace ".<digits>." with "." (leftover ordered-list markers).
    let mut out = String::with_capacity(text.len());
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '.' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && bytes.get(j) == Some(&'.') {
                out.push('.');
                i = j + 1;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Split German text into sentences on `.`, `?`, `!`, keeping the
/// terminator attached to the preceding sentence. A short list of common
/// abbreviations is exempted so "z.B." or "Dr." doesn't end a sentence.
pub fn split_sentences_german(text: &str) -> Vec<String> {
    const ABBREVIATIONS: &[&str] = &["z.b", "d.h", "u.a", "etc", "dr", "herr", "frau", "bzw", "ca", "nr"];

    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if matches!(c, '.' | '?' | '!') {
            let lower_tail = current.to_lowercase();
            let is_abbrev = ABBREVIATIONS.iter().any(|a| lower_tail.trim_end_matches('.').ends_with(a));
            let next_is_lower_or_none = chars
                .get(i + 1)
                .map(|n| n.is_lowercase() || n.is_ascii_digit())
                .unwrap_or(false);
            if !is_abbrev && !next_is_lower_or_none {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_input_rejects_short_noise() {
        assert!(!is_sane_input_german("äh"));
        assert!(!is_sane_input_german(""));
    }

    #[test]
    fn sane_input_accepts_real_sentence() {
        assert!(is_sane_input_german("mach das licht an"));
    }

    #[test]
    fn conversation_ending_matches_substring() {
        assert!(is_conversation_ending("ja, tschüss dann", 0.8));
    }

    #[test]
    fn conversation_ending_rejects_unrelated_text() {
        assert!(!is_conversation_ending("wie spät ist es", 0.8));
    }

    #[test]
    fn markdown_cleanup_strips_emphasis_and_is_idempotent() {
        let raw = "**Wichtig:** das ist *toll*.\nZweite Zeile.";
        let once = clean_str_from_markdown(raw);
        let twice = clean_str_from_markdown(&once);
        assert_eq!(once, twice);
        assert!(!once.contains('*'));
    }

    #[test]
    fn sentence_split_respects_abbreviation() {
        let sentences = split_sentences_german("Das ist z.B. ein Test. Und hier die zweite Aussage!");
        assert_eq!(sentences.len(), 2);
    }
}
