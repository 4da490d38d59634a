// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turns arbitrary title text into filesystem-safe, length-bounded tokens.
//!
//! Cleaning replaces whitespace with `_` and removes characters no
//! filesystem accepts. Shortening then works on the `_`-separated words,
//! applying increasingly lossy stages until the result fits the budget.

/// Options controlling how titles are cleaned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    /// Map accented Latin letters and typographic punctuation to ASCII
    pub fold_unicode: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self { fold_unicode: true }
    }
}

/// Space available for a title once the fixed parts of a filename are reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortenBudget {
    /// Maximum length of the complete filename in bytes
    pub max_total: usize,
    /// Length of the text placed before the title (e.g. `"001_"`)
    pub prefix_len: usize,
    /// Length of the text placed after the title (e.g. `".mp3"`)
    pub suffix_len: usize,
}

impl ShortenBudget {
    /// Bytes left for the title; zero when the reserved parts use everything
    pub fn available(&self) -> usize {
        self.max_total
            .saturating_sub(self.prefix_len)
            .saturating_sub(self.suffix_len)
    }
}

/// Words dropped by the second shortening stage (English, French, Spanish,
/// German, Italian). Compared case-insensitively after folding.
const STOP_WORDS: &[&str] = &[
    // English
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "at", "for", "with", "by", "from",
    "is", "are", "was", "be", "it", "its", "this", "that", "as", "about", "into",
    // French
    "le", "la", "les", "l", "un", "une", "des", "du", "de", "d", "et", "ou", "en", "au", "aux",
    "pour", "par", "sur", "dans", "avec", "est", "ce", "cette", "ces", "qui", "que", "tu", "es",
    "à", "où",
    // Spanish
    "el", "los", "las", "y", "o", "del", "al", "con", "por", "para", "unos", "unas", "una",
    // German
    "der", "die", "das", "den", "dem", "ein", "eine", "einer", "und", "oder", "mit", "von",
    "zu", "im", "ist", "auf", "fur", "für",
    // Italian
    "il", "lo", "gli", "i", "e", "di", "da", "su", "nel", "della", "che",
];

/// Shortening strategies tried in order after plain cleaning. Each takes the
/// cleaned tokens and is more lossy than the one before.
const SHORTENING_STAGES: [fn(&[String]) -> Vec<String>; 3] =
    [drop_stop_words, abbreviate_long_words, abbreviate_medium_words];

/// Clean a title into a filesystem-safe token
///
/// Whitespace runs become a single `_`, illegal characters are removed and
/// no leading or trailing `_` remains.
pub fn clean(text: &str, options: &CleanOptions) -> String {
    let folded = if options.fold_unicode {
        fold_to_ascii(text)
    } else {
        text.to_string()
    };

    // Whitespace first, otherwise newlines and tabs would be stripped as
    // control characters and glue words together.
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let safe = sanitize_filename::sanitize_with_options(
        spaced,
        sanitize_filename::Options {
            windows: true,
            truncate: false,
            replacement: "",
        },
    );

    join_tokens(&split_tokens(&safe))
}

/// Clean a title and shorten it to fit `budget`
///
/// Without a budget this is [`clean`]. With one, the result never exceeds
/// [`ShortenBudget::available`] bytes of UTF-8.
pub fn shorten(text: &str, budget: Option<&ShortenBudget>, options: &CleanOptions) -> String {
    let cleaned = clean(text, options);
    let Some(budget) = budget else {
        return cleaned;
    };

    let available = budget.available();
    if available == 0 {
        return String::new();
    }
    if cleaned.len() <= available {
        return cleaned;
    }

    let tokens = split_tokens(&cleaned);
    let mut shortest = tokens.clone();
    for stage in SHORTENING_STAGES {
        shortest = stage(&tokens);
        let joined = join_tokens(&shortest);
        if joined.len() <= available {
            return joined;
        }
    }

    truncate_tokens(shortest, available)
}

fn split_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

fn join_tokens(tokens: &[String]) -> String {
    tokens.join("_")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn is_stop_word(token: &str) -> bool {
    let word = token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    // Tokens made only of punctuation (a lone dash, say) carry nothing either
    word.is_empty() || STOP_WORDS.contains(&word.as_str())
}

fn drop_stop_words(tokens: &[String]) -> Vec<String> {
    let kept: Vec<String> = tokens
        .iter()
        .filter(|token| is_numeric(token) || !is_stop_word(token))
        .cloned()
        .collect();

    if kept.is_empty() { tokens.to_vec() } else { kept }
}

fn abbreviate(tokens: &[String], longer_than: usize, keep: usize) -> Vec<String> {
    tokens
        .iter()
        .map(|token| {
            if !is_numeric(token) && char_len(token) > longer_than {
                token.chars().take(keep).collect()
            } else {
                token.clone()
            }
        })
        .collect()
}

fn abbreviate_long_words(tokens: &[String]) -> Vec<String> {
    abbreviate(&drop_stop_words(tokens), 6, 4)
}

fn abbreviate_medium_words(tokens: &[String]) -> Vec<String> {
    abbreviate(&drop_stop_words(tokens), 5, 3)
}

/// Drop trailing tokens until the rest fits, hard-truncating a lone first token
fn truncate_tokens(mut tokens: Vec<String>, available: usize) -> String {
    while tokens.len() > 1 && join_tokens(&tokens).len() > available {
        tokens.pop();
    }

    let mut joined = join_tokens(&tokens);
    if joined.len() > available {
        let mut end = available;
        while !joined.is_char_boundary(end) {
            end -= 1;
        }
        joined.truncate(end);
    }
    joined
}

/// Best-effort transliteration of Latin text to ASCII
///
/// Characters without a mapping are passed through unchanged.
pub fn fold_to_ascii(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match fold_char(c) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(c),
        }
    }
    folded
}

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'Æ' => "AE",
        'æ' => "ae",
        'Ç' | 'Ć' | 'Č' => "C",
        'ç' | 'ć' | 'č' => "c",
        'Ď' | 'Đ' => "D",
        'ď' | 'đ' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'Ğ' => "G",
        'ğ' => "g",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'İ' => "I",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'Ł' => "L",
        'ł' => "l",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ñ' | 'ń' | 'ň' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => "O",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ř' => "R",
        'ř' => "r",
        'Ś' | 'Š' | 'Ş' => "S",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'Ť' | 'Ţ' => "T",
        'ť' | 'ţ' => "t",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' => "U",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'Ý' | 'Ÿ' => "Y",
        'ý' | 'ÿ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        'Þ' => "Th",
        'þ' => "th",
        'Ð' => "D",
        'ð' => "d",
        '‘' | '’' | '‚' | '′' => "'",
        '“' | '”' | '„' | '«' | '»' | '″' => "\"",
        '–' | '—' | '‐' | '‑' | '−' => "-",
        '…' => "...",
        '\u{00A0}' | '\u{202F}' => " ",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ILLEGAL: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

    fn plain(text: &str) -> String {
        clean(text, &CleanOptions::default())
    }

    fn shorten_to(text: &str, max_total: usize, prefix_len: usize, suffix_len: usize) -> String {
        shorten(
            text,
            Some(&ShortenBudget {
                max_total,
                prefix_len,
                suffix_len,
            }),
            &CleanOptions::default(),
        )
    }

    // === Cleaning ===

    #[test]
    fn clean_replaces_whitespace_with_underscores() {
        assert_eq!(plain("My Great Podcast"), "My_Great_Podcast");
    }

    #[test]
    fn clean_collapses_whitespace_runs() {
        assert_eq!(plain("a   b \t\n c"), "a_b_c");
    }

    #[test]
    fn clean_trims_leading_and_trailing_underscores() {
        assert_eq!(plain("  _hello_  "), "hello");
        assert_eq!(plain("__a__b__"), "a_b");
    }

    #[test]
    fn clean_removes_illegal_characters() {
        let cleaned = plain("Test Podcast: /\\:*?\"<>| Part 2");

        for c in ILLEGAL {
            assert!(!cleaned.contains(c), "{c:?} survived in {cleaned}");
        }
        assert_eq!(cleaned, "Test_Podcast_Part_2");
    }

    #[test]
    fn clean_handles_empty_and_only_illegal_input() {
        assert_eq!(plain(""), "");
        assert_eq!(plain(":::///"), "");
    }

    #[test]
    fn clean_folds_accents() {
        assert_eq!(
            plain("Esprit de Noël, es-tu là ? – Jour 23"),
            "Esprit_de_Noel,_es-tu_la_-_Jour_23"
        );
        assert_eq!(plain("La petite flamme du cœur"), "La_petite_flamme_du_coeur");
    }

    #[test]
    fn clean_passes_unicode_through_without_folding() {
        let options = CleanOptions {
            fold_unicode: false,
        };
        assert_eq!(clean("Noël à Paris", &options), "Noël_à_Paris");
    }

    #[test]
    fn fold_keeps_unmapped_characters() {
        assert_eq!(fold_to_ascii("東京 café"), "東京 cafe");
    }

    // === Shortening ===

    #[test]
    fn shorten_without_budget_only_cleans() {
        let long = "word ".repeat(100);
        assert_eq!(
            shorten(&long, None, &CleanOptions::default()),
            plain(&long)
        );
    }

    #[test]
    fn shorten_keeps_fitting_titles_untouched() {
        assert_eq!(shorten_to("The Show", 100, 4, 4), "The_Show");
    }

    #[test]
    fn shorten_drops_stop_words_first() {
        // "The_History_of_the_Roman_Empire" is 31 chars, 20 available
        assert_eq!(
            shorten_to("The History of the Roman Empire", 28, 4, 4),
            "History_Roman_Empire"
        );
    }

    #[test]
    fn shorten_keeps_numeric_tokens() {
        let result = shorten_to("Episode 1 of 2 in the Series", 22, 4, 4);
        assert!(result.contains('1'));
        assert!(result.contains('2'));
        assert!(result.chars().count() <= 14);
    }

    #[test]
    fn shorten_abbreviates_long_words() {
        // After stop words: "Understanding_Distributed_Systems" (33 chars)
        // Stage three gives "Unde_Dist_Syst" (14 chars)
        assert_eq!(
            shorten_to("Understanding the Distributed Systems", 22, 4, 4),
            "Unde_Dist_Syst"
        );
    }

    #[test]
    fn shorten_abbreviates_medium_words() {
        // Stage three leaves "Unde_Dist_Syst_Design" (21), stage four gives "Und_Dis_Sys_Des" (15)
        assert_eq!(
            shorten_to("Understanding Distributed Systems Design", 23, 4, 4),
            "Und_Dis_Sys_Des"
        );
    }

    #[test]
    fn shorten_does_not_abbreviate_numbers() {
        let result = shorten_to("12345678 Understanding", 21, 4, 4);
        assert!(result.starts_with("12345678"), "{result}");
    }

    #[test]
    fn shorten_drops_trailing_tokens_last() {
        // Five-letter words survive abbreviation, so only truncation helps
        let result = shorten_to("Alpha Bravo Charlie Delta Echo Foxtrot", 16, 4, 4);
        assert_eq!(result, "Alpha");
    }

    #[test]
    fn shorten_abbreviates_single_long_token() {
        assert_eq!(shorten_to(&"x".repeat(50), 18, 4, 4), "xxxx");
    }

    #[test]
    fn shorten_hard_truncates_single_token() {
        assert_eq!(shorten_to(&"x".repeat(50), 10, 4, 4), "xx");
    }

    #[test]
    fn shorten_returns_empty_when_reserved_space_exceeds_budget() {
        assert_eq!(shorten_to("Anything at all", 6, 4, 4), "");
        assert_eq!(shorten_to("Anything at all", 8, 4, 4), "");
    }

    #[test]
    fn shorten_respects_budget_for_all_title_lengths() {
        let words = ["the", "Épisode", "42", "international", "a", "Conversation", "x"];
        for len in 1..=500 {
            let mut title = String::new();
            let mut i = 0;
            while title.chars().count() < len {
                title.push_str(words[i % words.len()]);
                title.push(' ');
                i += 1;
            }
            let title: String = title.chars().take(len).collect();

            let result = shorten_to(&title, 27, 4, 4);
            assert!(
                result.len() <= 19,
                "title of length {len} produced {result:?}"
            );
            assert!(!result.starts_with('_') && !result.ends_with('_'));
        }
    }

    #[test]
    fn shorten_counts_bytes_for_unfolded_text() {
        let budget = ShortenBudget {
            max_total: 20,
            prefix_len: 0,
            suffix_len: 0,
        };
        let keep = CleanOptions {
            fold_unicode: false,
        };
        // Eleven characters but 33 bytes, so the long-word stage applies
        let result = shorten("日本語のポッドキャスト", Some(&budget), &keep);
        assert_eq!(result, "日本語の");

        // Hard truncation stops before a character that would cross the limit
        let tight = ShortenBudget {
            max_total: 5,
            ..budget
        };
        assert_eq!(shorten(&"é".repeat(30), Some(&tight), &keep), "éé");
    }

    #[test]
    fn shortened_output_never_contains_illegal_characters() {
        let title = "What? A \"Quote\" <tag> a|b c:d e*f g/h i\\j";
        for max_total in [12, 20, 40, 200] {
            let result = shorten_to(title, max_total, 4, 4);
            for c in ILLEGAL {
                assert!(!result.contains(c));
            }
            assert!(!result.contains(' '));
        }
    }
}
