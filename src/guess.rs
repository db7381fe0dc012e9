//! Guess evaluation
//!
//! A guess matches when it equals the secret phrase after both have been
//! normalized: lowercased, stripped of everything except ASCII letters,
//! digits and whitespace, whitespace runs collapsed, ends trimmed. A single
//! leading article ("the", "a", "an") is not significant.

/// Canonical form used for comparing guesses against the phrase
pub fn normalize(input: &str) -> String {
    let lowered = input.to_lowercase();
    let kept = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace());

    let mut normalized = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in kept {
        if c.is_whitespace() {
            pending_space = !normalized.is_empty();
        } else {
            if pending_space {
                normalized.push(' ');
                pending_space = false;
            }
            normalized.push(c);
        }
    }
    normalized
}

const ARTICLES: &[&str] = &["the ", "a ", "an "];

fn without_leading_article(normalized: &str) -> &str {
    ARTICLES
        .iter()
        .find_map(|article| normalized.strip_prefix(article))
        .unwrap_or(normalized)
}

/// Exact match after normalization. No partial credit.
pub fn is_correct(guess: &str, phrase: &str) -> bool {
    let guess = normalize(guess);
    let phrase = normalize(phrase);
    guess == phrase || without_leading_article(&guess) == without_leading_article(&phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("The Eiffel Tower!"), "the eiffel tower");
        assert_eq!(normalize("  Rock   and\tRoll  "), "rock and roll");
        assert_eq!(normalize("Spider-Man"), "spiderman");
        assert_eq!(normalize("Café 2024"), "caf 2024");
        assert_eq!(normalize("🗼❤️🇫🇷"), "");
    }

    #[test]
    fn test_removed_characters_do_not_leave_double_spaces() {
        assert_eq!(normalize("hot ! dog"), "hot dog");
        assert_eq!(normalize("!!! hot dog"), "hot dog");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "The Eiffel Tower!",
            "  Mixed\n\nLines\r\nand  tabs\t",
            "ÀÉÎÕÜ àéîõü",
            "İstanbul",
            "emoji 🎉 party 🎂",
            "100% Pure-Fun?!",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_is_correct() {
        assert!(is_correct("The Eiffel Tower!", "the eiffel tower"));
        assert!(is_correct("eiffel tower", "Eiffel Tower"));
        assert!(!is_correct("eiffel", "the eiffel tower"));
        assert!(!is_correct("tower", "The Eiffel Tower"));
    }

    #[test]
    fn test_leading_article_is_optional() {
        assert!(is_correct("eiffel tower", "The Eiffel Tower"));
        assert!(is_correct("the lion king", "Lion King"));
        assert!(is_correct("A piece of cake", "piece of cake"));
        assert!(!is_correct("the", "The Eiffel Tower"));
        assert!(!is_correct("", "The Eiffel Tower"));
    }

    #[test]
    fn test_is_correct_is_deterministic() {
        for _ in 0..3 {
            assert!(is_correct("PIZZA party", "Pizza Party"));
        }
    }
}
