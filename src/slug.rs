//! URL slugs for items and blog posts

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s_-]").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").unwrap());

/// ASCII-folded, lowercase, hyphen-separated
pub fn slugify(text: &str) -> String {
    let ascii: String = text.nfkd().filter(|c| c.is_ascii()).collect();
    let lowered = ascii.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    SEPARATORS
        .replace_all(cleaned.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// `base`, `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Dungeons & Dragons: 5th Edition"), "dungeons-dragons-5th-edition");
        assert_eq!(slugify("  Pokémon   Trading Card Game "), "pokemon-trading-card-game");
        assert_eq!(slugify("snake_case--name"), "snake-case-name");
    }

    #[test]
    fn test_slugify_non_latin_is_empty() {
        assert_eq!(slugify("東方"), "");
    }

    #[test]
    fn test_candidates() {
        assert_eq!(candidate("catan", 1), "catan");
        assert_eq!(candidate("catan", 3), "catan-3");
    }
}
