use serde::{Deserialize, Serialize};

/// Display forms of a resource kind (or plugin) name, used throughout
/// generated help text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    pub singular: String,
    pub plural: String,
    pub capitalized: String,
    pub capitalized_plural: String,
}

impl ResourceNames {
    /// Derive every form from `singular` with naive English pluralization.
    pub fn new(singular: &str) -> Self {
        Self::with_plural(singular, &pluralize(singular))
    }

    /// For kinds whose plural can't be derived ("index" → "indices").
    pub fn with_plural(singular: &str, plural: &str) -> Self {
        Self {
            singular: singular.to_string(),
            plural: plural.to_string(),
            capitalized: capitalize(singular),
            capitalized_plural: capitalize(plural),
        }
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

fn ends_with_vowel_y(word: &str) -> bool {
    let bytes = word.as_bytes();
    bytes.len() >= 2 && matches!(bytes[bytes.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u')
}
