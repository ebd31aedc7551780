use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Accent- and case-insensitive lookup key: NFD, combining marks dropped,
/// lowercased, whitespace collapsed.
pub fn fold_key(value: &str) -> String {
    let folded: String = value
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First token of a compound surname ("Garcés Rojas" -> "Garcés").
pub fn paternal_surname(last_name: &str) -> &str {
    last_name.split_whitespace().next().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    primary: String,
    case_bits: Vec<bool>,
    raw: String,
}

/// Spanish-style sort key. Accents are ignored at the primary level, `ñ`
/// sorts after `n`, and on primary ties lowercase sorts before uppercase.
pub fn collation_key(value: &str) -> CollationKey {
    let mut primary = String::with_capacity(value.len());
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch == 'ñ' {
            primary.push('n');
            primary.push('~');
            continue;
        }
        primary.extend(std::iter::once(ch).nfd().filter(|c| !is_combining_mark(*c)));
    }
    CollationKey {
        primary,
        case_bits: value.chars().map(char::is_uppercase).collect(),
        raw: value.to_string(),
    }
}

pub fn compare_collated(a: &str, b: &str) -> Ordering {
    collation_key(a).cmp(&collation_key(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_key_strips_accents_and_case() {
        assert_eq!(fold_key("  José  MUÑOZ "), "jose munoz");
        assert_eq!(fold_key("Garcés"), "garces");
        assert_eq!(fold_key(""), "");
    }

    #[test]
    fn paternal_surname_takes_first_token() {
        assert_eq!(paternal_surname("Garcés Rojas"), "Garcés");
        assert_eq!(paternal_surname("  Soto "), "Soto");
        assert_eq!(paternal_surname(""), "");
    }

    #[test]
    fn collation_ignores_accents_and_orders_enye_after_n() {
        assert_eq!(compare_collated("Álvarez", "Alvear"), Ordering::Less);
        assert_eq!(compare_collated("Nuñez", "Nunez"), Ordering::Greater);
        assert_eq!(compare_collated("Muñoz", "Munoz Z"), Ordering::Greater);
        assert_eq!(compare_collated("Muñoz", "Mura"), Ordering::Less);
        assert_eq!(compare_collated("soto", "Soto"), Ordering::Less);
    }
}
