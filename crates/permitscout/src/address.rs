use crate::types::ParsedAddress;

const ORDINAL_WORDS: [&str; 30] = [
    "First",
    "Second",
    "Third",
    "Fourth",
    "Fifth",
    "Sixth",
    "Seventh",
    "Eighth",
    "Ninth",
    "Tenth",
    "Eleventh",
    "Twelfth",
    "Thirteenth",
    "Fourteenth",
    "Fifteenth",
    "Sixteenth",
    "Seventeenth",
    "Eighteenth",
    "Nineteenth",
    "Twentieth",
    "Twenty First",
    "Twenty Second",
    "Twenty Third",
    "Twenty Fourth",
    "Twenty Fifth",
    "Twenty Sixth",
    "Twenty Seventh",
    "Twenty Eighth",
    "Twenty Ninth",
    "Thirtieth",
];

const ORDINAL_SUFFIXES: [&str; 4] = ["ST", "ND", "RD", "TH"];

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// The numeric part of `12`, `3RD`, `21st`; `None` for anything else.
fn ordinal_number(word: &str) -> Option<&str> {
    if is_digits(word) {
        return Some(word);
    }
    let split = word.len().checked_sub(2)?;
    let (number, suffix) = (word.get(..split)?, word.get(split..)?);
    let is_suffix = ORDINAL_SUFFIXES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(suffix));
    (is_digits(number) && is_suffix).then_some(number)
}

fn ordinal_word(number: &str) -> Option<&'static str> {
    let n: usize = number.parse().ok()?;
    // "03" is not a key in the table, only canonical spellings are
    if n.to_string() != number {
        return None;
    }
    ORDINAL_WORDS.get(n.checked_sub(1)?).copied()
}

/// Rewrites the first numeric or ordinal token of `text` as a word.
///
/// `3RD` becomes `Third`, `21` becomes `Twenty First`. Numbers outside 1..=30
/// come back as the token itself; text without such a token is returned as is.
pub fn normalize_ordinal(text: &str) -> String {
    for word in text.split_whitespace() {
        if let Some(number) = ordinal_number(word) {
            return ordinal_word(number).unwrap_or(word).to_string();
        }
    }
    text.to_string()
}

/// Splits `"123 3RD ST, Columbus OH 43215"` into its search parts.
///
/// The layout is positional: street number first, then the street name token,
/// and city/state/zip as the first three words after the last comma. Input
/// with fewer than two street tokens yields an empty address.
pub fn parse_address(text: &str) -> ParsedAddress {
    let segments: Vec<&str> = text.split(',').collect();
    let street: Vec<&str> = segments[0].split_whitespace().collect();

    if street.len() < 2 {
        return ParsedAddress::default();
    }

    let street_name = if street[1].chars().count() > 1 {
        Some(normalize_ordinal(street[1]))
    } else {
        street.get(2).map(|token| normalize_ordinal(token))
    };

    let locality: Vec<&str> = match segments.as_slice() {
        [_, .., last] => last.split_whitespace().collect(),
        _ => Vec::new(),
    };
    let part = |i: usize| locality.get(i).map(|s| s.to_string()).unwrap_or_default();

    ParsedAddress {
        street_no: street[0].to_string(),
        street_name,
        city: part(0),
        state: part(1),
        zip: part(2),
    }
}
