use crate::types::NameParts;

const ORGANIZATION_KEYWORDS: [&str; 6] = [
    "LLC",
    "INC",
    "CORP",
    "COMPANY",
    "INVESTMENTS",
    "ENTERPRISES",
];

const PREFIXES: [&str; 6] = ["Dr.", "Mr.", "Ms.", "Mrs.", "Miss", "Prof."];

const SUFFIXES: [&str; 8] = ["Jr.", "Sr.", "II", "III", "IV", "Ph.D.", "M.D.", "Esq."];

pub fn is_organization(name: &str) -> bool {
    let upper = name.to_uppercase();
    ORGANIZATION_KEYWORDS.iter().any(|k| upper.contains(*k))
}

/// Abbreviated honorifics ("Dr.") may run straight into the name; "Miss"
/// only counts as a whole word, so "Missy" keeps it.
fn strip_prefix(name: &str) -> &str {
    PREFIXES
        .iter()
        .find_map(|p| {
            name.strip_prefix(*p).filter(|rest| {
                p.ends_with('.') || rest.is_empty() || rest.starts_with(char::is_whitespace)
            })
        })
        .map(str::trim)
        .unwrap_or(name)
}

fn strip_suffix(name: &str) -> &str {
    SUFFIXES
        .iter()
        .find_map(|s| {
            name.strip_suffix(*s)
                .filter(|rest| rest.is_empty() || rest.ends_with(char::is_whitespace))
        })
        .map(str::trim)
        .unwrap_or(name)
}

/// Splits an owner name into first and last name.
///
/// Organizations keep their whole name as the last name. For people, one
/// honorific prefix and one generational/professional suffix are dropped; the
/// first remaining word is the first name and the rest is the last name.
pub fn split_full_name(full_name: &str) -> NameParts {
    let trimmed = full_name.trim();
    if is_organization(trimmed) {
        return NameParts {
            first_name: String::new(),
            last_name: trimmed.to_string(),
        };
    }

    let core = strip_suffix(strip_prefix(trimmed));
    let mut words = core.split_whitespace();
    let first_name = words.next().unwrap_or_default().to_string();
    let last_name = words.collect::<Vec<_>>().join(" ");

    NameParts {
        first_name,
        last_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) {
        let parts = split_full_name(name);
        (parts.first_name, parts.last_name)
    }

    #[test]
    fn test_organization_keeps_full_name() {
        assert_eq!(
            split("Acme Investments LLC"),
            ("".into(), "Acme Investments LLC".into())
        );
        assert_eq!(
            split("  river city corp "),
            ("".into(), "river city corp".into())
        );
    }

    #[test]
    fn test_prefix_and_suffix_removed() {
        assert_eq!(split("Dr. John Smith Jr."), ("John".into(), "Smith".into()));
        assert_eq!(split("Mrs. Ann Lee"), ("Ann".into(), "Lee".into()));
        assert_eq!(split("John Smith III"), ("John".into(), "Smith".into()));
    }

    #[test]
    fn test_prefix_must_be_whole_word() {
        assert_eq!(split("Missy Jones"), ("Missy".into(), "Jones".into()));
        assert_eq!(split("Miss Ann Lee"), ("Ann".into(), "Lee".into()));
    }

    #[test]
    fn test_abbreviated_prefix_without_space() {
        assert_eq!(split("Dr.John Smith"), ("John".into(), "Smith".into()));
        assert_eq!(split("Mrs.Ann Lee Sr."), ("Ann".into(), "Lee".into()));
    }

    #[test]
    fn test_multi_word_last_name() {
        assert_eq!(
            split("Maria de la Cruz"),
            ("Maria".into(), "de la Cruz".into())
        );
    }

    #[test]
    fn test_single_and_empty() {
        assert_eq!(split("Cher"), ("Cher".into(), "".into()));
        assert_eq!(split("Mr."), ("".into(), "".into()));
        assert_eq!(split("   "), ("".into(), "".into()));
    }
}
