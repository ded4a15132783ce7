//! Field normalization
//!
//! Canonicalizes raw field values before comparison. Normalization never
//! fails: a value that cannot be normalized is handed back unchanged (phone)
//! or reduced to an empty result (email), and callers treat that as
//! "could not normalize".

use idmatch_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+$").expect("valid trailing digits pattern"));
static EMAIL_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\-.]+").expect("valid separator pattern"));
static NAME_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));
static PHONE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:x|ext\.?|extension|#)\s*\d{1,6}\s*$").expect("valid extension pattern")
});
static PHONE_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s().\-/]+$").expect("valid phone pattern"));

/// Calling code assumed for numbers written without one
pub const DEFAULT_CALLING_CODE: u16 = 1;

/// Exit code dialled from the default region before an international number
const DEFAULT_EXIT_CODE: &str = "011";

/// ITU calling codes recognized without a region hint. The set is
/// prefix-free, so the first length that matches is the code.
const CALLING_CODES: &[u16] = &[
    1, 7, 20, 27, 30, 31, 32, 33, 34, 36, 39, 40, 41, 43, 44, 45, 46, 47, 48, 49, 51, 52, 53,
    54, 55, 56, 57, 58, 60, 61, 62, 63, 64, 65, 66, 81, 82, 84, 86, 90, 91, 92, 93, 94, 95, 98,
    212, 213, 216, 234, 254, 255, 256, 351, 352, 353, 354, 358, 370, 371, 372, 380, 385, 386,
    420, 421, 852, 853, 855, 880, 886, 961, 962, 963, 964, 965, 966, 971, 972, 973, 974, 977,
];

/// Local part of an email, reduced to its stable core
///
/// Lowercases the text before the first `@`, strips a trailing run of digits
/// and removes `.`, `_` and `-`, so `John.Doe42@x` and `johndoe@y` agree.
/// Returns `""` when there is no `@`.
pub fn extract_email_local_part(email: &str) -> String {
    let Some((local, _)) = email.split_once('@') else {
        return String::new();
    };
    let local = local.to_lowercase();
    let local = TRAILING_DIGITS.replace(&local, "");
    EMAIL_SEPARATORS.replace_all(&local, "").into_owned()
}

/// Domain of an email: the text between the first and second `@`
pub fn email_domain(email: &str) -> &str {
    email.split('@').nth(1).unwrap_or("")
}

/// Lowercased name with punctuation removed and whitespace trimmed
pub fn normalize_name(name: &str) -> String {
    NAME_PUNCTUATION
        .replace_all(&name.to_lowercase(), "")
        .trim()
        .to_string()
}

/// A phone number reduced to calling code and national significant number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    pub calling_code: u16,
    pub national: String,
}

impl PhoneNumber {
    /// E.164-style canonical form, `+<code><national>`
    pub fn e164(&self) -> String {
        format!("+{}{}", self.calling_code, self.national)
    }
}

/// Normalize a phone number to `(canonical, region_code)`
///
/// Parses with the North American grammar first (10 digits, or 11 with a
/// leading 1, or the 011 exit code), then retries without an assumed region
/// (`+` followed by a known calling code). On total failure the input is
/// returned unchanged with an empty region code.
pub fn normalize_phone(phone: &str) -> (String, String) {
    if phone.trim().is_empty() {
        return (String::new(), String::new());
    }

    match parse_phone(phone, Some(DEFAULT_CALLING_CODE)).or_else(|| parse_phone(phone, None)) {
        Some(number) => (number.e164(), number.calling_code.to_string()),
        None => {
            tracing::warn!("Failed to parse phone number {:?}", phone);
            (phone.to_string(), String::new())
        }
    }
}

/// Parse a phone number, optionally assuming a default calling code
pub fn parse_phone(phone: &str, default_region: Option<u16>) -> Option<PhoneNumber> {
    let trimmed = phone.trim();
    let without_extension = PHONE_EXTENSION.replace(trimmed, "");
    let body = without_extension.trim();
    if !PHONE_GRAMMAR.is_match(body) {
        return None;
    }

    let digits: String = body.chars().filter(char::is_ascii_digit).collect();

    match default_region {
        Some(code) if !body.starts_with('+') => {
            if let Some(rest) = digits.strip_prefix(DEFAULT_EXIT_CODE) {
                return parse_international(rest);
            }
            parse_national(&digits, code)
        }
        Some(_) => None,
        None if body.starts_with('+') => parse_international(&digits),
        None => None,
    }
}

fn parse_national(digits: &str, code: u16) -> Option<PhoneNumber> {
    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with(&code.to_string()) => &digits[1..],
        _ => return None,
    };
    Some(PhoneNumber {
        calling_code: code,
        national: national.to_string(),
    })
}

fn parse_international(digits: &str) -> Option<PhoneNumber> {
    if !(8..=15).contains(&digits.len()) {
        return None;
    }

    for prefix_len in 1..=3 {
        let Ok(code) = digits[..prefix_len].parse::<u16>() else {
            return None;
        };
        if !CALLING_CODES.contains(&code) {
            continue;
        }
        let national = &digits[prefix_len..];
        if code == DEFAULT_CALLING_CODE && national.len() != 10 {
            return None;
        }
        if national.len() < 4 {
            return None;
        }
        return Some(PhoneNumber {
            calling_code: code,
            national: national.to_string(),
        });
    }
    None
}

/// Whole-word address abbreviation expander
///
/// Built once from the configured table; rules apply in the order listed, so
/// an earlier expansion can feed a later one.
#[derive(Debug, Clone)]
pub struct AddressStandardizer {
    rules: Vec<(Regex, String)>,
}

impl AddressStandardizer {
    pub fn new(abbreviations: &[(String, String)]) -> Result<Self> {
        let rules = abbreviations
            .iter()
            .map(|(abbr, full)| {
                let pattern = format!(r"\b{}\b", regex::escape(&abbr.to_lowercase()));
                Regex::new(&pattern)
                    .map(|re| (re, full.to_lowercase()))
                    .map_err(|e| Error::InvalidConfig(format!("abbreviation '{}': {}", abbr, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Lowercase the address and expand every abbreviation
    pub fn standardize(&self, address: &str) -> String {
        let mut standardized = address.to_lowercase();
        for (pattern, full) in &self.rules {
            if pattern.is_match(&standardized) {
                standardized = pattern
                    .replace_all(&standardized, NoExpand(full))
                    .into_owned();
            }
        }
        standardized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idmatch_core::MatchConfig;

    #[test]
    fn test_email_local_part() {
        assert_eq!(extract_email_local_part("john.doe@gmail.com"), "johndoe");
        assert_eq!(extract_email_local_part("JohnDoe123@gmail.com"), "johndoe");
        assert_eq!(extract_email_local_part("j_o-h.n42@x.org"), "john");
        assert_eq!(extract_email_local_part("no-at-sign"), "");
        assert_eq!(extract_email_local_part(""), "");
    }

    #[test]
    fn test_email_local_part_digits_only_trailing() {
        // Only the trailing run is stripped
        assert_eq!(extract_email_local_part("agent007bond@x.com"), "agent007bond");
        assert_eq!(extract_email_local_part("42@x.com"), "");
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("john@gmail.com"), "gmail.com");
        assert_eq!(email_domain("a@b@c"), "b");
        assert_eq!(email_domain("nodomain"), "");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  O'Brien, Pat. "), "obrien pat");
        assert_eq!(normalize_name("John Q. Public"), "john q public");
        assert_eq!(normalize_name("!!!"), "");
    }

    #[test]
    fn test_phone_formats_agree() {
        let expected = ("+15551234567".to_string(), "1".to_string());
        for raw in [
            "555-123-4567",
            "5551234567",
            "(555) 123-4567",
            "555.123.4567",
            "1-555-123-4567",
            "+1 555 123 4567",
            "555-123-4567 x890",
            "555-123-4567 ext. 12",
        ] {
            assert_eq!(normalize_phone(raw), expected, "{}", raw);
        }
    }

    #[test]
    fn test_phone_international() {
        assert_eq!(
            normalize_phone("+44 20 7946 0958"),
            ("+442079460958".to_string(), "44".to_string())
        );
        assert_eq!(
            normalize_phone("011 44 20 7946 0958"),
            ("+442079460958".to_string(), "44".to_string())
        );
    }

    #[test]
    fn test_phone_failure_returns_input() {
        assert_eq!(normalize_phone("call me"), ("call me".to_string(), String::new()));
        assert_eq!(normalize_phone("12345"), ("12345".to_string(), String::new()));
        assert_eq!(normalize_phone(""), (String::new(), String::new()));
    }

    #[test]
    fn test_parse_phone_region_split() {
        // National form needs the default region, `+` form needs none
        assert!(parse_phone("5551234567", None).is_none());
        assert!(parse_phone("+15551234567", Some(1)).is_none());
        assert!(parse_phone("+15551234567", None).is_some());
    }

    #[test]
    fn test_address_standardizer() {
        let config = MatchConfig::default();
        let standardizer = AddressStandardizer::new(&config.address_abbreviations).unwrap();

        assert_eq!(
            standardizer.standardize("123 Main St, Anytown"),
            "123 main street, anytown"
        );
        assert_eq!(
            standardizer.standardize("9 Oak Ave Apt 2"),
            "9 oak avenue apt 2"
        );
        // Whole words only
        assert_eq!(standardizer.standardize("Stanford Rd"), "stanford road");
    }

    #[test]
    fn test_address_standardizer_escapes_patterns() {
        let table = vec![("st.".to_string(), "street".to_string())];
        let standardizer = AddressStandardizer::new(&table).unwrap();
        assert_eq!(standardizer.standardize("1 main stx"), "1 main stx");
    }

    #[test]
    fn test_address_standardizer_applies_rules_in_order() {
        let pairs = |table: &[(&str, &str)]| -> Vec<(String, String)> {
            table
                .iter()
                .map(|(a, f)| (a.to_string(), f.to_string()))
                .collect()
        };

        let chained = AddressStandardizer::new(&pairs(&[("mt", "mount st"), ("st", "street")])).unwrap();
        assert_eq!(chained.standardize("1 Mt Hood"), "1 mount street hood");

        let reversed = AddressStandardizer::new(&pairs(&[("st", "street"), ("mt", "mount st")])).unwrap();
        assert_eq!(reversed.standardize("1 Mt Hood"), "1 mount st hood");
    }
}
