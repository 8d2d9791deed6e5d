//! Country-aware phone extraction and normalization.
//!
//! Each mapped country carries the query prefixes used to bias phone
//! searches (e.g. `("07" OR "+44")`), a regex matching local number formats,
//! and a normalizer producing international `+CC…` form. Unmapped countries
//! fall back to a generic international pattern.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// How a raw match is rewritten into international form.
enum Normalizer {
    /// A leading `0` is replaced by the country code (`07…` → `+447…`).
    LeadingZero(&'static str),
    /// Numbers without a `+` keep their last ten digits behind the country
    /// code (NANP-style and Indian mobiles).
    LastTenDigits(&'static str),
}

struct CountryPhoneConfig {
    prefixes: &'static [&'static str],
    pattern: Regex,
    normalizer: Normalizer,
}

lazy_static! {
    static ref COUNTRY_PHONES: HashMap<&'static str, CountryPhoneConfig> = {
        use Normalizer::*;
        let mut m = HashMap::new();
        m.insert(
            "United Kingdom",
            CountryPhoneConfig {
                prefixes: &["07", "+44"],
                pattern: Regex::new(
                    r"(?:\+44\s?|0)(?:7\d{9}|\d{2,4}[\s.-]?\d{3,4}[\s.-]?\d{3,4})",
                )
                .unwrap(),
                normalizer: LeadingZero("+44"),
            },
        );
        m.insert(
            "United States",
            CountryPhoneConfig {
                prefixes: &["+1", "tel:"],
                pattern: Regex::new(r"(?:\+1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}")
                    .unwrap(),
                normalizer: LastTenDigits("+1"),
            },
        );
        m.insert(
            "Canada",
            CountryPhoneConfig {
                prefixes: &["+1", "tel:"],
                pattern: Regex::new(r"(?:\+1[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}")
                    .unwrap(),
                normalizer: LastTenDigits("+1"),
            },
        );
        m.insert(
            "Australia",
            CountryPhoneConfig {
                prefixes: &["04", "+61"],
                pattern: Regex::new(
                    r"(?:\+61\s?|0)(?:4\d{8}|\d{1,4}[\s.-]?\d{3,4}[\s.-]?\d{3,4})",
                )
                .unwrap(),
                normalizer: LeadingZero("+61"),
            },
        );
        m.insert(
            "Germany",
            CountryPhoneConfig {
                prefixes: &["015", "016", "017", "+49"],
                pattern: Regex::new(r"(?:\+49\s?|0)(?:1[567]\d{7,10}|\d{2,4}[\s.-]?\d{3,8})")
                    .unwrap(),
                normalizer: LeadingZero("+49"),
            },
        );
        m.insert(
            "France",
            CountryPhoneConfig {
                prefixes: &["06", "07", "+33"],
                pattern: Regex::new(r"(?:\+33\s?|0)[67]\d{8}").unwrap(),
                normalizer: LeadingZero("+33"),
            },
        );
        m.insert(
            "India",
            CountryPhoneConfig {
                prefixes: &["+91", "9", "8", "7", "6"],
                pattern: Regex::new(r"(?:\+91[\s.-]?)?[6-9]\d{9}").unwrap(),
                normalizer: LastTenDigits("+91"),
            },
        );
        m.insert(
            "Pakistan",
            CountryPhoneConfig {
                prefixes: &["03", "+92"],
                pattern: Regex::new(r"(?:\+92[\s.-]?|0)3\d{9}").unwrap(),
                normalizer: LeadingZero("+92"),
            },
        );
        m.insert(
            "UAE",
            CountryPhoneConfig {
                prefixes: &["05", "+971"],
                pattern: Regex::new(r"(?:\+971[\s.-]?|0)5\d{8}").unwrap(),
                normalizer: LeadingZero("+971"),
            },
        );
        m.insert(
            "Saudi Arabia",
            CountryPhoneConfig {
                prefixes: &["05", "+966"],
                pattern: Regex::new(r"(?:\+966[\s.-]?|0)5\d{8}").unwrap(),
                normalizer: LeadingZero("+966"),
            },
        );
        m
    };
    static ref GENERIC_PHONE_RE: Regex =
        Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\d{2,4}\)?[\s.-]?\d{3,5}[\s.-]?\d{3,5}").unwrap();
}

/// Build the phone-search disjunction for a country, e.g. `("07" OR "+44")`.
/// Unmapped countries get a generic keyword clause.
pub fn phone_query_term(country: &str) -> String {
    match COUNTRY_PHONES.get(country) {
        Some(cfg) => {
            let quoted: Vec<String> = cfg.prefixes.iter().map(|p| format!("\"{p}\"")).collect();
            format!("({})", quoted.join(" OR "))
        }
        None => "(WhatsApp OR phone OR mobile OR call)".to_string(),
    }
}

/// Extract phone numbers from `text`, normalized for `country`.
///
/// Candidates with fewer than ten digits are discarded. Output is
/// deduplicated with discovery order preserved.
pub fn extract_phones(text: &str, country: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    match COUNTRY_PHONES.get(country) {
        Some(cfg) => {
            for m in cfg.pattern.find_iter(text) {
                let cleaned = normalize(m.as_str(), &cfg.normalizer);
                if digit_count(&cleaned) >= 10 && !out.contains(&cleaned) {
                    out.push(cleaned);
                }
            }
        }
        None => {
            for m in GENERIC_PHONE_RE.find_iter(text) {
                let cleaned = keep_dial_chars(m.as_str());
                if cleaned.len() >= 10 && !out.contains(&cleaned) {
                    out.push(cleaned);
                }
            }
        }
    }
    out
}

fn keep_dial_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn normalize(raw: &str, normalizer: &Normalizer) -> String {
    let dialable = keep_dial_chars(raw);
    match normalizer {
        Normalizer::LeadingZero(cc) => match dialable.strip_prefix('0') {
            Some(rest) => format!("{cc}{rest}"),
            None => dialable,
        },
        Normalizer::LastTenDigits(cc) => {
            if dialable.starts_with('+') {
                dialable
            } else {
                let digits: String = dialable.chars().filter(|c| c.is_ascii_digit()).collect();
                let tail = &digits[digits.len().saturating_sub(10)..];
                format!("{cc}{tail}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uk_mobile_with_leading_zero_is_internationalized() {
        let phones = extract_phones("Call 07911123456 now", "United Kingdom");
        assert_eq!(phones, vec!["+447911123456".to_string()]);
    }

    #[test]
    fn uk_number_already_international_is_kept() {
        let phones = extract_phones("ring +44 7911123456", "United Kingdom");
        assert_eq!(phones, vec!["+447911123456".to_string()]);
    }

    #[test]
    fn us_formatted_number_keeps_last_ten_digits() {
        let phones = extract_phones("office: (555) 123-4567", "United States");
        assert_eq!(phones, vec!["+15551234567".to_string()]);
    }

    #[test]
    fn duplicates_are_collapsed_in_discovery_order() {
        let phones = extract_phones(
            "07911123456 or 07911123456, else 07400111222",
            "United Kingdom",
        );
        assert_eq!(
            phones,
            vec!["+447911123456".to_string(), "+447400111222".to_string()]
        );
    }

    #[test]
    fn short_matches_are_dropped() {
        // 9 digits after cleaning: below the minimum.
        let phones = extract_phones("ext 0123 456 78", "United Kingdom");
        assert!(phones.is_empty());
    }

    #[test]
    fn unmapped_country_uses_generic_pattern() {
        let phones = extract_phones("WhatsApp +62 812 3456 7890 today", "Indonesia");
        assert_eq!(phones, vec!["+6281234567890".to_string()]);
    }

    #[test]
    fn query_term_for_mapped_country() {
        assert_eq!(phone_query_term("United Kingdom"), r#"("07" OR "+44")"#);
        assert_eq!(
            phone_query_term("Germany"),
            r#"("015" OR "016" OR "017" OR "+49")"#
        );
    }

    #[test]
    fn query_term_for_unmapped_country() {
        assert_eq!(
            phone_query_term("Indonesia"),
            "(WhatsApp OR phone OR mobile OR call)"
        );
    }
}
