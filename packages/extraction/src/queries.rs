//! Site-targeted search query construction.
//!
//! Email queries quote the niche to keep results on-topic; phone queries
//! leave it unquoted so the engine can loosen the match, then anchor on the
//! country's dialing prefixes instead.

use crate::emails::EMAIL_TERMS;
use crate::phones::phone_query_term;

/// `site:SITE "NICHE" "CITY" ("@gmail.com" OR …)`
pub fn build_email_query(niche: &str, city: &str, site: &str) -> String {
    let email_clause = format!(
        "({})",
        EMAIL_TERMS
            .iter()
            .map(|term| format!("\"{term}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
    );
    format!("site:{site} \"{niche}\" \"{city}\" {email_clause}")
}

/// `site:SITE NICHE "CITY" ("07" OR "+44")`, niche intentionally unquoted.
pub fn build_phone_query(niche: &str, city: &str, site: &str, country: &str) -> String {
    format!(
        "site:{site} {niche} \"{city}\" {}",
        phone_query_term(country)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_query_quotes_niche_and_city() {
        let q = build_email_query("Fitness Trainer", "London", "instagram.com");
        assert_eq!(
            q,
            r#"site:instagram.com "Fitness Trainer" "London" ("@gmail.com" OR "@hotmail" OR "@outlook.com" OR "email me")"#
        );
    }

    #[test]
    fn phone_query_leaves_niche_unquoted_and_uses_country_prefixes() {
        let q = build_phone_query("Fitness Trainer", "London", "linkedin.com/in", "United Kingdom");
        assert_eq!(
            q,
            r#"site:linkedin.com/in Fitness Trainer "London" ("07" OR "+44")"#
        );
    }

    #[test]
    fn phone_query_falls_back_to_generic_terms() {
        let q = build_phone_query("Barber", "Jakarta", "facebook.com", "Indonesia");
        assert!(q.ends_with("(WhatsApp OR phone OR mobile OR call)"));
        assert!(q.starts_with("site:facebook.com Barber \"Jakarta\""));
    }
}
