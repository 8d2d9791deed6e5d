//! Email extraction from free-form result text.

use lazy_static::lazy_static;
use regex::Regex;

/// Terms OR-ed into email search queries to bias results toward pages that
/// actually expose an address.
pub const EMAIL_TERMS: &[&str] = &["@gmail.com", "@hotmail", "@outlook.com", "email me"];

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"[a-zA-Z0-9._-]+@[a-zA-Z0-9._-]+\.[a-zA-Z0-9_-]+").unwrap();
}

/// Return the first email-shaped token in `text`, if any.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}
