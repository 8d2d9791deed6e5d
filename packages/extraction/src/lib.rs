//! Contact extraction and search-query building.
//!
//! Pure functions shared by the scrape pipeline: pulling emails and phone
//! numbers out of result text, normalizing phones to international form per
//! country, expanding niche keywords into search variants, and composing the
//! site-targeted queries themselves.

pub mod emails;
pub mod files;
pub mod niches;
pub mod phones;
pub mod queries;

pub use emails::{extract_email, EMAIL_TERMS};
pub use files::sanitize_file_name;
pub use niches::expand_niches;
pub use phones::{extract_phones, phone_query_term};
pub use queries::{build_email_query, build_phone_query};
