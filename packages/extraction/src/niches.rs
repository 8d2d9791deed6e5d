//! Niche keyword expansion.
//!
//! A submitted niche like "Fitness Trainer" fans out into related search
//! variants so one job covers the adjacent phrasings people actually use in
//! their profiles.

use lazy_static::lazy_static;
use regex::Regex;

/// Token-keyed synonym table. A niche containing the token (case-insensitive
/// substring) contributes every listed variant.
const NICHE_EXPANSIONS: &[(&str, &[&str])] = &[
    (
        "fitness",
        &[
            "Fitness Coach",
            "Gym Instructor",
            "Personal Trainer",
            "Yoga Instructor",
            "Pilates Teacher",
        ],
    ),
    ("trainer", &["Coach", "Instructor", "Consultant", "Mentor"]),
    ("yoga", &["Yoga Coach", "Yoga Therapist", "Yoga Teacher"]),
    ("pilates", &["Pilates Coach", "Pilates Instructor"]),
];

lazy_static! {
    static ref TRAINER_RE: Regex = Regex::new(r"(?i)trainer").unwrap();
}

/// Expand base niches into the deduplicated variant list.
///
/// Keeps each trimmed base niche verbatim, adds table variants for every
/// matching token, and for niches containing "trainer" also adds the
/// mechanical Coach/Instructor substitutions. Order follows discovery.
pub fn expand_niches(base: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();

    for niche in base {
        let trimmed = niche.trim();
        if trimmed.is_empty() {
            continue;
        }
        push_unique(&mut expanded, trimmed.to_string());

        let lower = trimmed.to_lowercase();
        for (token, variants) in NICHE_EXPANSIONS {
            if lower.contains(token) {
                for variant in *variants {
                    push_unique(&mut expanded, variant.to_string());
                }
            }
        }

        if lower.contains("trainer") {
            push_unique(&mut expanded, TRAINER_RE.replace(trimmed, "Coach").into_owned());
            push_unique(
                &mut expanded,
                TRAINER_RE.replace(trimmed, "Instructor").into_owned(),
            );
        }
    }

    expanded
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}
