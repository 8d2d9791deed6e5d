//! Output file-name hygiene.

/// Replace anything outside `[A-Za-z0-9_-]` with `_` so user-supplied
/// countries and cities can safely become file-name components.
pub fn sanitize_file_name(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_and_punctuation_become_underscores() {
        assert_eq!(sanitize_file_name("United Kingdom"), "United_Kingdom");
        assert_eq!(sanitize_file_name("St. John's"), "St__John_s");
    }

    #[test]
    fn safe_characters_pass_through() {
        assert_eq!(sanitize_file_name("Leeds-2024_x"), "Leeds-2024_x");
    }

    #[test]
    fn non_ascii_is_flattened() {
        assert_eq!(sanitize_file_name("Zürich"), "Z_rich");
    }
}
