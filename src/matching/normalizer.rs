/// Canonical comparable form of a title or product name: lower-cased with
/// every character outside `[a-z0-9]` removed.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}
