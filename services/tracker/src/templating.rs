//! services/tracker/src/templating.rs
//!
//! Minimal `{name}` placeholder substitution for response pages and campaign
//! messages.

/// Replaces every `{key}` in `text` with its value. Unknown placeholders are
/// left as they are.
pub fn fill(text: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(text.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}
