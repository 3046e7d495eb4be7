//! Term normalization shared by every extractor and the aggregator.

/// Normalize a keyword so that casing and spacing variants merge into one key.
///
/// Lowercases, drops control characters, trims, and collapses internal
/// whitespace runs to a single ASCII space. Applying it twice yields the same
/// string as applying it once.
pub fn normalize_term(term: &str) -> String {
    let mut normalized = String::with_capacity(term.len());
    let mut pending_space = false;

    for ch in term.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            pending_space = !normalized.is_empty();
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space {
            normalized.push(' ');
            pending_space = false;
        }
        normalized.push(ch);
    }

    normalized
}
