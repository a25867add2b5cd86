//! Keyword and handler name helpers.

/// Lookup key for keyword names: case, spaces and underscores are ignored.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Turn an identifier such as `open_connection` into `Open Connection`.
pub fn display_name(identifier: &str) -> String {
    identifier
        .split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Error kind reported by a handler, e.g. `connection` -> `ConnectionError`.
pub fn error_kind(identifier: &str) -> String {
    let mut kind: String = identifier
        .split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();
    kind.push_str("Error");
    kind
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
