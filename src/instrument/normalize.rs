//! Query text normalization for log output.

/// Collapse every whitespace run to a single space and trim both ends.
pub fn clean_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
