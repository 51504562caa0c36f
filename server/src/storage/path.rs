//! Mapping between slash-delimited namespaced keys and the backend's
//! (partition, sort) record coordinates.

/// Sentinel stored in place of an empty partition value; the backend
/// forbids empty strings.
pub const EMPTY_PATH: &str = " ";

/// Records whose sort key starts with this prefix are reserved for
/// coordination use and are filtered out of listings.
pub const LOCK_PREFIX: &str = "_";

/// All parent "folders" for a namespaced key, shortest first.
/// e.g. for `foo/bar/baz` it returns `["foo", "foo/bar"]`.
pub fn prefixes(key: &str) -> Vec<String> {
    let components: Vec<&str> = key.split('/').collect();
    (1..components.len())
        .map(|i| components[..i].join("/"))
        .collect()
}

/// The partition value for a namespaced key: everything but the last
/// component, or the empty-path sentinel for single-segment keys.
pub fn path_without_key(key: &str) -> String {
    match key.rfind('/') {
        Some(i) => key[..i].to_string(),
        None => EMPTY_PATH.to_string(),
    }
}

/// The sort value for a namespaced key: its last component.
pub fn base_key(key: &str) -> String {
    match key.rfind('/') {
        Some(i) => key[i + 1..].to_string(),
        None => key.to_string(),
    }
}

/// Rebuilds the namespaced key for a stored record, the inverse of
/// `path_without_key` + `base_key`.
pub fn concat(path: &str, key: &str) -> String {
    let unescaped = unescape_empty_path(path);
    if unescaped.is_empty() {
        key.to_string()
    } else {
        format!("{unescaped}/{key}")
    }
}

pub fn escape_empty_path(s: &str) -> String {
    if s.is_empty() {
        EMPTY_PATH.to_string()
    } else {
        s.to_string()
    }
}

pub fn unescape_empty_path(s: &str) -> String {
    if s == EMPTY_PATH {
        String::new()
    } else {
        s.to_string()
    }
}
