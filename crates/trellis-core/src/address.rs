//! Address paths
//!
//! An address is a `/`-separated path of identifiers from the tree root to an
//! element. The root's address is `/`; a child's address appends its
//! identifier to its parent's. Identifiers are non-empty and never contain
//! the separator.

/// Path separator within element addresses
pub const SEPARATOR: char = '/';

/// The root element's address
pub const ROOT: &str = "/";

/// Join a parent address and a child identifier into the child's address
pub fn join(parent: &str, identifier: &str) -> String {
    if parent.is_empty() || parent == ROOT {
        format!("/{}", identifier)
    } else if parent.ends_with(SEPARATOR) {
        format!("{}{}", parent, identifier)
    } else {
        format!("{}/{}", parent, identifier)
    }
}

/// Iterate the identifier segments of an address, skipping empty segments
pub fn segments(address: &str) -> impl Iterator<Item = &str> {
    address.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Split an address into its first segment and the remaining path
///
/// The remainder carries no leading separator and may be empty. Returns
/// `None` when the address has no segments at all.
pub fn split_first(address: &str) -> Option<(&str, &str)> {
    let trimmed = address.trim_start_matches(SEPARATOR);
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(SEPARATOR) {
        Some((first, rest)) => Some((first, rest.trim_start_matches(SEPARATOR))),
        None => Some((trimmed, "")),
    }
}

/// Would this string be accepted as an element identifier?
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty() && !identifier.contains(SEPARATOR)
}
