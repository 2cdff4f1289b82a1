//! Validation of names that end up as file names on disk.
//!
//! Media names and account names are both used verbatim as file names inside
//! the data directory, so anything that could escape that directory or
//! collide with temporary files is rejected.

const MAX_NAME_LEN: usize = 255;

/// Returns true if `name` can be used as a single path component.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.trim() == name
}
