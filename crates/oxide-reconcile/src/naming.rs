//! Reserved naming conventions.
//!
//! Objects in flight between two names live under the staging prefix.
//! Objects waiting to be removed live under the drop marker, which is
//! itself inside the staging namespace. Declared names never start with
//! the staging prefix, and never with the drop marker's tail either: a
//! declared `drop_x` would be staged as `_sql_drop_x` and read back as
//! marked for removal.

/// Prefix of objects being renamed or freshly created.
pub const STAGING_PREFIX: &str = "_sql_";

/// Prefix of objects pending removal.
pub const DROP_MARKER: &str = "_sql_drop_";

/// Placeholder column every new table is created with.
pub const PLACEHOLDER_COLUMN: &str = STAGING_PREFIX;

/// Characters no declared value may contain.
pub const FORBIDDEN_CHARS: [char; 2] = ['`', '\''];

/// The staging name of `name`.
#[must_use]
pub fn staged(name: &str) -> String {
    format!("{STAGING_PREFIX}{name}")
}

/// Whether `name`, or its staging name, falls in a reserved namespace.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered.starts_with(STAGING_PREFIX) || staged(&lowered).starts_with(DROP_MARKER)
}

/// Whether `value` is free of quoting characters.
#[must_use]
pub fn is_sanitized(value: &str) -> bool {
    !value.contains(FORBIDDEN_CHARS)
}
