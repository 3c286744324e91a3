//! Node identity derivation
//!
//! Shared vocabulary nodes (skills, technologies, tasks, ...) are keyed by a
//! slug of their display name, so the same name always lands on the same node.

/// Maximum number of characters of a task statement that feed its slug.
///
/// Two statements sharing the same first 100 characters collide on one Task node.
pub const TASK_KEY_MAX_CHARS: usize = 100;

/// Derive a URL-safe identifier from a human-readable name.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single hyphen and drops hyphens at either end. Returns an empty string
/// when the name has no ASCII alphanumerics at all.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// Identifier for a Task node: the statement is cut to
/// [`TASK_KEY_MAX_CHARS`] characters before slugging.
pub fn task_slug(statement: &str) -> String {
    let truncated: String = statement.chars().take(TASK_KEY_MAX_CHARS).collect();
    slug(&truncated)
}

/// Identifier for the `sequence`-th DescriptionLine of a job experience.
pub fn description_line_id(experience_id: &str, sequence: u32) -> String {
    format!("{}-{}", experience_id, sequence)
}
