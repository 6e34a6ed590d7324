//! Branch name validation following git-style conventions.
//!
//! Valid branch names:
//! - Must be non-empty
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `/`, and must not end with `.`
//! - Must not end with `.lock`
//! - Components between slashes must be non-empty and not start with `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Namespace holding branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Validate a branch name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use gvcs_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/schema").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(RefError::InvalidBranchName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("branch name must not be empty".into());
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    if name.contains("..") {
        return reject("must not contain '..'".into());
    }
    if name.contains("@{") {
        return reject("must not contain '@{'".into());
    }
    if name.ends_with('.') {
        return reject("must not end with '.'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return reject("must not start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return reject("must not end with '.lock'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return reject(format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}

/// Canonical ref name of a branch: `refs/heads/<name>`.
pub fn branch_ref(name: &str) -> String {
    format!("{HEADS_PREFIX}{name}")
}

/// Branch name of a canonical `refs/heads/` ref.
pub fn branch_name(canonical: &str) -> Option<&str> {
    canonical.strip_prefix(HEADS_PREFIX)
}
