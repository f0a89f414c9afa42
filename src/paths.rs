//! Path composition for the space hierarchy.
//!
//! Every place that builds or splits a hierarchical path goes through these
//! functions so that scopes are computed identically everywhere.

use crate::error::{Error, Result};

pub const SEPARATOR: char = '/';

/// Joins a parent path and a child segment. An empty parent yields the child.
#[must_use]
pub fn concatenate(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    format!("{parent}{SEPARATOR}{child}")
}

/// Splits a path into its parent path and leaf segment at the last separator.
pub fn disect_leaf(path: &str) -> Result<(String, String)> {
    if path.is_empty() {
        return Err(Error::Validation("Path cannot be empty".to_string()));
    }

    let (parent, leaf) = path.rsplit_once(SEPARATOR).ok_or_else(|| {
        Error::Validation(format!("Path '{path}' does not have a parent"))
    })?;

    if parent.is_empty() || leaf.is_empty() {
        return Err(Error::Validation(format!("Path '{path}' is malformed")));
    }

    Ok((parent.to_string(), leaf.to_string()))
}

/// Returns the individual segments of a path.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEPARATOR).collect()
}

/// Number of segments in a path; the empty path has depth zero.
#[must_use]
pub fn depth(path: &str) -> usize {
    segments(path).len()
}

/// Lower-cases a client supplied reference and strips surrounding separators,
/// so `/Team-A/proj/` and `team-a/proj` address the same node.
#[must_use]
pub fn normalize_ref(path: &str) -> String {
    path.trim().trim_matches(SEPARATOR).to_lowercase()
}
