use crate::error::{Error, Result};
use crate::guard::MAX_SPACE_DEPTH;
use crate::paths;
use crate::types::{Repo, Space};

const MAX_PATH_NAME_LEN: usize = 100;
const MAX_PATH_LEN: usize = 256;
const MAX_DISPLAY_NAME_LEN: usize = 256;
const MAX_DESCRIPTION_LEN: usize = 1024;
const MAX_BRANCH_LEN: usize = 255;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.'
}

/// Checks a single path segment. Callers lower-case it first.
pub fn validate_path_name(name: &str, entity: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{entity} path name cannot be empty")));
    }
    if name.len() > MAX_PATH_NAME_LEN {
        return Err(Error::Validation(format!(
            "{entity} path name cannot exceed {MAX_PATH_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(Error::Validation(format!(
            "{entity} path name can only contain lowercase alphanumeric characters, hyphens, underscores, and periods"
        )));
    }
    if name.starts_with(['-', '_', '.']) {
        return Err(Error::Validation(format!(
            "{entity} path name cannot start with a hyphen, underscore, or period"
        )));
    }
    if name.ends_with(".git") {
        return Err(Error::Validation(format!(
            "{entity} path name cannot end with .git"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<()> {
    match description {
        Some(d) if d.len() > MAX_DESCRIPTION_LEN => Err(Error::Validation(format!(
            "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_space(space: &Space) -> Result<()> {
    validate_path_name(&space.path_name, "Space")?;

    if space.name.trim().is_empty() {
        return Err(Error::Validation("Space name cannot be empty".to_string()));
    }
    if space.name.len() > MAX_DISPLAY_NAME_LEN {
        return Err(Error::Validation(format!(
            "Space name cannot exceed {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    validate_description(space.description.as_deref())
}

pub fn validate_repo(repo: &Repo) -> Result<()> {
    validate_path_name(&repo.path_name, "Repository")?;
    validate_description(repo.description.as_deref())?;
    validate_branch_name(&repo.default_branch)
}

/// Checks the composed path of a space (`is_space`) or repository.
pub fn validate_path(path: &str, is_space: bool) -> Result<()> {
    if path.is_empty() {
        return Err(Error::Validation("path cannot be empty".to_string()));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(Error::Validation(format!(
            "path cannot exceed {MAX_PATH_LEN} characters"
        )));
    }
    if paths::segments(path).iter().any(|s| s.is_empty()) {
        return Err(Error::Validation(
            "path cannot contain empty segments".to_string(),
        ));
    }

    let max_depth = if is_space {
        MAX_SPACE_DEPTH
    } else {
        MAX_SPACE_DEPTH + 1
    };
    if paths::depth(path) > max_depth {
        return Err(Error::Validation(format!(
            "spaces cannot be nested deeper than {MAX_SPACE_DEPTH} levels"
        )));
    }

    Ok(())
}

/// Subset of git's ref name rules that matters for a default branch.
pub fn validate_branch_name(branch: &str) -> Result<()> {
    let invalid = branch.is_empty()
        || branch.len() > MAX_BRANCH_LEN
        || branch.starts_with(['/', '-', '.'])
        || branch.ends_with(['/', '.'])
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("//")
        || branch.contains("@{")
        || branch
            .chars()
            .any(|c| c.is_ascii_control() || " ~^:?*[\\".contains(c));

    if invalid {
        return Err(Error::Validation(format!(
            "'{branch}' is not a valid branch name"
        )));
    }
    Ok(())
}
