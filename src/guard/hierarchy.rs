//! Resolution of spaces and repositories into their position in the hierarchy.
//!
//! Absent entities surface as `Error::NotFound`, store failures as
//! `Error::BackendUnavailable`, and broken parent chains as
//! `Error::CorruptHierarchy`.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::paths;
use crate::store::Store;
use crate::types::{Repo, Scope, Space};

/// Maximum number of segments in a space path. Any parent chain longer than
/// this is corrupt.
pub const MAX_SPACE_DEPTH: usize = 9;

/// Read access to the entities the hierarchy is built from.
pub trait EntityLookup: Send + Sync {
    fn find_space(&self, id: i64) -> Result<Option<Space>>;
    fn find_space_by_path(&self, path: &str) -> Result<Option<Space>>;
    fn find_repo(&self, id: i64) -> Result<Option<Repo>>;
    fn find_repo_by_path(&self, path: &str) -> Result<Option<Repo>>;
}

impl<S: Store + ?Sized> EntityLookup for S {
    fn find_space(&self, id: i64) -> Result<Option<Space>> {
        self.get_space(id)
    }

    fn find_space_by_path(&self, path: &str) -> Result<Option<Space>> {
        self.get_space_by_path(path)
    }

    fn find_repo(&self, id: i64) -> Result<Option<Repo>> {
        self.get_repo(id)
    }

    fn find_repo_by_path(&self, path: &str) -> Result<Option<Repo>> {
        self.get_repo_by_path(path)
    }
}

pub struct Hierarchy<'a, L: ?Sized> {
    lookup: &'a L,
}

impl<'a, L: EntityLookup + ?Sized> Hierarchy<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    pub fn space(&self, id: i64) -> Result<Space> {
        self.lookup
            .find_space(id)
            .map_err(Error::into_backend)?
            .ok_or(Error::NotFound("space"))
    }

    pub fn space_by_path(&self, path: &str) -> Result<Space> {
        self.lookup
            .find_space_by_path(path)
            .map_err(Error::into_backend)?
            .ok_or(Error::NotFound("space"))
    }

    pub fn repo(&self, id: i64) -> Result<Repo> {
        self.lookup
            .find_repo(id)
            .map_err(Error::into_backend)?
            .ok_or(Error::NotFound("repository"))
    }

    pub fn repo_by_path(&self, path: &str) -> Result<Repo> {
        self.lookup
            .find_repo_by_path(path)
            .map_err(Error::into_backend)?
            .ok_or(Error::NotFound("repository"))
    }

    /// Fetches the parent of a node about to be created and returns the scope
    /// a create check runs against. The scope comes from the stored path.
    pub fn parent_scope(&self, parent_id: i64) -> Result<(Space, Scope)> {
        let parent = self.space(parent_id)?;
        let scope = Scope::new(parent.path.clone());
        Ok((parent, scope))
    }

    /// Resolves a repository together with the scope of the space that owns it.
    pub fn repo_scope(&self, repo_id: i64) -> Result<(Repo, Scope)> {
        let repo = self.repo(repo_id)?;
        let scope = self.owning_scope(&repo)?;
        Ok((repo, scope))
    }

    /// Scope of the space owning `repo`, verified against the stored paths.
    pub fn owning_scope(&self, repo: &Repo) -> Result<Scope> {
        let space = match self.space(repo.space_id) {
            Err(Error::NotFound(_)) => {
                return Err(Error::CorruptHierarchy(format!(
                    "repository {} references missing space {}",
                    repo.id, repo.space_id
                )));
            }
            other => other?,
        };

        if repo.path != paths::concatenate(&space.path, &repo.path_name) {
            return Err(Error::CorruptHierarchy(format!(
                "repository {} path does not match its space",
                repo.id
            )));
        }

        Ok(Scope::new(space.path))
    }

    /// Returns `space` followed by all of its ancestors up to the root.
    pub fn ancestors(&self, space: Space) -> Result<Vec<Space>> {
        let mut seen = HashSet::from([space.id]);
        let mut chain = vec![space];

        loop {
            let current = &chain[chain.len() - 1];
            let Some(parent_id) = current.parent_id else {
                break;
            };

            if chain.len() >= MAX_SPACE_DEPTH {
                return Err(Error::CorruptHierarchy(format!(
                    "space {} is nested deeper than {MAX_SPACE_DEPTH} levels",
                    chain[0].id
                )));
            }

            if !seen.insert(parent_id) {
                return Err(Error::CorruptHierarchy(format!(
                    "cycle through space {parent_id}"
                )));
            }

            let parent = match self.space(parent_id) {
                Err(Error::NotFound(_)) => {
                    return Err(Error::CorruptHierarchy(format!(
                        "space {} references missing parent {parent_id}",
                        current.id
                    )));
                }
                other => other?,
            };

            if current.path != paths::concatenate(&parent.path, &current.path_name) {
                return Err(Error::CorruptHierarchy(format!(
                    "space {} path does not extend its parent",
                    current.id
                )));
            }

            chain.push(parent);
        }

        let root = &chain[chain.len() - 1];
        if root.path != root.path_name {
            return Err(Error::CorruptHierarchy(format!(
                "root space {} has a nested path",
                root.id
            )));
        }

        Ok(chain)
    }
}
