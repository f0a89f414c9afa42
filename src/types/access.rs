use std::fmt;

use serde::{Deserialize, Serialize};

use super::Principal;
use crate::error::{Error, Result};

/// The acting party of a request or a push.
#[derive(Debug, Clone)]
pub enum Actor {
    Identified(Principal),
    Anonymous,
}

impl Actor {
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Actor::Identified(p) => Some(p),
            Actor::Anonymous => None,
        }
    }

    /// Returns the principal or `AuthenticationRequired`.
    pub fn require(&self) -> Result<&Principal> {
        self.principal().ok_or(Error::AuthenticationRequired)
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Actor::Anonymous)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Identified(p) => write!(f, "{}", p.uid),
            Actor::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// The hierarchical path at which an authorization check applies.
/// An empty path is the root of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub space_path: String,
}

impl Scope {
    #[must_use]
    pub fn new(space_path: impl Into<String>) -> Self {
        Self {
            space_path: space_path.into(),
        }
    }

    #[must_use]
    pub fn root() -> Self {
        Self::new("")
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.space_path.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Space,
    Repo,
}

/// What kind of object a permission is checked against. An empty name refers
/// to the scope node itself, or to a child about to be created under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub name: String,
}

impl Resource {
    #[must_use]
    pub fn space() -> Self {
        Self {
            resource_type: ResourceType::Space,
            name: String::new(),
        }
    }

    #[must_use]
    pub fn repo(name: impl Into<String>) -> Self {
        Self {
            resource_type: ResourceType::Repo,
            name: name.into(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.resource_type {
            ResourceType::Space => "space",
            ResourceType::Repo => "repo",
        };
        if self.name.is_empty() {
            write!(f, "{kind}")
        } else {
            write!(f, "{kind}:{}", self.name)
        }
    }
}
