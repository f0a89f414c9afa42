use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission represents a bitmask of granted permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const SPACE_VIEW: Permission = Permission(1 << 0); // 1
    pub const SPACE_CREATE: Permission = Permission(1 << 1); // 2
    pub const SPACE_EDIT: Permission = Permission(1 << 2); // 4
    pub const SPACE_DELETE: Permission = Permission(1 << 3); // 8
    pub const REPO_VIEW: Permission = Permission(1 << 4); // 16
    pub const REPO_CREATE: Permission = Permission(1 << 5); // 32
    pub const REPO_PUSH: Permission = Permission(1 << 6); // 64

    const ALL: [(Permission, &'static str); 7] = [
        (Self::SPACE_VIEW, "space:view"),
        (Self::SPACE_CREATE, "space:create"),
        (Self::SPACE_EDIT, "space:edit"),
        (Self::SPACE_DELETE, "space:delete"),
        (Self::REPO_VIEW, "repo:view"),
        (Self::REPO_CREATE, "repo:create"),
        (Self::REPO_PUSH, "repo:push"),
    ];

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if this permission bitmask contains the required permission.
    #[must_use]
    pub const fn has(self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }

    /// Combines two permission bitmasks.
    #[must_use]
    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Removes permissions from this bitmask.
    #[must_use]
    pub const fn difference(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether an anonymous actor can never hold this permission.
    /// Only viewing may be granted to anonymous actors, and only on public nodes.
    #[must_use]
    pub const fn requires_identified(self) -> bool {
        self.difference(Self::SPACE_VIEW.union(Self::REPO_VIEW)).0 != 0
    }

    /// Whether this permission only reads state.
    #[must_use]
    pub const fn is_view(self) -> bool {
        !self.is_empty() && !self.requires_identified()
    }

    /// Expands a permission bitmask to include implied permissions.
    /// Any space mutation implies space:view; repo:create and repo:push imply repo:view.
    /// This should only be used for ALLOW permissions, never for DENY.
    #[must_use]
    pub fn expand_implied(self) -> Permission {
        let mut result = self.0;

        let space_mutations = Self::SPACE_CREATE.0 | Self::SPACE_EDIT.0 | Self::SPACE_DELETE.0;
        if self.0 & space_mutations != 0 {
            result |= Self::SPACE_VIEW.0;
        }

        let repo_mutations = Self::REPO_CREATE.0 | Self::REPO_PUSH.0;
        if self.0 & repo_mutations != 0 {
            result |= Self::REPO_VIEW.0;
        }

        Permission(result)
    }

    /// Converts a permission string to its bitmask value.
    pub fn parse(s: &str) -> Option<Permission> {
        Self::ALL
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(p, _)| *p)
    }

    /// Converts a slice of permission strings to a combined bitmask.
    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<Permission> {
        let mut result = Permission::default();
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    /// Returns a slice of permission strings for this bitmask.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|(p, _)| self.has(*p))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Permission {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Permission> for u32 {
    fn from(p: Permission) -> Self {
        p.0
    }
}

impl From<i64> for Permission {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Permission> for i64 {
    fn from(p: Permission) -> Self {
        p.0 as i64
    }
}
