//! The closed permission set and its containment check.
//!
//! Permissions are a small fixed enumeration known at compile time;
//! membership is a set-containment test, not a policy evaluation.

use std::fmt;

use tracing::warn;

/// A permission grantable to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read access to the catalog.
    CatalogRead,
    /// Write access to the catalog.
    CatalogWrite,
}

impl Permission {
    /// Stable code used as the storage representation.
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::CatalogRead => "catalog:read",
            Self::CatalogWrite => "catalog:write",
        }
    }

    /// Parse a storage code back into a permission.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "catalog:read" => Some(Self::CatalogRead),
            "catalog:write" => Some(Self::CatalogWrite),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// The permissions held by one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    /// An empty set.
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a set from storage codes, discarding codes the enumeration no
    /// longer knows.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let permissions = codes
            .into_iter()
            .filter_map(|code| {
                let code = code.as_ref();
                let parsed = Permission::from_code(code);
                if parsed.is_none() {
                    warn!(code, "discarding unrecognised permission code");
                }
                parsed
            })
            .collect();
        Self(permissions)
    }

    /// Containment test.
    pub fn includes(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
