//! Security claims.
//!
//! A claim is a `(resource, right)` pair. Equality is structural, so two
//! claims built from the same strings are the same claim no matter where
//! they came from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource under which the impersonation rights are registered.
pub const IMPERSONATE_RESOURCE: &str = "Common.Impersonate";

/// A grantable permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Claim {
    pub resource: String,
    pub right: String,
}

impl Claim {
    pub fn new(resource: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            right: right.into(),
        }
    }

    /// Claim required to start impersonating anyone.
    pub fn impersonate() -> Self {
        Self::new(IMPERSONATE_RESOURCE, "Execute")
    }

    /// Claim that lifts the privilege-escalation guard.
    pub fn increase_permissions() -> Self {
        Self::new(IMPERSONATE_RESOURCE, "IncreasePermissions")
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.right)
    }
}

/// A claim as registered in the authorization store.
///
/// Inactive claims are kept for history but never granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredClaim {
    pub claim: Claim,
    pub active: bool,
}

impl StoredClaim {
    pub fn active(claim: Claim) -> Self {
        Self {
            claim,
            active: true,
        }
    }

    pub fn inactive(claim: Claim) -> Self {
        Self {
            claim,
            active: false,
        }
    }
}
