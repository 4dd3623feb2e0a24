//! Identities seen by the impersonation layer.
//!
//! [`AuthenticatedUser`] is what the primary authentication layer reports.
//! [`EffectiveIdentity`] is what the rest of the request acts as once any
//! impersonation credential has been resolved.

use serde::{Deserialize, Serialize};

/// Read-only view of a principal, as provided by the host's authentication.
pub trait UserInfo: Send + Sync {
    /// Whether the principal is a logged-in, named user.
    fn is_recognized(&self) -> bool;

    /// The principal's user name. Empty for anonymous callers.
    fn user_name(&self) -> &str;

    /// Client workstation or address the request came from.
    fn workstation(&self) -> &str;

    /// One-line description for audit logs.
    fn report(&self) -> String {
        if self.workstation().is_empty() {
            self.user_name().to_string()
        } else {
            format!("{}, {}", self.user_name(), self.workstation())
        }
    }
}

/// The identity established by primary authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    user_name: String,
    workstation: String,
    recognized: bool,
}

impl AuthenticatedUser {
    /// A logged-in user.
    pub fn recognized(user_name: impl Into<String>, workstation: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            workstation: workstation.into(),
            recognized: true,
        }
    }

    /// A caller without a login.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl UserInfo for AuthenticatedUser {
    /// A blank user name is never treated as recognized, whatever the
    /// authentication layer claims.
    fn is_recognized(&self) -> bool {
        self.recognized && !self.user_name.trim().is_empty()
    }

    fn user_name(&self) -> &str {
        &self.user_name
    }

    fn workstation(&self) -> &str {
        &self.workstation
    }
}

/// The identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveIdentity {
    /// No impersonation is active.
    Direct(AuthenticatedUser),
    /// `original` is acting as `impersonated`.
    Impersonated {
        original: AuthenticatedUser,
        impersonated: String,
    },
}

impl EffectiveIdentity {
    pub fn is_impersonated(&self) -> bool {
        matches!(self, Self::Impersonated { .. })
    }

    /// Name of the user who actually logged in.
    pub fn original_user_name(&self) -> &str {
        self.original().user_name()
    }

    /// The authenticated identity underneath any impersonation.
    pub fn original(&self) -> &AuthenticatedUser {
        match self {
            Self::Direct(user) => user,
            Self::Impersonated { original, .. } => original,
        }
    }

    /// The impersonated user name, if any.
    pub fn impersonated_user_name(&self) -> Option<&str> {
        match self {
            Self::Direct(_) => None,
            Self::Impersonated { impersonated, .. } => Some(impersonated),
        }
    }
}

impl UserInfo for EffectiveIdentity {
    fn is_recognized(&self) -> bool {
        match self {
            Self::Direct(user) => user.is_recognized(),
            Self::Impersonated { .. } => true,
        }
    }

    fn user_name(&self) -> &str {
        match self {
            Self::Direct(user) => user.user_name(),
            Self::Impersonated { impersonated, .. } => impersonated,
        }
    }

    fn workstation(&self) -> &str {
        self.original().workstation()
    }

    fn report(&self) -> String {
        match self {
            Self::Direct(user) => user.report(),
            Self::Impersonated {
                original,
                impersonated,
            } => format!(
                "{} as {}, {}",
                original.user_name(),
                impersonated,
                original.workstation()
            ),
        }
    }
}
