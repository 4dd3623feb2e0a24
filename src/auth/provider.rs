use crate::auth::claims::{Claim, StoredClaim};
use crate::auth::identity::UserInfo;
use crate::error::Result;
use async_trait::async_trait;

/// Answers whether a caller holds a claim.
///
/// Backed by the host's authorization engine; the impersonation layer only
/// asks about [`Claim::impersonate`] and [`Claim::increase_permissions`].
#[async_trait]
pub trait PermissionLookup: Send + Sync {
    async fn has_claim(&self, caller: &dyn UserInfo, claim: &Claim) -> Result<bool>;
}

/// Resolves which of a list of claims a user is granted.
///
/// # Example
///
/// ```rust,ignore
/// #[async_trait]
/// impl AuthorizationProvider for RoleStore {
///     async fn resolve(&self, user: &dyn UserInfo, claims: &[Claim]) -> Result<Vec<Claim>> {
///         let granted = self.granted_for(user.user_name()).await?;
///         Ok(claims.iter().filter(|c| granted.contains(c)).cloned().collect())
///     }
/// }
/// ```
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Returns the subset of `claims` granted to `user`, in input order.
    async fn resolve(&self, user: &dyn UserInfo, claims: &[Claim]) -> Result<Vec<Claim>>;
}

/// Principal lookup by user name.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_name: &str) -> Result<bool>;
}

/// Registered claims, active or not.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn all_claims(&self) -> Result<Vec<StoredClaim>>;
}
