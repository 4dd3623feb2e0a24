pub mod claims;
pub mod identity;
pub mod permission;
pub mod provider;

pub use claims::{Claim, IMPERSONATE_RESOURCE, StoredClaim};
pub use identity::{AuthenticatedUser, EffectiveIdentity, UserInfo};
pub use permission::{ImpersonatePermit, PermissionValidator};
pub use provider::{AuthorizationProvider, ClaimStore, PermissionLookup, UserDirectory};
