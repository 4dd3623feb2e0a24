use crate::auth::claims::{Claim, StoredClaim};
use crate::auth::identity::UserInfo;
use crate::auth::permission::PermissionValidator;
use crate::auth::provider::{AuthorizationProvider, ClaimStore, PermissionLookup, UserDirectory};
use crate::error::{ImpersonationError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory users, claims, and grants.
///
/// Implements every collaborator [`PermissionValidator`] needs. Grants are
/// keyed by user name; unrecognized principals are granted nothing.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashSet<String>>,
    grants: RwLock<HashMap<String, HashSet<Claim>>>,
    claims: RwLock<Vec<StoredClaim>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator backed entirely by this directory.
    pub fn validator(this: &Arc<Self>) -> PermissionValidator {
        PermissionValidator::new(this.clone(), this.clone(), this.clone(), this.clone())
    }

    pub fn add_user(&self, user_name: &str) {
        self.users.write().unwrap().insert(user_name.to_string());
    }

    pub fn register_claim(&self, claim: StoredClaim) {
        self.claims.write().unwrap().push(claim);
    }

    pub fn grant(&self, user_name: &str, claim: Claim) {
        self.grants
            .write()
            .unwrap()
            .entry(user_name.to_string())
            .or_default()
            .insert(claim);
    }

    /// Number of [`UserDirectory::exists`] calls so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make every lookup fail with an internal error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ImpersonationError::internal("directory unavailable"));
        }
        Ok(())
    }

    fn is_granted(&self, user: &dyn UserInfo, claim: &Claim) -> bool {
        user.is_recognized()
            && self
                .grants
                .read()
                .unwrap()
                .get(user.user_name())
                .is_some_and(|granted| granted.contains(claim))
    }
}

#[async_trait]
impl PermissionLookup for InMemoryDirectory {
    async fn has_claim(&self, caller: &dyn UserInfo, claim: &Claim) -> Result<bool> {
        self.check_available()?;
        Ok(self.is_granted(caller, claim))
    }
}

#[async_trait]
impl AuthorizationProvider for InMemoryDirectory {
    async fn resolve(&self, user: &dyn UserInfo, claims: &[Claim]) -> Result<Vec<Claim>> {
        self.check_available()?;
        Ok(claims
            .iter()
            .filter(|claim| self.is_granted(user, claim))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn exists(&self, user_name: &str) -> Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.users.read().unwrap().contains(user_name))
    }
}

#[async_trait]
impl ClaimStore for InMemoryDirectory {
    async fn all_claims(&self) -> Result<Vec<StoredClaim>> {
        self.check_available()?;
        Ok(self.claims.read().unwrap().clone())
    }
}
