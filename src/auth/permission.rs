//! Authorization checks for starting an impersonation.
//!
//! Two questions are asked, in a fixed order:
//!
//! 1. May the caller impersonate at all? ([`Claim::impersonate`])
//! 2. May the caller impersonate *this* user? The target must exist, and
//!    unless the caller holds [`Claim::increase_permissions`], every active
//!    claim granted to the target must also be granted to the caller.
//!
//! The second question can only be asked with the [`ImpersonatePermit`]
//! returned by the first. Callers that lack the impersonate claim never
//! learn whether a target user exists.

use crate::auth::claims::Claim;
use crate::auth::identity::{AuthenticatedUser, UserInfo};
use crate::auth::provider::{AuthorizationProvider, ClaimStore, PermissionLookup, UserDirectory};
use crate::error::{ImpersonationError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Proof that the caller holds the impersonate claim.
///
/// Only [`PermissionValidator::authorize_initiator`] creates one.
pub struct ImpersonatePermit<'a> {
    caller: &'a dyn UserInfo,
}

/// Decides whether an impersonation may start.
///
/// Holds no state besides its collaborators; every check goes to the
/// providers again.
#[derive(Clone)]
pub struct PermissionValidator {
    permissions: Arc<dyn PermissionLookup>,
    authorization: Arc<dyn AuthorizationProvider>,
    directory: Arc<dyn UserDirectory>,
    claims: Arc<dyn ClaimStore>,
}

impl PermissionValidator {
    pub fn new(
        permissions: Arc<dyn PermissionLookup>,
        authorization: Arc<dyn AuthorizationProvider>,
        directory: Arc<dyn UserDirectory>,
        claims: Arc<dyn ClaimStore>,
    ) -> Self {
        Self {
            permissions,
            authorization,
            directory,
            claims,
        }
    }

    /// Whether `caller` holds the impersonate claim.
    pub async fn can_initiate(&self, caller: &dyn UserInfo) -> Result<bool> {
        self.permissions
            .has_claim(caller, &Claim::impersonate())
            .await
    }

    /// Check the impersonate claim and hand out a permit for target checks.
    ///
    /// # Errors
    ///
    /// `Forbidden` naming the missing claim when the caller lacks it.
    pub async fn authorize_initiator<'a>(
        &self,
        caller: &'a dyn UserInfo,
    ) -> Result<ImpersonatePermit<'a>> {
        if !self.can_initiate(caller).await? {
            let claim = Claim::impersonate();
            tracing::info!(
                target: "impersonation.rejected",
                caller = %caller.user_name(),
                claim = %claim,
                reason = "missing_claim",
                "Impersonation rejected: caller lacks the impersonate claim"
            );
            return Err(ImpersonationError::forbidden(format!(
                "You are not authorized for action '{}' on resource '{}', user '{}'.",
                claim.right,
                claim.resource,
                report_user_name_or_anonymous(caller)
            )));
        }

        Ok(ImpersonatePermit { caller })
    }

    /// Check that the permitted caller may impersonate `target_user_name`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the target is not registered, `Forbidden` when the
    /// target holds claims the caller does not (and the caller lacks the
    /// override claim).
    pub async fn validate_target(
        &self,
        permit: &ImpersonatePermit<'_>,
        target_user_name: &str,
    ) -> Result<()> {
        let caller = permit.caller;

        if !self.directory.exists(target_user_name).await? {
            tracing::info!(
                target: "impersonation.rejected",
                caller = %caller.user_name(),
                target_user = %target_user_name,
                reason = "user_not_found",
                "Impersonation rejected: target user not registered"
            );
            return Err(ImpersonationError::not_found(format!(
                "User '{}' is not registered.",
                target_user_name
            )));
        }

        let increase_permissions = Claim::increase_permissions();
        if self
            .permissions
            .has_claim(caller, &increase_permissions)
            .await?
        {
            return Ok(());
        }

        let surplus = self.surplus_claims(caller, target_user_name).await?;
        if let Some(example) = surplus.first() {
            tracing::info!(
                target: "impersonation.rejected",
                caller = %caller.user_name(),
                target_user = %target_user_name,
                surplus_count = surplus.len(),
                example_claim = %example,
                reason = "privilege_escalation",
                "User '{}' is not allowed to impersonate '{}' because the impersonated user has {} more security claims (for example '{}'). Increase the user's permissions or add '{}' security claim.",
                caller.user_name(),
                target_user_name,
                surplus.len(),
                example,
                increase_permissions
            );
            return Err(ImpersonationError::forbidden(format!(
                "You are not allowed to impersonate user '{}'.",
                target_user_name
            )));
        }

        Ok(())
    }

    /// Full check: impersonate claim first, then the target.
    pub async fn validate(&self, caller: &dyn UserInfo, target_user_name: &str) -> Result<()> {
        let permit = self.authorize_initiator(caller).await?;
        self.validate_target(&permit, target_user_name).await
    }

    /// Active claims granted to the target but not to the caller.
    ///
    /// The target is evaluated as a recognized user on the caller's
    /// workstation. The caller is only asked about the target's grants.
    pub async fn surplus_claims(
        &self,
        caller: &dyn UserInfo,
        target_user_name: &str,
    ) -> Result<Vec<Claim>> {
        let active: Vec<Claim> = self
            .claims
            .all_claims()
            .await?
            .into_iter()
            .filter(|stored| stored.active)
            .map(|stored| stored.claim)
            .collect();
        let active_set: HashSet<&Claim> = active.iter().collect();

        let target = AuthenticatedUser::recognized(target_user_name, caller.workstation());
        let mut target_granted: Vec<Claim> = self
            .authorization
            .resolve(&target, &active)
            .await?
            .into_iter()
            .filter(|claim| active_set.contains(claim))
            .collect();
        target_granted.dedup();

        let caller_granted: HashSet<Claim> = self
            .authorization
            .resolve(caller, &target_granted)
            .await?
            .into_iter()
            .collect();

        Ok(target_granted
            .into_iter()
            .filter(|claim| !caller_granted.contains(claim))
            .collect())
    }
}

fn report_user_name_or_anonymous(user: &dyn UserInfo) -> String {
    if user.is_recognized() {
        user.user_name().to_string()
    } else {
        "<anonymous>".to_string()
    }
}
