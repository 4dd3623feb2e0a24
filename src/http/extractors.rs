use crate::auth::{AuthenticatedUser, EffectiveIdentity};
use crate::error::ImpersonationError;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// The identity this request acts as.
///
/// Requires the [`resolve_identity`](super::resolve_identity) middleware.
///
/// # Example
///
/// ```rust,ignore
/// async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> String {
///     identity.report()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub EffectiveIdentity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ImpersonationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<EffectiveIdentity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| {
                ImpersonationError::internal("Effective identity not found in request extensions")
            })
    }
}

/// The user who actually logged in, ignoring any impersonation.
///
/// Use for audit trails and for operations that must never run as the
/// impersonated user. Falls back to the [`AuthenticatedUser`] extension when
/// [`resolve_identity`](super::resolve_identity) did not run, and to an
/// anonymous user when neither is present.
#[derive(Debug, Clone)]
pub struct OriginalUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for OriginalUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<EffectiveIdentity>() {
            Some(identity) => identity.original().clone(),
            None => parts
                .extensions
                .get::<AuthenticatedUser>()
                .cloned()
                .unwrap_or_else(AuthenticatedUser::anonymous),
        };
        Ok(OriginalUser(user))
    }
}
