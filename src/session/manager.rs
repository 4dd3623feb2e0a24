//! Impersonation session state machine.
//!
//! ```text
//! NoSession --start(ok)--> Active
//! Active --decrypt fail / logged out / other login--> NoSession   (cookie cleared)
//! Active --expired--> NoSession                                   (cookie left alone)
//! Active --stop--> NoSession                                      (cookie cleared)
//! NoSession --stop--> NoSession                                   (cookie cleared)
//! ```
//!
//! The manager never writes cookies itself. Every operation returns the
//! [`CookieUpdate`] the transport should apply, so a request that fails
//! half-way has persisted nothing.

use crate::auth::identity::{AuthenticatedUser, EffectiveIdentity, UserInfo};
use crate::auth::permission::PermissionValidator;
use crate::error::{ImpersonationError, Result};
use crate::session::ImpersonationConfig;
use crate::session::cipher::{DecryptionError, PrivateCookieCipher};
use crate::session::clock::{Clock, SystemClock};
use crate::session::codec::CredentialCodec;
use crate::session::credential::ImpersonationCredential;
use std::fmt;
use std::sync::Arc;

/// Side effect on the client's impersonation cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieUpdate {
    /// Store this sealed credential.
    Set(String),
    /// Expire the cookie.
    Clear,
}

/// Why a decodable credential was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The user who started the impersonation has logged out.
    OriginalUserNotAuthenticated,
    /// A different user is logged in than the one who started it.
    AuthenticationContextChanged { initial: String, current: String },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OriginalUserNotAuthenticated => {
                write!(f, "the original user is no longer authenticated")
            }
            Self::AuthenticationContextChanged { initial, current } => write!(
                f,
                "the current authentication context ({}) does not match the initial one ({})",
                current, initial
            ),
        }
    }
}

/// Outcome of reading the incoming credential.
///
/// `Invalid` is reported for diagnostics only; the request proceeds exactly
/// as it would with `NoSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active(ImpersonationCredential),
    Invalid(InvalidReason),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Result of the per-request read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: EffectiveIdentity,
    pub state: SessionState,
    pub cookie: Option<CookieUpdate>,
}

enum Inspection {
    Absent,
    Corrupt(DecryptionError),
    Invalid(InvalidReason),
    Expired(ImpersonationCredential),
    Valid(ImpersonationCredential),
}

/// Issues, validates, renews, and ends impersonation sessions.
///
/// Stateless between requests: everything it knows comes from the
/// incoming token, the authenticated user, and its collaborators.
#[derive(Clone)]
pub struct SessionManager {
    codec: CredentialCodec,
    validator: PermissionValidator,
    clock: Arc<dyn Clock>,
    config: ImpersonationConfig,
}

impl SessionManager {
    pub fn new(
        codec: CredentialCodec,
        validator: PermissionValidator,
        clock: Arc<dyn Clock>,
        config: ImpersonationConfig,
    ) -> Self {
        Self {
            codec,
            validator,
            clock,
            config,
        }
    }

    /// Production wiring: key from `config`, wall-clock time.
    ///
    /// # Errors
    ///
    /// Fails when `config` is out of range or no usable encryption key is
    /// configured.
    pub fn from_config(config: ImpersonationConfig, validator: PermissionValidator) -> Result<Self> {
        config.validate()?;
        let cipher = PrivateCookieCipher::from_config(&config)?;
        Ok(Self::new(
            CredentialCodec::new(Arc::new(cipher)),
            validator,
            Arc::new(SystemClock),
            config,
        ))
    }

    #[must_use]
    pub fn config(&self) -> &ImpersonationConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Start impersonating `target_user_name`.
    ///
    /// `caller` is the caller's current effective identity. The issued
    /// credential always names the originally authenticated user.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for a blank target name
    /// - `Unauthorized` when the caller is not logged in (see
    ///   [`ImpersonationError::clears_session`])
    /// - `Conflict` when already impersonating and nesting is disabled
    /// - `Forbidden` / `NotFound` from [`PermissionValidator`]
    pub async fn start(
        &self,
        caller: &EffectiveIdentity,
        target_user_name: &str,
    ) -> Result<CookieUpdate> {
        if target_user_name.trim().is_empty() {
            return Err(ImpersonationError::bad_request(
                "Impersonated user name must be non-empty string.",
            ));
        }

        if !caller.is_recognized() {
            tracing::info!(
                target: "impersonation.rejected",
                target_user = %target_user_name,
                reason = "not_authenticated",
                "Impersonation rejected: caller is not authenticated"
            );
            return Err(ImpersonationError::unauthorized(
                "You are not authorized for impersonation. Please log in first.",
            ));
        }

        if caller.is_impersonated() && !self.config.allow_nested_impersonation {
            tracing::info!(
                target: "impersonation.rejected",
                caller = %caller.report(),
                target_user = %target_user_name,
                reason = "already_impersonating",
                "Impersonation rejected: impersonation already active"
            );
            return Err(ImpersonationError::conflict(
                "Can't impersonate, impersonation already active.",
            ));
        }

        self.validator.validate(caller, target_user_name).await?;

        let authenticated = caller.original_user_name();
        tracing::trace!(
            target: "impersonation.started",
            "Impersonate: {} as {}",
            authenticated,
            target_user_name
        );

        let credential = ImpersonationCredential::new(
            authenticated,
            target_user_name,
            self.clock.now() + self.config.cookie_duration(),
        );
        let token = self.codec.encrypt(&credential)?;

        tracing::info!(
            target: "impersonation.started",
            authenticated = %authenticated,
            impersonated = %target_user_name,
            expires = %credential.expires,
            "Impersonation started"
        );

        Ok(CookieUpdate::Set(token))
    }

    /// Resolve the effective identity for a request.
    ///
    /// Never fails. Corrupt or inconsistent tokens resolve to the
    /// authenticated user and ask for the cookie to be cleared. Expired
    /// tokens resolve the same way but leave the cookie alone. A valid
    /// token past half of its lifetime is reissued.
    pub fn resolve(&self, token: Option<&str>, user: &AuthenticatedUser) -> Resolution {
        let direct = EffectiveIdentity::Direct(user.clone());

        match self.inspect(token, user) {
            Inspection::Absent | Inspection::Expired(_) => Resolution {
                identity: direct,
                state: SessionState::NoSession,
                cookie: None,
            },
            Inspection::Corrupt(_) => Resolution {
                identity: direct,
                state: SessionState::NoSession,
                cookie: Some(CookieUpdate::Clear),
            },
            Inspection::Invalid(reason) => Resolution {
                identity: direct,
                state: SessionState::Invalid(reason),
                cookie: Some(CookieUpdate::Clear),
            },
            Inspection::Valid(credential) => {
                let cookie = self.renew_if_due(&credential).map(CookieUpdate::Set);
                Resolution {
                    identity: EffectiveIdentity::Impersonated {
                        original: user.clone(),
                        impersonated: credential.impersonated.clone(),
                    },
                    state: SessionState::Active(credential),
                    cookie,
                }
            }
        }
    }

    /// End impersonation. Always clears the cookie.
    ///
    /// The incoming token is read only to write an audit line; whatever is
    /// wrong with it is logged and otherwise ignored.
    pub fn stop(&self, token: Option<&str>, user: &AuthenticatedUser) -> CookieUpdate {
        match self.inspect(token, user) {
            Inspection::Valid(credential) | Inspection::Expired(credential) => {
                tracing::trace!(
                    target: "impersonation.stopped",
                    "StopImpersonating: {} as {}",
                    credential.authenticated,
                    credential.impersonated
                );
            }
            Inspection::Corrupt(err) => {
                tracing::trace!(
                    target: "impersonation.stopped",
                    error = %err,
                    "Previous impersonation state not valid on stop"
                );
            }
            Inspection::Invalid(_) | Inspection::Absent => {}
        }

        CookieUpdate::Clear
    }

    fn inspect(&self, token: Option<&str>, user: &AuthenticatedUser) -> Inspection {
        let token = match token {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Inspection::Absent,
        };

        let credential = match self.codec.decrypt(token) {
            Ok(credential) if credential.is_complete() => credential,
            Ok(_) => {
                let err = DecryptionError::Malformed("credential is missing a user name".into());
                log_corrupt(&err);
                return Inspection::Corrupt(err);
            }
            Err(err) => {
                log_corrupt(&err);
                return Inspection::Corrupt(err);
            }
        };

        if !user.is_recognized() {
            let reason = InvalidReason::OriginalUserNotAuthenticated;
            tracing::info!(
                target: "impersonation.invalidated",
                initial = %credential.authenticated,
                impersonated = %credential.impersonated,
                "Removing impersonation, {}.",
                reason
            );
            return Inspection::Invalid(reason);
        }

        if user.user_name() != credential.authenticated {
            let reason = InvalidReason::AuthenticationContextChanged {
                initial: credential.authenticated.clone(),
                current: user.user_name().to_string(),
            };
            tracing::info!(
                target: "impersonation.invalidated",
                initial = %credential.authenticated,
                current = %user.user_name(),
                impersonated = %credential.impersonated,
                "Removing impersonation, {}.",
                reason
            );
            return Inspection::Invalid(reason);
        }

        if credential.is_expired(self.clock.now()) {
            tracing::trace!(
                target: "impersonation.expired",
                authenticated = %credential.authenticated,
                impersonated = %credential.impersonated,
                "Impersonation credential expired"
            );
            return Inspection::Expired(credential);
        }

        Inspection::Valid(credential)
    }

    /// Reissue the credential once more than half its lifetime has passed.
    fn renew_if_due(&self, credential: &ImpersonationCredential) -> Option<String> {
        let lifetime = self.config.cookie_duration();
        let now = self.clock.now();

        if now - credential.issued_at(lifetime) <= lifetime / 2 {
            return None;
        }

        let renewed = ImpersonationCredential {
            expires: now + lifetime,
            ..credential.clone()
        };

        match self.codec.encrypt(&renewed) {
            Ok(token) => {
                tracing::debug!(
                    target: "impersonation.renewed",
                    authenticated = %renewed.authenticated,
                    impersonated = %renewed.impersonated,
                    expires = %renewed.expires,
                    "Impersonation credential renewed"
                );
                Some(token)
            }
            Err(err) => {
                tracing::error!(
                    target: "impersonation.renewed",
                    error = %err,
                    "Failed to renew impersonation credential"
                );
                None
            }
        }
    }
}

fn log_corrupt(err: &DecryptionError) {
    tracing::trace!(
        target: "impersonation.integrity",
        error = %err,
        "Discarding unreadable impersonation token"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{Claim, StoredClaim};
    use crate::testing::{InMemoryDirectory, LogCapture, ManualClock, test_cipher};
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        manager: SessionManager,
        clock: Arc<ManualClock>,
        directory: Arc<InMemoryDirectory>,
    }

    fn fixture_with(config: ImpersonationConfig) -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.register_claim(StoredClaim::active(Claim::new("Reports", "Read")));
        directory.add_user("Alice");
        directory.add_user("Bob");
        directory.add_user("Carol");
        directory.grant("Alice", Claim::impersonate());
        directory.grant("Alice", Claim::new("Reports", "Read"));

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap(),
        ));
        let manager = SessionManager::new(
            CredentialCodec::new(Arc::new(test_cipher())),
            InMemoryDirectory::validator(&directory),
            clock.clone(),
            config,
        );

        Fixture {
            manager,
            clock,
            directory,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ImpersonationConfig::default())
    }

    fn alice() -> AuthenticatedUser {
        AuthenticatedUser::recognized("Alice", "ws-1")
    }

    fn token_for(f: &Fixture, credential: &ImpersonationCredential) -> String {
        f.manager.codec().encrypt(credential).unwrap()
    }

    fn set_token(update: CookieUpdate) -> String {
        match update {
            CookieUpdate::Set(token) => token,
            CookieUpdate::Clear => panic!("expected a set-cookie update"),
        }
    }

    #[tokio::test]
    async fn test_start_issues_credential() {
        let f = fixture();
        let caller = EffectiveIdentity::Direct(alice());

        let token = set_token(f.manager.start(&caller, "Bob").await.unwrap());
        let credential = f.manager.codec().decrypt(&token).unwrap();

        assert_eq!(credential.authenticated, "Alice");
        assert_eq!(credential.impersonated, "Bob");
        assert_eq!(credential.expires, f.clock.now() + Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_start_blank_target_is_bad_request() {
        let f = fixture();
        let caller = EffectiveIdentity::Direct(alice());

        let err = f.manager.start(&caller, "  ").await.unwrap_err();
        assert!(matches!(err, ImpersonationError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_start_anonymous_is_unauthorized() {
        let f = fixture();
        let caller = EffectiveIdentity::Direct(AuthenticatedUser::anonymous());

        let err = f.manager.start(&caller, "Bob").await.unwrap_err();
        assert!(matches!(err, ImpersonationError::Unauthorized(_)));
        assert!(err.clears_session());
        assert_eq!(f.directory.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_start_while_impersonating_is_conflict() {
        let f = fixture();
        let caller = EffectiveIdentity::Impersonated {
            original: alice(),
            impersonated: "Bob".to_string(),
        };

        let err = f.manager.start(&caller, "Carol").await.unwrap_err();
        assert!(matches!(err, ImpersonationError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_nested_start_keeps_original_user() {
        let f = fixture_with(ImpersonationConfig::default().allow_nested_impersonation(true));
        f.directory.grant("Bob", Claim::impersonate());
        let caller = EffectiveIdentity::Impersonated {
            original: alice(),
            impersonated: "Bob".to_string(),
        };

        let token = set_token(f.manager.start(&caller, "Carol").await.unwrap());
        let credential = f.manager.codec().decrypt(&token).unwrap();
        assert_eq!(credential.authenticated, "Alice");
        assert_eq!(credential.impersonated, "Carol");
    }

    #[test]
    fn test_resolve_without_token() {
        let f = fixture();

        let resolution = f.manager.resolve(None, &alice());
        assert_eq!(resolution.identity, EffectiveIdentity::Direct(alice()));
        assert_eq!(resolution.state, SessionState::NoSession);
        assert_eq!(resolution.cookie, None);

        let resolution = f.manager.resolve(Some(""), &alice());
        assert_eq!(resolution.cookie, None);
    }

    #[test]
    fn test_resolve_corrupt_token_clears() {
        let f = fixture();

        let resolution = f.manager.resolve(Some("garbage"), &alice());
        assert_eq!(resolution.state, SessionState::NoSession);
        assert_eq!(resolution.cookie, Some(CookieUpdate::Clear));
        assert!(!resolution.identity.is_impersonated());
    }

    #[test]
    fn test_resolve_incomplete_credential_clears() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "", f.clock.now() + Duration::minutes(30)),
        );

        let resolution = f.manager.resolve(Some(&token), &alice());
        assert_eq!(resolution.state, SessionState::NoSession);
        assert_eq!(resolution.cookie, Some(CookieUpdate::Clear));
    }

    #[test]
    fn test_resolve_active() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(50)),
        );

        let resolution = f.manager.resolve(Some(&token), &alice());
        assert!(resolution.state.is_active());
        assert_eq!(resolution.cookie, None);
        assert_eq!(
            resolution.identity,
            EffectiveIdentity::Impersonated {
                original: alice(),
                impersonated: "Bob".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_logged_out_user_invalidates() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(50)),
        );
        let logs = LogCapture::new();
        let _guard = logs.install();

        let resolution = f
            .manager
            .resolve(Some(&token), &AuthenticatedUser::anonymous());
        assert_eq!(
            resolution.state,
            SessionState::Invalid(InvalidReason::OriginalUserNotAuthenticated)
        );
        assert_eq!(resolution.cookie, Some(CookieUpdate::Clear));
        assert!(
            logs.contents()
                .contains("Removing impersonation, the original user is no longer authenticated.")
        );
    }

    #[test]
    fn test_resolve_blank_user_invalidates() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(50)),
        );

        let resolution = f
            .manager
            .resolve(Some(&token), &AuthenticatedUser::recognized("", ""));
        assert_eq!(
            resolution.state,
            SessionState::Invalid(InvalidReason::OriginalUserNotAuthenticated)
        );
        assert_eq!(resolution.cookie, Some(CookieUpdate::Clear));
    }

    #[test]
    fn test_stop_always_clears() {
        let f = fixture();
        assert_eq!(f.manager.stop(None, &alice()), CookieUpdate::Clear);
        assert_eq!(
            f.manager.stop(Some("garbage"), &AuthenticatedUser::anonymous()),
            CookieUpdate::Clear
        );
    }

    #[test]
    fn test_stop_logs_current_session() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(50)),
        );
        let logs = LogCapture::new();
        let _guard = logs.install();

        assert_eq!(f.manager.stop(Some(&token), &alice()), CookieUpdate::Clear);
        assert!(logs.contents().contains("StopImpersonating: Alice as Bob"));
    }

    #[test]
    fn test_stop_with_other_login_logs_mismatch() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(50)),
        );
        let logs = LogCapture::new();
        let _guard = logs.install();

        let update = f
            .manager
            .stop(Some(&token), &AuthenticatedUser::recognized("Carol", ""));
        assert_eq!(update, CookieUpdate::Clear);
        assert!(logs.contents().contains(
            "Removing impersonation, the current authentication context (Carol) does not match the initial one (Alice)."
        ));
    }

    #[test]
    fn test_renewal_reuses_names() {
        let f = fixture();
        let token = token_for(
            &f,
            &ImpersonationCredential::new("Alice", "Bob", f.clock.now() + Duration::minutes(10)),
        );

        let resolution = f.manager.resolve(Some(&token), &alice());
        let renewed = set_token(resolution.cookie.unwrap());
        let credential = f.manager.codec().decrypt(&renewed).unwrap();
        assert_eq!(credential.authenticated, "Alice");
        assert_eq!(credential.impersonated, "Bob");
        assert_eq!(credential.expires, f.clock.now() + Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_oversized_duration_still_issues_live_credential() {
        let f = fixture_with(ImpersonationConfig::default().cookie_duration_minutes(u64::MAX));
        let caller = EffectiveIdentity::Direct(alice());

        let token = set_token(f.manager.start(&caller, "Bob").await.unwrap());
        let credential = f.manager.codec().decrypt(&token).unwrap();
        assert!(credential.expires > f.clock.now());

        let resolution = f.manager.resolve(Some(&token), &alice());
        assert!(resolution.state.is_active());
        assert_eq!(resolution.cookie, None);
    }

    #[test]
    fn test_from_config_rejects_out_of_range_duration() {
        let directory = Arc::new(InMemoryDirectory::new());
        for minutes in [0, u64::MAX] {
            let config = ImpersonationConfig::default()
                .encryption_key(crate::testing::TEST_KEY_HEX)
                .cookie_duration_minutes(minutes);
            let result =
                SessionManager::from_config(config, InMemoryDirectory::validator(&directory));
            assert!(matches!(result, Err(ImpersonationError::BadRequest(_))));
        }
    }
}
