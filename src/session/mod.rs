//! Impersonation sessions.
//!
//! The credential lives only in an encrypted client cookie. Each request
//! decrypts it, checks it against the authenticated user, and may renew it.

mod cipher;
mod clock;
mod codec;
mod config;
mod credential;
mod manager;

pub use cipher::{DecryptionError, KeyedCipher, PrivateCookieCipher};
pub use clock::{Clock, SystemClock};
pub use codec::{CREDENTIAL_PURPOSE, CredentialCodec};
pub use config::{ImpersonationConfig, MAX_COOKIE_DURATION_MINUTES};
pub use credential::ImpersonationCredential;
pub use manager::{CookieUpdate, InvalidReason, Resolution, SessionManager, SessionState};
