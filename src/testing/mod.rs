//! Testing utilities for code built on masquerade.
//!
//! - [`InMemoryDirectory`]: users, claims, and grants for [`PermissionValidator`](crate::auth::PermissionValidator)
//! - [`ManualClock`]: deterministic time for expiry and renewal
//! - [`LogCapture`]: assert on emitted diagnostics
//! - [`Scenario`]: in-process HTTP requests with cookie helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use masquerade::testing::{self, InMemoryDirectory, header_identity};
//!
//! #[tokio::test]
//! async fn test_info() {
//!     let app = masquerade::http::install(Router::new(), state)
//!         .layer(axum::middleware::from_fn(header_identity));
//!
//!     testing::get(app, "/ImpersonationInfo")
//!         .user("Alice")
//!         .execute()
//!         .await
//!         .assert_ok();
//! }
//! ```

mod clock;
mod directory;
mod logs;
mod scenario;

pub use clock::ManualClock;
pub use directory::InMemoryDirectory;
pub use logs::{CaptureWriter, LogCapture};
pub use scenario::{Scenario, ScenarioAssert, get, post};

use crate::auth::AuthenticatedUser;
use crate::session::PrivateCookieCipher;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

/// Fixed 64-byte key for tests. Never use it outside tests.
pub const TEST_KEY_HEX: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Header read by [`header_identity`].
pub const TEST_USER_HEADER: &str = "x-test-user";

/// Optional workstation header read by [`header_identity`].
pub const TEST_WORKSTATION_HEADER: &str = "x-test-workstation";

/// A cipher keyed with [`TEST_KEY_HEX`].
pub fn test_cipher() -> PrivateCookieCipher {
    PrivateCookieCipher::new(cookie::Key::from(
        &hex::decode(TEST_KEY_HEX).expect("TEST_KEY_HEX is valid hex"),
    ))
}

/// Stand-in for primary authentication.
///
/// Inserts an [`AuthenticatedUser`] named by the `x-test-user` header, or
/// an anonymous one when the header is missing. Must run before the
/// impersonation middleware, so add it as the outermost layer.
pub async fn header_identity(mut request: Request, next: Next) -> Response {
    let user = test_user(request.headers());
    request.extensions_mut().insert(user);
    next.run(request).await
}

fn test_user(headers: &HeaderMap) -> AuthenticatedUser {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    match header(TEST_USER_HEADER) {
        Some(user_name) => AuthenticatedUser::recognized(
            user_name,
            header(TEST_WORKSTATION_HEADER).unwrap_or_default(),
        ),
        None => AuthenticatedUser::anonymous(),
    }
}
