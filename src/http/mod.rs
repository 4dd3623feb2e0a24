//! HTTP transport for impersonation.
//!
//! [`resolve_identity`] runs on every request; [`routes`] exposes the
//! start/stop/info endpoints. [`install`] wires both into a router.

pub mod cookie;
pub mod extractors;
pub mod middleware;
pub mod routes;

pub use self::cookie::CookieTransport;
pub use extractors::{CurrentIdentity, OriginalUser};
pub use middleware::resolve_identity;
pub use routes::{ImpersonateRequest, ImpersonationInfo, ImpersonationState, install, routes};
