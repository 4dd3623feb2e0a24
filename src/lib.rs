//! Masquerade - cookie-based user impersonation for axum applications
//!
//! An authenticated user holding the impersonate claim can act as another
//! user. The session lives entirely in an encrypted, tamper-evident cookie
//! that is re-checked against the logged-in user on every request.
//!
//! # Features
//!
//! - **Permissions**: impersonate claim plus a privilege-escalation guard
//! - **Sessions**: AEAD-sealed credential with sliding expiration
//! - **HTTP**: identity-resolving middleware, extractors, and endpoints
//! - **Testing**: in-memory collaborators and Alba-style HTTP helpers
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use masquerade::{ConfigBuilder, ImpersonationState, PermissionValidator, SessionManager, http};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     masquerade::init_tracing_with_config(&config);
//!
//!     let validator = PermissionValidator::new(lookup, authorization, directory, claims);
//!     let manager = SessionManager::from_config(config.impersonation, validator)?;
//!
//!     let app = http::install(my_routes(), ImpersonationState::new(manager))
//!         .layer(axum::middleware::from_fn(authenticate));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
mod config;
mod error;
pub mod http;
pub mod session;
pub mod testing;
pub mod utils;

pub use auth::{
    AuthenticatedUser, AuthorizationProvider, Claim, ClaimStore, EffectiveIdentity,
    PermissionLookup, PermissionValidator, StoredClaim, UserDirectory, UserInfo,
};
pub use config::{Config, ConfigBuilder, LoggingConfig};
pub use error::{ErrorResponse, ImpersonationError, Result};
pub use http::{CookieTransport, CurrentIdentity, ImpersonationState, OriginalUser};
pub use session::{
    CookieUpdate, CredentialCodec, ImpersonationConfig, ImpersonationCredential, Resolution,
    SessionManager, SessionState,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with defaults.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. `"info,impersonation.integrity=trace"`)
/// - `MASQUERADE_LOG_JSON`: `"true"` for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("MASQUERADE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from [`LoggingConfig`].
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
