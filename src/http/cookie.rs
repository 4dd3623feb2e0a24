//! Moves the impersonation token between cookies and [`CookieUpdate`]s.

use crate::error::{ImpersonationError, Result};
use crate::session::{CookieUpdate, ImpersonationConfig};
use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, SameSite};

/// Reads and writes the impersonation cookie.
///
/// Set-cookies are session cookies: the credential carries its own expiry
/// and the browser copy does not need one.
#[derive(Debug, Clone)]
pub struct CookieTransport {
    name: String,
    path: String,
    secure: bool,
    http_only: bool,
}

impl CookieTransport {
    pub fn from_config(config: &ImpersonationConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            path: config.cookie_path.clone(),
            secure: config.cookie_secure,
            http_only: config.cookie_http_only,
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    /// The token from the request's `Cookie` headers, if present.
    ///
    /// Unparseable cookie pairs are skipped.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| Cookie::split_parse(raw).filter_map(|parsed| parsed.ok()))
            .find(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value().to_string())
    }

    /// Render `update` as a cookie.
    pub fn build(&self, update: &CookieUpdate) -> Cookie<'static> {
        let value = match update {
            CookieUpdate::Set(token) => token.clone(),
            CookieUpdate::Clear => String::new(),
        };

        let mut cookie = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(SameSite::Lax)
            .build();

        if *update == CookieUpdate::Clear {
            cookie.make_removal();
        }

        cookie
    }

    /// Append the `Set-Cookie` header for `update`.
    pub fn apply(&self, update: &CookieUpdate, headers: &mut HeaderMap) -> Result<()> {
        let value = HeaderValue::from_str(&self.build(update).to_string()).map_err(|e| {
            ImpersonationError::internal(format!("Invalid impersonation cookie header: {}", e))
        })?;
        headers.append(header::SET_COOKIE, value);
        Ok(())
    }

    /// Whether `headers` already carry a `Set-Cookie` for this cookie.
    pub fn is_written(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value).ok())
            .any(|cookie| cookie.name() == self.name)
    }
}
