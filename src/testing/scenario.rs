//! Alba-style HTTP testing for the impersonation endpoints.
//!
//! Requests run in-process through `tower::ServiceExt::oneshot`; no server
//! is started.
//!
//! ```rust,ignore
//! let response = testing::post(app.clone(), "/Impersonate")
//!     .user("Alice")
//!     .json_body(&json!({"UserName": "Bob"}))
//!     .execute()
//!     .await
//!     .assert_ok()
//!     .assert_cookie_set("Impersonation");
//!
//! let token = response.cookie_value("Impersonation").unwrap();
//! ```

use crate::testing::TEST_USER_HEADER;
use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
};
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

/// Test request builder.
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            request: Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().append(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
        self
    }

    /// Authenticate as `user_name` through [`header_identity`](crate::testing::header_identity).
    pub fn user(self, user_name: &str) -> Self {
        self.header(TEST_USER_HEADER, user_name)
    }

    /// Send a cookie. Repeated calls send multiple `Cookie` headers.
    pub fn cookie(self, name: &str, value: &str) -> Self {
        self.header(header::COOKIE.as_str(), &format!("{}={}", name, value))
    }

    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        *self.request.body_mut() = Body::from(body.into());
        self
    }

    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertions on a response.
pub struct ScenarioAssert {
    response: axum::response::Response,
}

impl ScenarioAssert {
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(self) -> Self {
        self.assert_status(StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(self) -> Self {
        self.assert_status(StatusCode::CONFLICT)
    }

    pub fn assert_server_error(self) -> Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// All `Set-Cookie` headers for `name`, in order.
    pub fn set_cookies(&self, name: &str) -> Vec<Cookie<'static>> {
        self.response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .filter(|cookie| cookie.name() == name)
            .collect()
    }

    /// The single `Set-Cookie` for `name`, if any.
    pub fn set_cookie(&self, name: &str) -> Option<Cookie<'static>> {
        let mut cookies = self.set_cookies(name);
        assert!(
            cookies.len() <= 1,
            "Expected at most one Set-Cookie for '{}', got {}",
            name,
            cookies.len()
        );
        cookies.pop()
    }

    /// Value of a non-removal `Set-Cookie` for `name`.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.set_cookie(name)
            .filter(|cookie| !cookie.value().is_empty())
            .map(|cookie| cookie.value().to_string())
    }

    pub fn assert_cookie_set(self, name: &str) -> Self {
        let cookie = self
            .set_cookie(name)
            .unwrap_or_else(|| panic!("Set-Cookie '{}' not found", name));
        assert!(
            !cookie.value().is_empty(),
            "Cookie '{}' was cleared, expected a value",
            name
        );
        self
    }

    pub fn assert_cookie_cleared(self, name: &str) -> Self {
        let cookie = self
            .set_cookie(name)
            .unwrap_or_else(|| panic!("Set-Cookie '{}' not found", name));
        assert!(
            cookie.value().is_empty(),
            "Cookie '{}' was set, expected removal",
            name
        );
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
        self
    }

    pub fn assert_no_cookie(self, name: &str) -> Self {
        assert!(
            self.set_cookie(name).is_none(),
            "Unexpected Set-Cookie '{}'",
            name
        );
        self
    }

    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    pub fn assert_json(self) -> Self {
        let content_type = self
            .response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("Content-Type header not found")
            .to_str()
            .unwrap();
        assert!(
            content_type.contains("application/json"),
            "Expected JSON content type, got: {}",
            content_type
        );
        self
    }

    pub async fn body_string(self) -> String {
        let bytes = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let bytes = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    pub fn response(self) -> axum::response::Response {
        self.response
    }
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, http::HeaderMap, routing::get as axum_get};
    use serde_json::json;

    async fn echo_cookies(headers: HeaderMap) -> Json<serde_json::Value> {
        let cookies: Vec<String> = headers
            .get_all(header::COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        Json(json!({ "cookies": cookies }))
    }

    async fn sets_cookie() -> ([(header::HeaderName, &'static str); 1], &'static str) {
        ([(header::SET_COOKIE, "Flavor=oatmeal; Path=/")], "ok")
    }

    #[tokio::test]
    async fn test_cookies_are_sent() {
        let app = Router::new().route("/echo", axum_get(echo_cookies));

        let body: serde_json::Value = get(app, "/echo")
            .cookie("a", "1")
            .cookie("b", "2")
            .execute()
            .await
            .assert_ok()
            .json()
            .await;

        assert_eq!(body["cookies"], json!(["a=1", "b=2"]));
    }

    #[tokio::test]
    async fn test_set_cookie_is_parsed() {
        let app = Router::new().route("/", axum_get(sets_cookie));

        let response = get(app, "/")
            .execute()
            .await
            .assert_ok()
            .assert_cookie_set("Flavor")
            .assert_no_cookie("Other");

        assert_eq!(response.cookie_value("Flavor").as_deref(), Some("oatmeal"));
    }
}
