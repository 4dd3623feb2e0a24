//! Impersonation endpoints.
//!
//! | Method | Path | Effect |
//! |---|---|---|
//! | POST | `/Impersonate` | `{"UserName": "..."}`, starts impersonation and sets the cookie |
//! | POST | `/StopImpersonating` | clears the cookie, always 200 |
//! | GET | `/ImpersonationInfo` | current `Authenticated` / `Impersonated` names |

use crate::auth::{EffectiveIdentity, UserInfo};
use crate::error::{ImpersonationError, Result};
use crate::http::cookie::CookieTransport;
use crate::http::extractors::{CurrentIdentity, OriginalUser};
use crate::http::middleware::resolve_identity;
use crate::session::{CookieUpdate, SessionManager};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the impersonation middleware and endpoints.
#[derive(Clone)]
pub struct ImpersonationState {
    pub manager: Arc<SessionManager>,
    pub transport: CookieTransport,
}

impl ImpersonationState {
    pub fn new(manager: SessionManager) -> Self {
        let transport = CookieTransport::from_config(manager.config());
        Self {
            manager: Arc::new(manager),
            transport,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpersonateRequest {
    #[serde(default)]
    pub user_name: String,
}

/// Who is logged in and who they act as. Either may be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpersonationInfo {
    pub authenticated: Option<String>,
    pub impersonated: Option<String>,
}

impl ImpersonationInfo {
    pub fn from_identity(identity: &EffectiveIdentity) -> Self {
        let original = identity.original();
        Self {
            authenticated: original
                .is_recognized()
                .then(|| original.user_name().to_string()),
            impersonated: identity.impersonated_user_name().map(str::to_string),
        }
    }
}

/// The impersonation endpoints, without the resolving middleware.
pub fn routes(state: ImpersonationState) -> Router {
    Router::new()
        .route("/Impersonate", post(impersonate))
        .route("/StopImpersonating", post(stop_impersonating))
        .route("/ImpersonationInfo", get(impersonation_info))
        .with_state(state)
}

/// Merge the endpoints into `app` and resolve impersonation on every route.
///
/// The host's authentication must run before this, so add it as a later
/// (outer) layer.
pub fn install(app: Router, state: ImpersonationState) -> Router {
    app.merge(routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(state, resolve_identity))
}

async fn impersonate(
    State(state): State<ImpersonationState>,
    CurrentIdentity(identity): CurrentIdentity,
    payload: std::result::Result<Json<ImpersonateRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ImpersonationError::bad_request(rejection.body_text()).into_response();
        }
    };

    match start(&state, &identity, &request.user_name).await {
        Ok(response) => response,
        Err(err) if err.clears_session() => {
            let mut response = err.into_response();
            if let Err(err) = state
                .transport
                .apply(&CookieUpdate::Clear, response.headers_mut())
            {
                tracing::error!(error = %err, "Failed to clear impersonation cookie");
            }
            response
        }
        Err(err) => err.into_response(),
    }
}

async fn start(
    state: &ImpersonationState,
    identity: &EffectiveIdentity,
    target_user_name: &str,
) -> Result<Response> {
    let update = state.manager.start(identity, target_user_name).await?;

    let info = ImpersonationInfo {
        authenticated: Some(identity.original_user_name().to_string()),
        impersonated: Some(target_user_name.to_string()),
    };
    let mut response = Json(info).into_response();
    state.transport.apply(&update, response.headers_mut())?;
    Ok(response)
}

async fn stop_impersonating(
    State(state): State<ImpersonationState>,
    OriginalUser(user): OriginalUser,
    headers: HeaderMap,
) -> Result<Response> {
    let token = state.transport.read(&headers);
    let update = state.manager.stop(token.as_deref(), &user);

    let info = ImpersonationInfo::from_identity(&EffectiveIdentity::Direct(user));
    let mut response = Json(info).into_response();
    state.transport.apply(&update, response.headers_mut())?;
    Ok(response)
}

async fn impersonation_info(CurrentIdentity(identity): CurrentIdentity) -> Json<ImpersonationInfo> {
    Json(ImpersonationInfo::from_identity(&identity))
}
