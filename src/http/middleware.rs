use crate::auth::AuthenticatedUser;
use crate::http::routes::ImpersonationState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Resolve the effective identity for every request.
///
/// Reads the [`AuthenticatedUser`] left in request extensions by the
/// host's authentication layer (anonymous when there is none), resolves
/// the impersonation cookie, and stores the resulting
/// [`EffectiveIdentity`](crate::auth::EffectiveIdentity) for handlers.
///
/// The cookie side effect from resolution is applied to the response unless
/// the handler already wrote the cookie itself.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/orders", get(list_orders))
///     .layer(axum::middleware::from_fn_with_state(state, resolve_identity))
///     .layer(axum::middleware::from_fn(authenticate));
/// ```
pub async fn resolve_identity(
    State(state): State<ImpersonationState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .unwrap_or_else(AuthenticatedUser::anonymous);

    let token = state.transport.read(request.headers());
    let resolution = state.manager.resolve(token.as_deref(), &user);
    request.extensions_mut().insert(resolution.identity);

    let mut response = next.run(request).await;

    if let Some(update) = resolution.cookie {
        if !state.transport.is_written(response.headers()) {
            if let Err(err) = state.transport.apply(&update, response.headers_mut()) {
                tracing::error!(error = %err, "Failed to write impersonation cookie");
            }
        }
    }

    response
}
