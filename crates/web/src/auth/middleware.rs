//! Authentication middleware for Axum.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::debug;

use taxi_common::password::hash_token;

use super::CurrentDriver;
use crate::error::AppError;
use crate::routes::found;
use crate::server::AppState;
use crate::urls;

/// Resolve the session cookie to a driver. Expired sessions are removed.
pub fn authenticate(
    state: &AppState,
    jar: &CookieJar,
) -> taxi_common::Result<Option<CurrentDriver>> {
    let token = match jar.get(&state.cfg.cookie_name) {
        Some(cookie) => cookie.value().to_string(),
        None => return Ok(None),
    };
    let token_hash = hash_token(&token);

    let session = match state.db.get_session(&token_hash)? {
        Some(s) => s,
        None => return Ok(None),
    };

    if session.expires_at <= chrono::Utc::now().timestamp() {
        debug!(driver_id = session.driver_id, "Session expired");
        state.db.delete_session(&token_hash)?;
        return Ok(None);
    }

    Ok(state
        .db
        .get_driver(session.driver_id)?
        .map(|driver| CurrentDriver { driver, token_hash }))
}

/// Middleware that requires a logged-in driver.
/// Anonymous requests are sent to the login page with `next` set to the
/// requested path.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar) {
        Ok(Some(current)) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Ok(None) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| urls::INDEX.to_string());
            debug!("Anonymous request to {}, redirecting to login", target);
            found(&urls::login_with_next(&target))
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
