//! Login and logout

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use taxi_common::{
    password::{hash_token, new_session_token, verify_password, verify_unknown_user},
    Database, EntityId, FormErrors, LoginForm,
};

use super::middleware::authenticate;
use crate::config::WebConfig;
use crate::error::AppResult;
use crate::render;
use crate::routes::found;
use crate::server::AppState;
use crate::urls;

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

/// Login form body; `next` travels as a hidden field
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginSubmission {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Create a session for `driver_id` and return the raw token
pub fn start_session(
    db: &Database,
    cfg: &WebConfig,
    driver_id: EntityId,
) -> taxi_common::Result<String> {
    let token = new_session_token();
    let expires_at = chrono::Utc::now().timestamp() + cfg.session_ttl_secs;
    db.store_session(&hash_token(&token), driver_id, expires_at)?;
    Ok(token)
}

fn session_cookie(cfg: &WebConfig, token: String) -> Cookie<'static> {
    Cookie::build((cfg.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cfg.secure_cookies)
        .build()
}

pub async fn login_page_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<NextParam>,
) -> AppResult<Response> {
    if authenticate(&state, &jar)?.is_some() {
        return Ok(found(urls::safe_next(params.next.as_deref())));
    }
    let form = LoginForm::default();
    Ok(render::login(&form, &FormErrors::new(), params.next.as_deref()).into_response())
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(submission): Form<LoginSubmission>,
) -> AppResult<Response> {
    let next = submission.next.as_deref().filter(|n| !n.is_empty());
    let form = LoginForm {
        username: submission.username.clone(),
        password: submission.password.clone(),
    };

    let (username, password) = match form.clean() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(render::login(&form, &errors, next).into_response()),
    };

    let verified = match state.db.get_credentials(&username)? {
        Some((id, encoded)) => verify_password(&password, &encoded).then_some(id),
        None => {
            verify_unknown_user(&password);
            None
        }
    };
    let driver_id = match verified {
        Some(id) => id,
        None => {
            warn!(username = %username, "Failed login attempt");
            let mut errors = FormErrors::new();
            errors.add_non_field(BAD_CREDENTIALS);
            return Ok(render::login(&form, &errors, next).into_response());
        }
    };

    let token = start_session(&state.db, &state.cfg, driver_id)?;
    state.db.touch_last_login(driver_id)?;
    info!(driver_id, username = %username, "Driver logged in");

    let jar = jar.add(session_cookie(&state.cfg, token));
    Ok((jar, found(urls::safe_next(next))).into_response())
}

pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Some(cookie) = jar.get(&state.cfg.cookie_name) {
        state.db.delete_session(&hash_token(cookie.value()))?;
        info!("Driver logged out");
    }
    let expired = Cookie::build((state.cfg.cookie_name.clone(), ""))
        .path("/")
        .build();
    let jar = jar.remove(expired);
    Ok((jar, found(urls::LOGIN)).into_response())
}
