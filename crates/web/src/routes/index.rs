//! Home page

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;

use crate::auth::CurrentDriver;
use crate::error::AppResult;
use crate::render::{self, IndexCounts};
use crate::server::AppState;

pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentDriver>,
) -> AppResult<Response> {
    let counts = IndexCounts {
        drivers: state.db.count_drivers()?,
        cars: state.db.count_cars()?,
        manufacturers: state.db.count_manufacturers()?,
        visits: state.db.record_visit(&current.token_hash)?,
    };
    Ok(render::index(&current.driver, counts).into_response())
}
