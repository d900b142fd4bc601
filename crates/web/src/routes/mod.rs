//! CRUD routes for manufacturers, drivers and cars
//!
//! Every route here sits behind the login gate. Mutating routes answer a
//! valid submission with `302 Found` and an invalid one with the form
//! redisplayed (200).

pub mod cars;
pub mod drivers;
pub mod index;
pub mod manufacturers;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use taxi_common::EntityId;

use crate::error::{AppError, AppResult};
use crate::server::AppState;
use crate::urls;

/// Protected route table
pub fn taxi_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(urls::INDEX, get(index::index_handler))
        .route(urls::DRIVER_LIST, get(drivers::list_handler))
        .route(
            urls::DRIVER_CREATE,
            get(drivers::create_form_handler).post(drivers::create_handler),
        )
        .route("/drivers/:id/", get(drivers::detail_handler))
        .route(
            "/drivers/:id/update/",
            get(drivers::update_form_handler).post(drivers::update_handler),
        )
        .route(
            "/drivers/:id/delete/",
            get(drivers::confirm_delete_handler).post(drivers::delete_handler),
        )
        .route(urls::MANUFACTURER_LIST, get(manufacturers::list_handler))
        .route(
            urls::MANUFACTURER_CREATE,
            get(manufacturers::create_form_handler).post(manufacturers::create_handler),
        )
        .route(
            "/manufacturers/:id/update/",
            get(manufacturers::update_form_handler).post(manufacturers::update_handler),
        )
        .route(
            "/manufacturers/:id/delete/",
            get(manufacturers::confirm_delete_handler).post(manufacturers::delete_handler),
        )
        .route(urls::CAR_LIST, get(cars::list_handler))
        .route(
            urls::CAR_CREATE,
            get(cars::create_form_handler).post(cars::create_handler),
        )
        .route("/cars/:id/", get(cars::detail_handler))
        .route(
            "/cars/:id/update/",
            get(cars::update_form_handler).post(cars::update_handler),
        )
        .route(
            "/cars/:id/delete/",
            get(cars::confirm_delete_handler).post(cars::delete_handler),
        )
        .route("/cars/:id/toggle-assign/", post(cars::toggle_assign_handler))
}

/// `302 Found` to `location`
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Field error shown when a unique column already holds the submitted value
pub fn unique_message(kind: &str, field: &str) -> String {
    let mut kind_chars = kind.chars();
    let kind = match kind_chars.next() {
        Some(first) => first.to_uppercase().chain(kind_chars).collect::<String>(),
        None => String::new(),
    };
    format!("{} with this {} already exists.", kind, field.replace('_', " "))
}

/// Id segment of a detail path. Anything but plain digits is a 404.
pub fn path_id(raw: &str) -> AppResult<EntityId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::NotFound("Not found".to_string()));
    }
    raw.parse()
        .map_err(|_| AppError::NotFound("Not found".to_string()))
}

/// `page` query value. Missing or blank means the first page.
pub fn page_number(raw: Option<&str>) -> AppResult<Option<u32>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) => n
            .parse()
            .map(Some)
            .map_err(|_| AppError::NotFound("Invalid page".to_string())),
    }
}

pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
