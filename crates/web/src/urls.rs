//! Paths of every page, shared by the router, redirects and templates

use taxi_common::EntityId;

pub const INDEX: &str = "/";
pub const LOGIN: &str = "/accounts/login/";
pub const LOGOUT: &str = "/accounts/logout/";

pub const DRIVER_LIST: &str = "/drivers/";
pub const DRIVER_CREATE: &str = "/drivers/create/";
pub const MANUFACTURER_LIST: &str = "/manufacturers/";
pub const MANUFACTURER_CREATE: &str = "/manufacturers/create/";
pub const CAR_LIST: &str = "/cars/";
pub const CAR_CREATE: &str = "/cars/create/";

pub fn driver_detail(id: EntityId) -> String {
    format!("/drivers/{}/", id)
}

pub fn driver_update(id: EntityId) -> String {
    format!("/drivers/{}/update/", id)
}

pub fn driver_delete(id: EntityId) -> String {
    format!("/drivers/{}/delete/", id)
}

pub fn manufacturer_update(id: EntityId) -> String {
    format!("/manufacturers/{}/update/", id)
}

pub fn manufacturer_delete(id: EntityId) -> String {
    format!("/manufacturers/{}/delete/", id)
}

pub fn car_detail(id: EntityId) -> String {
    format!("/cars/{}/", id)
}

pub fn car_update(id: EntityId) -> String {
    format!("/cars/{}/update/", id)
}

pub fn car_delete(id: EntityId) -> String {
    format!("/cars/{}/delete/", id)
}

pub fn toggle_car_assign(id: EntityId) -> String {
    format!("/cars/{}/toggle-assign/", id)
}

/// Login page that returns to `next` afterwards
pub fn login_with_next(next: &str) -> String {
    format!("{}?next={}", LOGIN, urlencoding::encode(next))
}

/// Only local absolute paths are followed after login. Browsers strip tabs
/// and newlines while parsing, so `/\t/host` would become `//host`.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.chars().any(|c| c.is_control() || c.is_whitespace()) => INDEX,
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => INDEX,
    }
}
