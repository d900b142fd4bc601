//! Taxi Service Web
//!
//! Server-rendered CRUD pages for manufacturers, drivers and cars behind a
//! cookie session login.

pub mod auth;
pub mod config;
pub mod error;
pub mod render;
pub mod routes;
pub mod server;
pub mod urls;

pub use config::WebConfig;
pub use server::{serve, AppState, TaxiServer};
