//! Session authentication
//!
//! A login stores the SHA-256 of a random token in the `sessions` table and
//! hands the raw token to the browser as a cookie. Every protected request
//! resolves that cookie back to a driver.

pub mod login;
pub mod middleware;

use taxi_common::Driver;

pub use login::{login_handler, login_page_handler, logout_handler, start_session};
pub use middleware::{authenticate, require_login};

/// The logged-in driver, inserted as a request extension by `require_login`
#[derive(Debug, Clone)]
pub struct CurrentDriver {
    pub driver: Driver,
    /// Hash of the session token that authenticated this request
    pub token_hash: String,
}
