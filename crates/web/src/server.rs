//! HTTP server for the taxi service
//!
//! Wires the login routes, the protected CRUD routes and the session gate
//! into one axum router over a shared SQLite store.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use taxi_common::{Database, Driver, DriverCreationForm, Error};

use crate::auth::{login_handler, login_page_handler, logout_handler, require_login};
use crate::config::WebConfig;
use crate::routes::{not_found_handler, taxi_routes};
use crate::urls;

/// State shared by every handler
pub struct AppState {
    pub db: Database,
    pub cfg: WebConfig,
}

/// Taxi service web server
#[derive(Clone)]
pub struct TaxiServer {
    state: Arc<AppState>,
}

/// Start the server with the given configuration
pub async fn serve(cfg: WebConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg.listen.parse()?;
    let server = TaxiServer::new(cfg)?;
    server.serve(addr).await
}

impl TaxiServer {
    /// Open the database named in `cfg` and build a server over it
    pub fn new(cfg: WebConfig) -> taxi_common::Result<Self> {
        let db = Database::open(&cfg.db_path)?;
        Ok(Self::with_database(db, cfg))
    }

    pub fn with_database(db: Database, cfg: WebConfig) -> Self {
        Self {
            state: Arc::new(AppState { db, cfg }),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let protected = taxi_routes().route_layer(middleware::from_fn_with_state(
            self.state.clone(),
            require_login,
        ));

        Router::new()
            .route(urls::LOGIN, get(login_page_handler).post(login_handler))
            .route(urls::LOGOUT, post(logout_handler))
            .merge(protected)
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Register a driver from a `USERNAME:LICENSE:PASSWORD` triple.
    /// The password must pass the same rules as the registration form.
    pub fn create_driver(&self, triple: &str) -> anyhow::Result<Driver> {
        let mut parts = triple.splitn(3, ':');
        let (username, license_number, password) =
            match (parts.next(), parts.next(), parts.next()) {
                (Some(u), Some(l), Some(p)) => (u, l, p),
                _ => anyhow::bail!("expected USERNAME:LICENSE:PASSWORD, got {:?}", triple),
            };

        let form = DriverCreationForm {
            username: username.to_string(),
            license_number: license_number.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
            ..DriverCreationForm::default()
        };
        let new = form
            .clean()
            .map_err(|errors| anyhow::anyhow!("invalid driver: {}", errors))?;

        match self.state.db.create_driver(&new) {
            Ok(driver) => {
                info!(id = driver.id, username = %driver.username, "Created driver");
                Ok(driver)
            }
            Err(Error::AlreadyExists { field, .. }) => {
                anyhow::bail!("a driver with this {} already exists", field.replace('_', " "))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        match self.state.db.cleanup_expired_sessions() {
            Ok(0) => {}
            Ok(n) => info!("Removed {} expired sessions", n),
            Err(e) => warn!("Session cleanup failed: {}", e),
        }

        info!("Taxi service listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
