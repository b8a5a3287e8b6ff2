mod admin;
mod auth;
pub mod error;
mod events;
mod vendor;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::application::WalletService;
use crate::config::Config;

pub use auth::{VendorIdentity, VENDOR_ID_HEADER};
pub use error::{ApiError, ApiResult};

pub struct AppState {
    pub service: WalletService,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(service: WalletService, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            service,
            admin_token: config.admin_token.clone(),
        })
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let admin = admin::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_admin,
    ));

    let api = Router::new()
        .route("/healthz", get(healthz))
        .merge(vendor::router())
        .merge(events::router())
        .nest("/admin", admin);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
