use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

mod health;
pub mod sdk;

pub use health::health;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let sdk_router = Router::new()
        .route("/evaluate", post(sdk::routes::evaluate))
        .route("/flags/{key}/evaluate", post(sdk::routes::evaluate_flag));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/evaluate", post(sdk::routes::preview))
        .nest("/sdk", sdk_router)
        .layer(CorsLayer::permissive())
}

async fn root() -> &'static str {
    "Feature flag evaluation service"
}
