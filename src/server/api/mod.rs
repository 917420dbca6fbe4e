mod contributions;
mod dashboard;
mod profile;
mod resources;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Resource routes
        .route("/resources", post(resources::create_resource))
        .route("/resources", get(resources::list_resources))
        .route("/resources/{id}", get(resources::get_resource))
        .route("/resources/{id}", delete(resources::delete_resource))
        .route("/resources/{id}/download", get(resources::download_resource))
        .route("/resources/{id}/reviews", post(resources::add_review))
        // Contribution routes
        .route("/contributions/leaderboard", get(contributions::leaderboard))
        .route(
            "/contributions/my-contribution",
            get(contributions::my_contribution),
        )
        // Aggregated views
        .route("/dashboard", get(dashboard::dashboard))
        .route("/profile/{user_id}", get(profile::profile))
}
