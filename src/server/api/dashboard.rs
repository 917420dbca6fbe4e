use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::service;

pub async fn dashboard(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let dashboard = service::dashboard(state.store.as_ref(), &user)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(dashboard)))
}
