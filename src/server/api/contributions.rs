use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::service;

pub async fn leaderboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = service::leaderboard(state.store.as_ref())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}

pub async fn my_contribution(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let contribution = service::get_for_user(state.store.as_ref(), &user.id)?
        .or_not_found("Contribution not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(contribution)))
}
