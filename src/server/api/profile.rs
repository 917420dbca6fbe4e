use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::extract::PathParam;
use crate::server::response::{ApiError, ApiResponse};
use crate::service;

pub async fn profile(
    State(state): State<Arc<AppState>>,
    PathParam(user_id): PathParam<String>,
) -> impl IntoResponse {
    let profile = service::profile(state.store.as_ref(), &user_id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(profile)))
}
