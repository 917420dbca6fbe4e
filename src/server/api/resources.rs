use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::CreateReviewRequest;
use crate::server::extract::{JsonBody, MultipartForm, PathParam, QueryParams};
use crate::server::response::{ApiError, ApiResponse};
use crate::service::{self, NewResource};
use crate::types::ResourceFilter;

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the size limit")
    } else {
        ApiError::bad_request(e.body_text())
    }
}

pub async fn create_resource(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    MultipartForm(mut multipart): MultipartForm,
) -> impl IntoResponse {
    let mut input = NewResource::default();
    let mut file: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded"));
                }
                file = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "title" => input.title = field.text().await.map_err(multipart_error)?,
            "subject" => input.subject = field.text().await.map_err(multipart_error)?,
            "topic" => input.topic = field.text().await.map_err(multipart_error)?,
            "description" => {
                input.description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => tracing::debug!(field = %name, "Ignoring unknown multipart field"),
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let resource = service::create_resource(
        state.store.as_ref(),
        &state.storage,
        &user,
        input,
        &file,
        state.max_upload_bytes,
    )
    .await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(resource))))
}

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<ResourceFilter>,
) -> impl IntoResponse {
    let resources = service::list_resources(state.store.as_ref(), &filter)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(resources)))
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<String>,
) -> impl IntoResponse {
    let resource = service::get_resource(state.store.as_ref(), &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(resource)))
}

pub async fn add_review(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<String>,
    JsonBody(req): JsonBody<CreateReviewRequest>,
) -> impl IntoResponse {
    let rating = req
        .rating
        .as_integer()
        .ok_or_else(|| ApiError::bad_request("Rating must be an integer between 1 and 5"))?;

    let resource = service::add_review(state.store.as_ref(), &user, &id, rating, &req.comment)?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(resource))))
}

pub async fn download_resource(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<String>,
) -> impl IntoResponse {
    let download = service::open_download(state.store.as_ref(), &state.storage, &user, &id).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_LENGTH, download.size.to_string()),
        (header::ETAG, format!("\"{}\"", download.resource.file_sha256)),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&download.resource.title),
        ),
    ];

    let body = Body::from_stream(ReaderStream::new(download.reader));

    Ok::<_, ApiError>((headers, body))
}

pub async fn delete_resource(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<String>,
) -> impl IntoResponse {
    service::delete_resource(state.store.as_ref(), &state.storage, &user, &id).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(json!({ "id": id }))))
}

/// Always names the download `<title>.pdf`. The plain `filename` is reduced
/// to safe ASCII; `filename*` carries the exact title.
fn content_disposition(title: &str) -> String {
    let title = title.trim();

    let ascii: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let ascii = ascii.trim_matches(|c| c == ' ' || c == '.');
    let ascii = if ascii.is_empty() { "file" } else { ascii };

    let exact = if title.is_empty() { "file" } else { title };

    format!(
        "attachment; filename=\"{ascii}.pdf\"; filename*=UTF-8''{}.pdf",
        urlencoding::encode(exact)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_plain_title() {
        assert_eq!(
            content_disposition("Linear Algebra"),
            "attachment; filename=\"Linear Algebra.pdf\"; filename*=UTF-8''Linear%20Algebra.pdf"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("Größe \"quoted\"/path");
        assert!(value.starts_with("attachment; filename=\"Gr__e _quoted__path.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''Gr%C3%B6%C3%9Fe%20%22quoted%22%2Fpath.pdf"));
        assert!(value.is_ascii());
    }

    #[test]
    fn test_content_disposition_empty_title() {
        assert_eq!(
            content_disposition("  "),
            "attachment; filename=\"file.pdf\"; filename*=UTF-8''file.pdf"
        );
    }
}
