//! Presigned-download redemption: validates the token embedded in a
//! presigned URL and streams the blob back with a best-effort content type.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use simsvc_domain::ServiceError;

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("html") => "text/html",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ServiceError::Unauthenticated("missing download token".into()))?;

    let granted_key = state.download_tokens.verify(&token)?;
    if granted_key != key {
        return Err(ServiceError::Unauthenticated(
            "token does not match the requested object".into(),
        )
        .into());
    }

    let content = state.storage.get_bytes(&key).await?;
    let filename = key.rsplit('/').next().unwrap_or("download");

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(filename).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        content,
    )
        .into_response())
}
