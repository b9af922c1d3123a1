use crate::AppState;
use crate::api::error::AppError;
use crate::models::CommittedFile;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "files";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<CommittedFile>,
}

#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content = Multipart, description = "Up to five images in the `files` field"),
    responses(
        (status = 201, description = "Files uploaded successfully", body = UploadResponse),
        (status = 400, description = "No files, invalid type or name, too large, quota exceeded or infected"),
        (status = 500, description = "Scanner or storage failure")
    ),
    tag = "files"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut multipart = multipart?;
    let mut staged = Vec::new();

    // Everything staged so far is dropped (and purged) on any early return
    while let Some(field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != UPLOAD_FIELD {
            return Err(AppError::UnexpectedField(field_name));
        }

        if staged.len() >= state.config.max_files {
            return Err(AppError::TooManyFiles {
                max: state.config.max_files,
            });
        }

        let content_type = field.content_type().map(str::to_string);
        staged.push(
            state
                .stager
                .stage(&original_name, content_type.as_deref(), field)
                .await?,
        );
    }

    let files = state.pipeline.admit(staged).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Files uploaded successfully".to_string(),
            files,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/files/{filename}",
    params(
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File content stream"),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let found = state.retrieval.retrieve(&filename).await?;

    let ascii_filename = found
        .stored_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    // RFC 5987 percent-encoding for UTF-8 filename
    let encoded_filename = utf8_percent_encode(&found.stored_name, NON_ALPHANUMERIC).to_string();
    let content_disposition = format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    );

    let size = found.size;
    let body = Body::from_stream(ReaderStream::new(found.file));

    Ok((
        [
            (header::CONTENT_TYPE, found.content_type.to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        body,
    )
        .into_response())
}
