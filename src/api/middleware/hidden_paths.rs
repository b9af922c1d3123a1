use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;

/// Answers 404 for any path with a dot-prefixed segment so the static file
/// service never exposes the staging area or other hidden entries.
pub async fn hidden_path_guard(req: Request, next: Next) -> Response {
    if has_hidden_segment(req.uri().path()) {
        tracing::warn!("Refused static request for hidden path {}", req.uri().path());
        return (StatusCode::NOT_FOUND, "File not found.").into_response();
    }

    next.run(req).await
}

fn has_hidden_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        decoded.starts_with('.') || decoded.contains(['/', '\\'])
    })
}
