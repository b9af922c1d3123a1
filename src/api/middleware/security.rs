use axum::{
    extract::Request,
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn security_headers(req: Request, next: Next) -> Response {
    // Reject TRACE and TRACK methods (proxy disclosure)
    let method = req.method();
    if method == Method::TRACE || method.as_str() == "TRACK" {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Stored files are user content; never let the browser execute them
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static("default-src 'none'; img-src 'self'; frame-ancestors 'self'"),
    );

    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::HeaderName::from_static("cross-origin-resource-policy"),
        header::HeaderValue::from_static("cross-origin"),
    );

    // Suppress fingerprinting
    headers.insert(header::SERVER, header::HeaderValue::from_static("file-intake"));

    response
}
