use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Keeps a caller supplied `x-request-id` or assigns a fresh one, and echoes
/// it on the response so upload log lines can be matched to clients.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(new_request_id);

    req.headers_mut().insert(X_REQUEST_ID, request_id.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID, request_id);
    response
}

fn new_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
