//! Response-building helpers shared by the control plane, the auth gate and
//! the dispatcher.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::ext::ReasonPhrase;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;

/// Body type for every response the server writes (fixed or streamed).
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Wrap fixed bytes as a response body
pub fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into()).boxed_unsync()
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Build an HTTP response with the given status and body.
///
/// Falls back to a bare response if the builder rejects its input, which
/// cannot happen with a valid `StatusCode`.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .body(full(body))
        .unwrap_or_else(|_| Response::new(full("Internal Server Error")))
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(full(body))
        .unwrap_or_else(|_| Response::new(full("Internal Server Error")))
}

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<ResponseBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Create a not found response
pub fn not_found() -> Response<ResponseBody> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Replace the reason phrase written on the status line.
///
/// Phrases containing bytes that are illegal on a status line are ignored and
/// the canonical reason is written instead.
pub fn with_reason<B>(mut response: Response<B>, reason: &str) -> Response<B> {
    if let Ok(phrase) = ReasonPhrase::try_from(reason.to_string()) {
        response.extensions_mut().insert(phrase);
    }
    response
}

/// Status code from a raw number; codes outside 100..=999 become 500.
pub fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
