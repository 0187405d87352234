//! Control operation handlers.

use crate::response::{
    build_response, build_response_with_headers, error_response, json_response, status_from,
    with_reason, ResponseBody,
};
use crate::server::{RawEscape, ServerContext};
use crate::types::{InboundRequest, QueuedResponse};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{Response, StatusCode};
use std::convert::Infallible;
use tracing::{info, warn};

/// Bytes that look vaguely like status lines but are not an HTTP response
const GARBAGE: &[u8] = b"220 example.com ESMTP\r\n200 This is garbage\r\n\r\n";

/// Status code outside the range HTTP defines
const BAD_STATUS: u16 = 700;

/// Fixed 16-byte body for bad-status and perf
const FIXED_BODY: &str = "Body of response";

/// GET .../garbage - write a malformed response straight to the socket
pub fn handle_garbage(escape: &RawEscape) -> Response<ResponseBody> {
    info!("Returning garbage");
    escape.write_raw(Bytes::from_static(GARBAGE));
    // Swallowed by the escape hatch; `Connection: close` makes hyper close
    // the socket right after it.
    build_response_with_headers(StatusCode::OK, [("Connection", "close")], Bytes::new())
}

/// GET .../bad-status - status code 700 with a fixed body
pub fn handle_bad_status() -> Response<ResponseBody> {
    info!("Returning bad status code");
    with_reason(build_response(status_from(BAD_STATUS), FIXED_BODY), "BAD")
}

/// GET .../perf - cheap fixed response
pub fn handle_perf() -> Response<ResponseBody> {
    build_response(StatusCode::OK, FIXED_BODY)
}

/// DELETE .../requests - clear the request log
pub fn handle_flush_requests(context: &ServerContext) -> Response<ResponseBody> {
    context.state.flush_requests();
    info!("Flushing requests");
    build_response(StatusCode::OK, Bytes::new())
}

/// DELETE on the control root - stop accepting connections
pub fn handle_shutdown(context: &ServerContext) -> Response<ResponseBody> {
    info!("Shutting down");
    context.shutdown();
    build_response_with_headers(StatusCode::OK, [("Connection", "close")], Bytes::new())
}

/// GET .../requests - recorded requests as a JSON array
pub fn handle_list_requests(context: &ServerContext) -> Response<ResponseBody> {
    info!("Sending received requests");
    json_response(StatusCode::OK, &context.state.requests())
}

/// GET .../read-timeout - send part of the body now and the rest after the
/// configured delay. Only this response's body waits on the timer.
pub fn handle_read_timeout(context: &ServerContext) -> Response<ResponseBody> {
    let delay = context.config.read_timeout_delay();
    let secs = delay.as_secs();
    info!("Sleeping {} seconds before finishing response", secs);

    let head = Bytes::from(format!("sleeping {secs} seconds ...\n"));
    let tail = async move {
        tokio::time::sleep(delay).await;
        Bytes::from(format!("slept {secs} seconds\n"))
    };
    let chunks = stream::iter([head])
        .chain(stream::once(tail))
        .map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));

    Response::builder()
        .status(StatusCode::OK)
        .body(StreamBody::new(chunks).boxed_unsync())
        .unwrap_or_else(|_| build_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()))
}

/// PUT .../responses - replace the queue with the posted responses
pub fn handle_enqueue_responses(
    request: &InboundRequest,
    context: &ServerContext,
) -> Response<ResponseBody> {
    info!("Adding responses...");

    if request.body.is_empty() {
        warn!("No response data was provided");
        return with_reason(
            build_response(StatusCode::BAD_REQUEST, Bytes::new()),
            "NO RESPONSES IN REQUEST",
        );
    }

    match QueuedResponse::parse_batch(&request.body) {
        Ok(responses) => {
            info!(count = responses.len(), "Replaced response queue");
            context.state.replace_responses(responses);
            build_response(StatusCode::OK, Bytes::new())
        }
        Err(e) => {
            warn!("Rejected response payload: {}", e);
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::types::RecordedRequest;
    use hyper::ext::ReasonPhrase;
    use hyper::{HeaderMap, Method, Version};
    use std::time::Duration;

    fn context() -> ServerContext {
        ServerContext::new(ServerConfig::default())
    }

    fn put_responses(body: &str) -> InboundRequest {
        InboundRequest {
            method: Method::PUT,
            scheme: None,
            path: "/hack-http-server/responses".to_string(),
            query: None,
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            body: Bytes::from(body.to_string()),
        }
    }

    fn recorded(uri: &str) -> RecordedRequest {
        RecordedRequest {
            http_method: "GET".to_string(),
            scheme: None,
            uri: uri.to_string(),
            query_string: None,
            headers: Default::default(),
            version: "1.1".to_string(),
            body: String::new(),
        }
    }

    async fn body_of(resp: Response<ResponseBody>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_bad_status() {
        let resp = handle_bad_status();
        assert_eq!(resp.status().as_u16(), 700);
        assert_eq!(
            resp.extensions().get::<ReasonPhrase>().unwrap().as_bytes(),
            b"BAD"
        );
        assert_eq!(body_of(resp).await, Bytes::from("Body of response"));
    }

    #[tokio::test]
    async fn test_perf() {
        let resp = handle_perf();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await.len(), 16);
    }

    #[test]
    fn test_garbage_arms_escape() {
        let escape = RawEscape::default();
        let resp = handle_garbage(&escape);
        assert!(escape.is_armed());
        assert_eq!(resp.headers()["connection"], "close");
    }

    #[test]
    fn test_enqueue_empty_body_is_rejected() {
        let ctx = context();
        ctx.state
            .replace_responses(QueuedResponse::parse_batch(br#"[{"status": 201}]"#).unwrap());

        let resp = handle_enqueue_responses(&put_responses(""), &ctx);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.state.pending_responses(), 1);
    }

    #[test]
    fn test_enqueue_invalid_payload_leaves_queue() {
        let ctx = context();
        ctx.state
            .replace_responses(QueuedResponse::parse_batch(br#"[{"status": 201}]"#).unwrap());

        let resp = handle_enqueue_responses(&put_responses("{not json"), &ctx);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.state.pending_responses(), 1);
    }

    #[test]
    fn test_enqueue_replaces_queue() {
        let ctx = context();
        let first = handle_enqueue_responses(&put_responses(r#"[{"status": 201}, {"status": 202}]"#), &ctx);
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(ctx.state.pending_responses(), 2);

        let second = handle_enqueue_responses(&put_responses(r#"[{"status": 204}]"#), &ctx);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(ctx.state.pending_responses(), 1);
    }

    #[tokio::test]
    async fn test_list_and_flush_requests() {
        let ctx = context();
        ctx.state
            .replace_responses(QueuedResponse::parse_batch(br#"[{}, {}]"#).unwrap());
        ctx.state.dispatch(|| recorded("/a"));
        ctx.state.dispatch(|| recorded("/b"));

        let listed: Vec<RecordedRequest> =
            serde_json::from_slice(&body_of(handle_list_requests(&ctx)).await).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].uri, "/a");

        assert_eq!(handle_flush_requests(&ctx).status(), StatusCode::OK);
        let listed = body_of(handle_list_requests(&ctx)).await;
        assert_eq!(listed, Bytes::from("[]"));
    }

    #[test]
    fn test_shutdown_cancels_token() {
        let ctx = context();
        let token = ctx.shutdown_token();
        let resp = handle_shutdown(&ctx);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["connection"], "close");
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_streams_in_two_parts() {
        let ctx = context();
        let resp = handle_read_timeout(&ctx);
        assert_eq!(resp.status(), StatusCode::OK);

        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first, Bytes::from("sleeping 60 seconds ...\n"));

        let started = tokio::time::Instant::now();
        let second = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(second, Bytes::from("slept 60 seconds\n"));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(body.frame().await.is_none());
    }
}
