//! Answer ordinary requests from the response queue.

use crate::response::{build_response, full, with_reason, ResponseBody};
use crate::server::ServerState;
use crate::types::{InboundRequest, QueuedResponse};
use hyper::{Response, StatusCode};
use tracing::{debug, warn};

/// Body sent when a request arrives and nothing is queued
pub const EMPTY_QUEUE_MESSAGE: &str = "No responses in queue";

/// Pop the next canned response for `request`, recording the request.
///
/// An empty queue yields `500` and leaves the request log untouched.
pub fn dispatch(request: &InboundRequest, state: &ServerState) -> Response<ResponseBody> {
    match state.dispatch(|| request.to_recorded()) {
        Some(queued) => {
            debug!(
                "{} {} -> {} ({} bytes)",
                request.method,
                request.target(),
                queued.status,
                queued.body.len()
            );
            render(queued)
        }
        None => {
            warn!("No responses queued for {} {}", request.method, request.target());
            build_response(StatusCode::INTERNAL_SERVER_ERROR, EMPTY_QUEUE_MESSAGE)
        }
    }
}

/// Turn a validated queue entry into a hyper response
pub fn render(queued: QueuedResponse) -> Response<ResponseBody> {
    let mut response = Response::new(full(queued.body));
    *response.status_mut() = queued.status;

    let headers = response.headers_mut();
    for (name, value) in queued.headers {
        headers.append(name, value);
    }

    match queued.reason {
        Some(ref reason) => with_reason(response, reason),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use hyper::ext::ReasonPhrase;
    use hyper::{HeaderMap, Method, Version};

    fn get(path: &str) -> InboundRequest {
        InboundRequest {
            method: Method::GET,
            scheme: None,
            path: path.to_string(),
            query: Some("a=1".to_string()),
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_queue_is_500_and_not_recorded() {
        let state = ServerState::new();
        let resp = dispatch(&get("/anything"), &state);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(EMPTY_QUEUE_MESSAGE));
        assert_eq!(state.request_count(), 0);
    }

    #[tokio::test]
    async fn test_queued_response_is_rendered() {
        let state = ServerState::new();
        state.replace_responses(
            QueuedResponse::parse_batch(
                br#"[{"status": 200, "reason": "OK", "headers": {"X": "Y"}, "body": "aGk="}]"#,
            )
            .unwrap(),
        );

        let resp = dispatch(&get("/path"), &state);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x"], "Y");
        assert_eq!(
            resp.extensions().get::<ReasonPhrase>().unwrap().as_bytes(),
            b"OK"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("hi"));

        let log = state.requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].uri, "/path");
        assert_eq!(log[0].query_string.as_deref(), Some("a=1"));
    }

    #[test]
    fn test_custom_reason_on_unusual_status() {
        let queued = QueuedResponse::parse_batch(br#"[{"status": 299, "reason": "Odd"}]"#)
            .unwrap()
            .remove(0);
        let resp = render(queued);
        assert_eq!(resp.status().as_u16(), 299);
        assert_eq!(
            resp.extensions().get::<ReasonPhrase>().unwrap().as_bytes(),
            b"Odd"
        );
    }
}
