//! Wire and in-memory types: queued responses, recorded requests and the
//! fully-buffered inbound request every component works on.

use base64::Engine;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, StatusCode, Version};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

// ============================================================================
// Queued Responses
// ============================================================================

/// Errors raised while parsing a `PUT .../responses` payload
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid status code {0}")]
    Status(u16),
    #[error("Invalid reason phrase {0:?}")]
    Reason(String),
    #[error("Invalid header {0:?}")]
    Header(String),
    #[error("Response body is not valid base64: {0}")]
    Body(#[from] base64::DecodeError),
}

/// Canned response waiting in the queue.
///
/// Validated when it is enqueued so that dispatching it can never fail.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "QueuedResponseRaw")]
pub struct QueuedResponse {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl QueuedResponse {
    /// Parse a JSON array of responses, decoding base64 bodies.
    pub fn parse_batch(payload: &[u8]) -> Result<Vec<QueuedResponse>, PayloadError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Raw JSON shape of one queued response
#[derive(Debug, Clone, Deserialize)]
struct QueuedResponseRaw {
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    headers: HashMap<String, HeaderValueRaw>,
    #[serde(default)]
    body: Option<String>,
}

fn default_status() -> u16 {
    200
}

/// Header values arrive as strings, but numbers and booleans are accepted
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum HeaderValueRaw {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl HeaderValueRaw {
    fn into_text(self) -> String {
        match self {
            HeaderValueRaw::Text(s) => s,
            HeaderValueRaw::Number(n) => n.to_string(),
            HeaderValueRaw::Flag(b) => b.to_string(),
        }
    }
}

impl TryFrom<QueuedResponseRaw> for QueuedResponse {
    type Error = PayloadError;

    fn try_from(raw: QueuedResponseRaw) -> Result<Self, Self::Error> {
        // Informational codes cannot be a final response on HTTP/1.1
        let status = StatusCode::from_u16(raw.status)
            .ok()
            .filter(|status| !status.is_informational())
            .ok_or(PayloadError::Status(raw.status))?;

        if let Some(ref reason) = raw.reason {
            if hyper::ext::ReasonPhrase::try_from(reason.clone()).is_err() {
                return Err(PayloadError::Reason(reason.clone()));
            }
        }

        let mut headers = Vec::with_capacity(raw.headers.len());
        for (name, value) in raw.headers {
            let value = value.into_text();
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| PayloadError::Header(name.clone()))?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|_| PayloadError::Header(name.clone()))?;
            headers.push((header_name, header_value));
        }

        let body = match raw.body {
            Some(encoded) if !encoded.is_empty() => {
                Bytes::from(base64::engine::general_purpose::STANDARD.decode(encoded)?)
            }
            _ => Bytes::new(),
        };

        Ok(Self {
            status,
            reason: raw.reason,
            headers,
            body,
        })
    }
}

// ============================================================================
// Recorded Requests
// ============================================================================

/// A request that was answered from the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub http_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    pub uri: String,
    pub query_string: Option<String>,
    pub headers: HashMap<String, String>,
    pub version: String,
    pub body: String,
}

// ============================================================================
// Inbound Requests
// ============================================================================

/// A request whose body has been received in full.
///
/// `path` is the effective path: the auth gate rewrites it when it strips a
/// secured-area prefix.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub scheme: Option<String>,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub version: Version,
    pub body: Bytes,
}

impl InboundRequest {
    /// Read the whole body of a hyper request
    pub async fn receive(req: Request<Incoming>) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        Ok(Self {
            method: parts.method,
            scheme: parts.uri.scheme_str().map(str::to_string),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            version: parts.version,
            body,
        })
    }

    /// Path plus query string, as it appeared on the request line
    pub fn target(&self) -> String {
        match self.query {
            Some(ref query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Body decoded as text (invalid UTF-8 is replaced)
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Single header value as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Headers keyed by lower-case name, repeated headers joined with `, `
    pub fn collapsed_headers(&self) -> HashMap<String, String> {
        let mut collapsed = HashMap::with_capacity(self.headers.keys_len());
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            collapsed.insert(name.as_str().to_string(), joined);
        }
        collapsed
    }

    /// Snapshot for the request log
    pub fn to_recorded(&self) -> RecordedRequest {
        RecordedRequest {
            http_method: self.method.to_string(),
            scheme: self.scheme.clone(),
            uri: self.path.clone(),
            query_string: self.query.clone(),
            headers: self.collapsed_headers(),
            version: version_str(self.version).to_string(),
            body: self.body_text().into_owned(),
        }
    }
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(method: Method, path: &str, query: Option<&str>, body: &str) -> InboundRequest {
        InboundRequest {
            method,
            scheme: None,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_parse_batch_decodes_base64_body() {
        let payload = br#"[{"status": 200, "reason": "OK", "headers": {"X": "1"}, "body": "aGk="}]"#;
        let responses = QueuedResponse::parse_batch(payload).unwrap();
        assert_eq!(responses.len(), 1);
        let response = &responses[0];
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.reason.as_deref(), Some("OK"));
        assert_eq!(response.headers[0].0, "x");
        assert_eq!(response.headers[0].1, "1");
        assert_eq!(response.body, Bytes::from("hi"));
    }

    #[test]
    fn test_parse_batch_defaults() {
        let responses = QueuedResponse::parse_batch(br#"[{}]"#).unwrap();
        assert_eq!(responses[0].status, StatusCode::OK);
        assert!(responses[0].reason.is_none());
        assert!(responses[0].headers.is_empty());
        assert!(responses[0].body.is_empty());
    }

    #[test]
    fn test_parse_batch_empty_and_null_body() {
        let responses =
            QueuedResponse::parse_batch(br#"[{"status": 204, "body": ""}, {"status": 201, "body": null}]"#)
                .unwrap();
        assert!(responses[0].body.is_empty());
        assert!(responses[1].body.is_empty());
        assert_eq!(responses[1].status, StatusCode::CREATED);
    }

    #[test]
    fn test_parse_batch_stringifies_scalar_header_values() {
        let responses = QueuedResponse::parse_batch(
            br#"[{"headers": {"Content-Length": 2, "X-Flag": true}, "body": "aGk="}]"#,
        )
        .unwrap();
        let headers: HashMap<String, String> = responses[0]
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(headers["content-length"], "2");
        assert_eq!(headers["x-flag"], "true");
    }

    #[test]
    fn test_parse_batch_accepts_unusual_status() {
        let responses = QueuedResponse::parse_batch(br#"[{"status": 799}]"#).unwrap();
        assert_eq!(responses[0].status.as_u16(), 799);
    }

    #[test]
    fn test_parse_batch_rejects_informational_status() {
        for status in [100, 101, 103, 199] {
            let payload = format!(r#"[{{"status": {status}, "reason": "Early Hints"}}]"#);
            let err = QueuedResponse::parse_batch(payload.as_bytes()).unwrap_err();
            assert!(
                err.to_string().contains(&format!("Invalid status code {status}")),
                "{err}"
            );
        }
        assert!(QueuedResponse::parse_batch(br#"[{"status": 200}]"#).is_ok());
    }

    #[test]
    fn test_parse_batch_rejects_invalid_payloads() {
        assert!(QueuedResponse::parse_batch(b"not json").is_err());
        assert!(QueuedResponse::parse_batch(br#"{"status": 200}"#).is_err());
        assert!(QueuedResponse::parse_batch(br#"[{"status": 42}]"#).is_err());
        assert!(QueuedResponse::parse_batch(br#"[{"body": "!!not base64!!"}]"#).is_err());
        assert!(QueuedResponse::parse_batch(br#"[{"headers": {"bad name": "x"}}]"#).is_err());
        assert!(QueuedResponse::parse_batch(br#"[{"reason": "line\nbreak"}]"#).is_err());
    }

    #[test]
    fn test_parse_batch_preserves_order() {
        let responses =
            QueuedResponse::parse_batch(br#"[{"status": 201}, {"status": 202}, {"status": 203}]"#)
                .unwrap();
        let statuses: Vec<u16> = responses.iter().map(|r| r.status.as_u16()).collect();
        assert_eq!(statuses, vec![201, 202, 203]);
    }

    #[test]
    fn test_to_recorded() {
        let mut request = inbound(Method::POST, "/foo/bar", Some("a=1&b=2"), "payload");
        request
            .headers
            .insert("Content-Type", HeaderValue::from_static("text/plain"));
        request
            .headers
            .append("Accept", HeaderValue::from_static("text/html"));
        request
            .headers
            .append("Accept", HeaderValue::from_static("application/json"));

        let recorded = request.to_recorded();
        assert_eq!(recorded.http_method, "POST");
        assert_eq!(recorded.uri, "/foo/bar");
        assert_eq!(recorded.query_string.as_deref(), Some("a=1&b=2"));
        assert_eq!(recorded.version, "1.1");
        assert_eq!(recorded.body, "payload");
        assert_eq!(recorded.headers["content-type"], "text/plain");
        assert_eq!(recorded.headers["accept"], "text/html, application/json");
    }

    #[test]
    fn test_recorded_request_json_shape() {
        let recorded = inbound(Method::GET, "/", None, "").to_recorded();
        let json = serde_json::to_value(&recorded).unwrap();
        assert_eq!(json["http_method"], "GET");
        assert_eq!(json["uri"], "/");
        assert!(json["query_string"].is_null());
        assert!(json.get("scheme").is_none());
        assert_eq!(json["body"], "");
    }

    #[test]
    fn test_target_and_body_text() {
        let request = inbound(Method::GET, "/path", Some("x=y"), "");
        assert_eq!(request.target(), "/path?x=y");

        let mut binary = inbound(Method::PUT, "/bin", None, "");
        binary.body = Bytes::from_static(&[0x68, 0x69, 0xff]);
        assert_eq!(binary.body_text(), "hi\u{fffd}");
    }
}
