//! Authentication gate in front of the control router and the dispatcher.

use super::{AuthError, AuthScheme, ChallengeKey, ChallengeRegistry, Qop, Verdict};
use crate::config::AuthConfig;
use crate::response::{build_response, build_response_with_headers, with_reason, ResponseBody};
use crate::types::InboundRequest;
use bytes::Bytes;
use hyper::{Response, StatusCode};
use tracing::{debug, warn};

const DIGEST_AREA_PREFIX: &str = "/secure/by-digest";
const QOP_SEGMENT_PREFIX: &str = "/qop-";

/// A path under `/secure/by-digest[/qop-<mode>]/<rest>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredArea {
    pub scheme: AuthScheme,
    /// Raw `<mode>` from the path; empty or absent means no qop
    pub qop_mode: Option<String>,
    /// Path the request is redispatched to once authenticated
    pub rest: String,
}

impl SecuredArea {
    /// Recognize a secured path. The qop segment only counts when something
    /// follows it, so `/secure/by-digest/qop-auth` is a plain digest path
    /// whose rest is `/qop-auth`.
    pub fn parse(path: &str) -> Option<Self> {
        let after_scheme = path.strip_prefix(DIGEST_AREA_PREFIX)?;
        if !after_scheme.starts_with('/') {
            return None;
        }

        if let Some(after_qop) = after_scheme.strip_prefix(QOP_SEGMENT_PREFIX) {
            if let Some(slash) = after_qop.find('/') {
                return Some(Self {
                    scheme: AuthScheme::Digest,
                    qop_mode: Some(after_qop[..slash].to_string()),
                    rest: after_qop[slash..].to_string(),
                });
            }
        }

        Some(Self {
            scheme: AuthScheme::Digest,
            qop_mode: None,
            rest: after_scheme.to_string(),
        })
    }

    pub fn challenge_key(&self) -> Result<ChallengeKey, AuthError> {
        let qop = match self.qop_mode {
            Some(ref mode) => Qop::from_mode(mode)?,
            None => None,
        };
        Ok(ChallengeKey {
            scheme: self.scheme,
            qop,
        })
    }
}

/// What the gate decided for a request
pub enum GateOutcome {
    /// Continue to the control router or dispatcher
    Forward,
    /// Answer immediately; the request goes no further
    Reject(Response<ResponseBody>),
}

/// Guards the secured area with challenge/response authentication
pub struct AuthGate {
    registry: ChallengeRegistry,
}

impl AuthGate {
    pub fn new(credentials: AuthConfig) -> Self {
        Self {
            registry: ChallengeRegistry::new(credentials),
        }
    }

    pub fn registry(&self) -> &ChallengeRegistry {
        &self.registry
    }

    /// Admit or reject `request`.
    ///
    /// Paths outside the secured area pass untouched. Authenticated requests
    /// have the secured-area prefix stripped from their path.
    pub fn admit(&self, request: &mut InboundRequest) -> GateOutcome {
        let Some(area) = SecuredArea::parse(&request.path) else {
            return GateOutcome::Forward;
        };

        let handler = match area
            .challenge_key()
            .and_then(|key| self.registry.resolve(key))
        {
            Ok(handler) => handler,
            Err(e) => {
                warn!(path = %request.path, "Cannot authenticate secured request: {}", e);
                return GateOutcome::Reject(not_implemented());
            }
        };

        match handler.verify(request) {
            Verdict::Granted => {
                debug!(from = %request.path, to = %area.rest, "Authenticated secured request");
                request.path = area.rest;
                GateOutcome::Forward
            }
            Verdict::Challenge(challenge) => GateOutcome::Reject(build_response_with_headers(
                StatusCode::UNAUTHORIZED,
                [
                    ("WWW-Authenticate", challenge.as_str()),
                    ("Content-Type", "text/plain"),
                ],
                "401 Unauthorized",
            )),
        }
    }
}

fn not_implemented() -> Response<ResponseBody> {
    with_reason(
        build_response(StatusCode::NOT_IMPLEMENTED, Bytes::new()),
        "HTTP authentication not implemented",
    )
}
