//! Basic challenge/response.

use super::{split_authorization, AuthScheme, ChallengeHandler, Verdict};
use crate::config::AuthConfig;
use crate::types::InboundRequest;
use base64::Engine;

/// Basic authentication for one realm and credential pair
pub struct BasicChallenge {
    credentials: AuthConfig,
}

impl BasicChallenge {
    pub fn new(credentials: AuthConfig) -> Self {
        Self { credentials }
    }

    pub fn challenge_header(&self) -> String {
        format!("Basic realm=\"{}\"", self.credentials.realm)
    }

    fn authorized(&self, request: &InboundRequest) -> bool {
        let Some((scheme, token)) = request.header("authorization").and_then(split_authorization)
        else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(token.trim()) else {
            return false;
        };
        let decoded = String::from_utf8_lossy(&decoded);
        match decoded.split_once(':') {
            Some((login, password)) => {
                login == self.credentials.login && password == self.credentials.password
            }
            None => false,
        }
    }
}

impl ChallengeHandler for BasicChallenge {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Basic
    }

    fn verify(&self, request: &InboundRequest) -> Verdict {
        if self.authorized(request) {
            Verdict::Granted
        } else {
            Verdict::Challenge(self.challenge_header())
        }
    }
}
