//! HTTP challenge/response authentication for the secured area.
//!
//! - `gate`: recognizes `/secure/by-digest[/qop-<mode>]/<rest>` paths and
//!   runs the challenge before the request goes any further
//! - `registry`: lazily builds one challenge handler per scheme and qop
//! - `digest` / `basic`: the challenge handlers themselves
//!
//! The handlers are only compiled with the `http-auth` feature. Without it
//! the registry reports the capability as unavailable and the gate answers
//! secured requests with 501.

#[cfg(feature = "http-auth")]
mod basic;
#[cfg(feature = "http-auth")]
mod digest;
mod gate;
mod registry;

#[cfg(feature = "http-auth")]
pub use basic::BasicChallenge;
#[cfg(feature = "http-auth")]
pub use digest::{md5_hex, DigestChallenge};
pub use gate::{AuthGate, GateOutcome, SecuredArea};
pub use registry::ChallengeRegistry;

use crate::types::InboundRequest;

/// Authentication schemes a challenge handler can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// Digest quality of protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qop {
    Auth,
    AuthInt,
}

impl Qop {
    /// Parse the `<mode>` of a `/qop-<mode>` path segment; empty means none
    pub fn from_mode(mode: &str) -> Result<Option<Qop>, AuthError> {
        match mode {
            "" => Ok(None),
            "auth" => Ok(Some(Qop::Auth)),
            "auth-int" => Ok(Some(Qop::AuthInt)),
            other => Err(AuthError::UnsupportedQop(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        }
    }
}

/// Identifies one challenge handler in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeKey {
    pub scheme: AuthScheme,
    pub qop: Option<Qop>,
}

/// Why a challenge handler could not be provided
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP authentication not implemented")]
    Unavailable,
    #[error("Unsupported qop mode '{0}'")]
    UnsupportedQop(String),
}

/// Result of checking a request's credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    /// Credentials missing or wrong; carries the `WWW-Authenticate` value
    Challenge(String),
}

/// A challenge/response protocol bound to one realm and set of credentials
pub trait ChallengeHandler: Send + Sync {
    fn scheme(&self) -> AuthScheme;

    fn verify(&self, request: &InboundRequest) -> Verdict;
}

/// Split an `Authorization` header into its scheme and parameter string
pub(crate) fn split_authorization(value: &str) -> Option<(&str, &str)> {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) => Some((scheme, rest.trim_start())),
        None if !value.is_empty() => Some((value, "")),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qop_from_mode() {
        assert_eq!(Qop::from_mode(""), Ok(None));
        assert_eq!(Qop::from_mode("auth"), Ok(Some(Qop::Auth)));
        assert_eq!(Qop::from_mode("auth-int"), Ok(Some(Qop::AuthInt)));
        assert_eq!(
            Qop::from_mode("auth-conf"),
            Err(AuthError::UnsupportedQop("auth-conf".to_string()))
        );
    }

    #[test]
    fn test_split_authorization() {
        assert_eq!(
            split_authorization("Digest username=\"me\""),
            Some(("Digest", "username=\"me\""))
        );
        assert_eq!(split_authorization("Basic   bWU6dGVzdA=="), Some(("Basic", "bWU6dGVzdA==")));
        assert_eq!(split_authorization("Negotiate"), Some(("Negotiate", "")));
        assert_eq!(split_authorization("   "), None);
    }
}
