//! Digest challenge/response (RFC 2617, MD5).

use super::{split_authorization, AuthScheme, ChallengeHandler, Qop, Verdict};
use crate::config::AuthConfig;
use crate::types::InboundRequest;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Issued nonces remembered per handler; older ones are forgotten
const NONCE_HISTORY: usize = 256;

/// Lower-case hex MD5 of `input`
pub fn md5_hex(input: impl AsRef<[u8]>) -> String {
    format!("{:x}", Md5::digest(input.as_ref()))
}

#[derive(Debug)]
struct IssuedNonce {
    value: String,
    /// Highest nonce count accepted so far (qop modes only)
    last_count: u64,
}

/// Digest authentication for one realm, credential pair and qop mode
pub struct DigestChallenge {
    credentials: AuthConfig,
    qop: Option<Qop>,
    /// MD5(login:realm:password)
    ha1: String,
    nonces: Mutex<VecDeque<IssuedNonce>>,
}

impl DigestChallenge {
    pub fn new(credentials: AuthConfig, qop: Option<Qop>) -> Self {
        let ha1 = md5_hex(format!(
            "{}:{}:{}",
            credentials.login, credentials.realm, credentials.password
        ));
        Self {
            credentials,
            qop,
            ha1,
            nonces: Mutex::new(VecDeque::new()),
        }
    }

    /// Build a fresh `WWW-Authenticate` value with a newly issued nonce
    pub fn challenge_header(&self) -> String {
        let nonce = self.issue_nonce();
        let mut header = format!("Digest realm=\"{}\"", self.credentials.realm);
        if let Some(qop) = self.qop {
            header.push_str(&format!(", qop=\"{}\"", qop.as_str()));
        }
        header.push_str(&format!(", nonce=\"{nonce}\", algorithm=MD5, stale=false"));
        header
    }

    fn issue_nonce(&self) -> String {
        let value = format!("{:032x}", rand::random::<u128>());
        let mut nonces = self.nonces.lock();
        if nonces.len() >= NONCE_HISTORY {
            nonces.pop_front();
        }
        nonces.push_back(IssuedNonce {
            value: value.clone(),
            last_count: 0,
        });
        value
    }

    /// Check the request's `Authorization` header against our credentials
    fn authorize(&self, request: &InboundRequest) -> Result<(), &'static str> {
        let header = request
            .header("authorization")
            .ok_or("missing Authorization header")?;
        let (scheme, params) = split_authorization(header).ok_or("empty Authorization header")?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err("not a Digest authorization");
        }
        let params = parse_params(params);
        let param = |name: &'static str| params.get(name).map(String::as_str).ok_or(name);

        if param("username").map_err(|_| "missing username")? != self.credentials.login {
            return Err("unknown user");
        }
        if param("realm").map_err(|_| "missing realm")? != self.credentials.realm {
            return Err("wrong realm");
        }
        if let Ok(algorithm) = param("algorithm") {
            if !algorithm.eq_ignore_ascii_case("md5") {
                return Err("unsupported algorithm");
            }
        }

        let uri = param("uri").map_err(|_| "missing uri")?;
        if uri != request.target() && uri != request.path {
            return Err("uri does not match request");
        }
        let nonce = param("nonce").map_err(|_| "missing nonce")?;
        let response = param("response").map_err(|_| "missing response")?;

        let ha2 = match self.qop {
            Some(Qop::AuthInt) => md5_hex(format!(
                "{}:{}:{}",
                request.method,
                uri,
                md5_hex(&request.body)
            )),
            _ => md5_hex(format!("{}:{}", request.method, uri)),
        };

        let mut nonces = self.nonces.lock();
        let issued = nonces
            .iter_mut()
            .find(|n| n.value == nonce)
            .ok_or("unknown nonce")?;

        match self.qop {
            Some(qop) => {
                if param("qop").map_err(|_| "missing qop")? != qop.as_str() {
                    return Err("qop mismatch");
                }
                let nc = param("nc").map_err(|_| "missing nc")?;
                let cnonce = param("cnonce").map_err(|_| "missing cnonce")?;
                let count = u64::from_str_radix(nc, 16).map_err(|_| "invalid nc")?;
                if count <= issued.last_count {
                    return Err("replayed nonce count");
                }

                let expected = md5_hex(format!(
                    "{}:{}:{}:{}:{}:{}",
                    self.ha1,
                    nonce,
                    nc,
                    cnonce,
                    qop.as_str(),
                    ha2
                ));
                if !expected.eq_ignore_ascii_case(response) {
                    return Err("wrong response digest");
                }
                issued.last_count = count;
            }
            None => {
                if params.contains_key("qop") {
                    return Err("qop not offered");
                }
                let expected = md5_hex(format!("{}:{}:{}", self.ha1, nonce, ha2));
                if !expected.eq_ignore_ascii_case(response) {
                    return Err("wrong response digest");
                }
            }
        }
        Ok(())
    }
}

impl ChallengeHandler for DigestChallenge {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Digest
    }

    fn verify(&self, request: &InboundRequest) -> Verdict {
        match self.authorize(request) {
            Ok(()) => Verdict::Granted,
            Err(reason) => {
                debug!(path = %request.path, reason, "Digest authorization rejected");
                Verdict::Challenge(self.challenge_header())
            }
        }
    }
}

/// Parse `key=value, key="quoted, value"` pairs; keys are lower-cased
pub(crate) fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if !key.is_empty() {
                params.insert(key, value.trim().to_string());
            }
        }
    }
    params
}
