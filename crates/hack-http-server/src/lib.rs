//! Programmable HTTP test double.
//!
//! Every inbound request is recorded and answered with the next canned
//! response from an operator-supplied queue. A control plane under
//! `/hack-http-server` (served on the same port) enqueues responses, lists
//! and flushes recorded requests, injects malformed or slow responses and
//! shuts the server down. Paths under `/secure/by-digest` are guarded by a
//! Digest challenge before they reach the rest of the pipeline.

pub mod auth;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod response;
pub mod server;
pub mod types;

pub use config::ServerConfig;
pub use server::{Server, ServerContext, ServerError};
