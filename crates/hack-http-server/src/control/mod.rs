//! Control plane served under `/hack-http-server`.
//!
//! - `DELETE /hack-http-server/requests`: flush the request log
//! - `DELETE /hack-http-server`: shut the server down
//! - `GET /hack-http-server/requests`: list recorded requests
//! - `PUT /hack-http-server/responses`: replace the response queue
//! - `GET /hack-http-server/{garbage,bad-status,perf,read-timeout}`: fault
//!   injection and utility endpoints
//!
//! Anything else under the prefix gets a 404.

mod handlers;
mod router;

pub use router::{is_control_path, route_control, ControlRoute, CONTROL_PREFIX};
