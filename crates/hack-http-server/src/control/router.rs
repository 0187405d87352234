//! Route dispatch for the control plane.

use super::handlers;
use crate::response::{not_found, ResponseBody};
use crate::server::{RawEscape, ServerContext};
use crate::types::InboundRequest;
use hyper::{Method, Response};
use tracing::debug;

/// Path prefix reserved for control operations
pub const CONTROL_PREFIX: &str = "/hack-http-server";

/// Whether `path` is the control root or below it
pub fn is_control_path(path: &str) -> bool {
    match path.strip_prefix(CONTROL_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The fixed set of control operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRoute {
    /// GET .../garbage
    Garbage,
    /// GET .../bad-status
    BadStatus,
    /// GET .../perf
    Perf,
    /// DELETE .../requests
    FlushRequests,
    /// DELETE on the control root
    Shutdown,
    /// GET .../requests
    ListRequests,
    /// GET .../read-timeout
    ReadTimeout,
    /// PUT .../responses
    EnqueueResponses,
}

impl ControlRoute {
    /// Match method and exact path; `None` for anything unrecognized
    pub fn parse(method: &Method, path: &str) -> Option<Self> {
        let rest = path.strip_prefix(CONTROL_PREFIX)?;
        match (method, rest) {
            (&Method::GET, "/garbage") => Some(ControlRoute::Garbage),
            (&Method::GET, "/bad-status") => Some(ControlRoute::BadStatus),
            (&Method::GET, "/perf") => Some(ControlRoute::Perf),
            (&Method::DELETE, "/requests") => Some(ControlRoute::FlushRequests),
            (&Method::DELETE, "") => Some(ControlRoute::Shutdown),
            (&Method::GET, "/requests") => Some(ControlRoute::ListRequests),
            (&Method::GET, "/read-timeout") => Some(ControlRoute::ReadTimeout),
            (&Method::PUT, "/responses") => Some(ControlRoute::EnqueueResponses),
            _ => None,
        }
    }
}

/// Execute the control operation named by `request`
pub fn route_control(
    request: &InboundRequest,
    context: &ServerContext,
    escape: &RawEscape,
) -> Response<ResponseBody> {
    debug!("Control: {} {}", request.method, request.path);

    let Some(route) = ControlRoute::parse(&request.method, &request.path) else {
        debug!("No control operation for {} {}", request.method, request.path);
        return not_found();
    };

    match route {
        ControlRoute::Garbage => handlers::handle_garbage(escape),
        ControlRoute::BadStatus => handlers::handle_bad_status(),
        ControlRoute::Perf => handlers::handle_perf(),
        ControlRoute::FlushRequests => handlers::handle_flush_requests(context),
        ControlRoute::Shutdown => handlers::handle_shutdown(context),
        ControlRoute::ListRequests => handlers::handle_list_requests(context),
        ControlRoute::ReadTimeout => handlers::handle_read_timeout(context),
        ControlRoute::EnqueueResponses => handlers::handle_enqueue_responses(request, context),
    }
}
