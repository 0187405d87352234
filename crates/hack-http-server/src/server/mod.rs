//! Listener, per-connection serving and shutdown.

mod io;
mod state;

pub use io::{EscapableStream, RawEscape};
pub use state::ServerState;

use crate::auth::{AuthGate, ChallengeRegistry, GateOutcome};
use crate::config::ServerConfig;
use crate::control::{is_control_path, route_control};
use crate::dispatch::dispatch;
use crate::response::{build_response, ResponseBody};
use crate::types::InboundRequest;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Server lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a request handler can reach
pub struct ServerContext {
    pub config: ServerConfig,
    pub state: ServerState,
    pub gate: AuthGate,
    shutdown: CancellationToken,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let gate = AuthGate::new(config.auth.clone());
        Self {
            config,
            state: ServerState::new(),
            gate,
            shutdown: CancellationToken::new(),
        }
    }

    /// Ask the server to stop accepting connections
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// A bound, not yet running, server
pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
    tracker: TaskTracker,
}

impl Server {
    /// Bind the configured address. Port 0 picks an ephemeral port.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            context: Arc::new(ServerContext::new(config)),
            tracker: TaskTracker::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.context)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.context.shutdown_token()
    }

    /// Serve until shutdown is requested.
    ///
    /// The listener is closed as soon as shutdown starts; connections still
    /// in flight get up to the configured grace period to finish.
    pub async fn run(self) {
        let Server {
            listener,
            context,
            tracker,
        } = self;
        let shutdown = context.shutdown_token();

        match listener.local_addr() {
            Ok(addr) => info!(
                http_auth = ChallengeRegistry::is_available(),
                "hack-http-server listening on http://{}",
                addr
            ),
            Err(e) => warn!("hack-http-server listening (address unknown: {})", e),
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("Accepted connection from {}", peer);
                            tracker.spawn(serve_connection(stream, Arc::clone(&context)));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, closing listener");
                    break;
                }
            }
        }

        drop(listener);
        tracker.close();

        let grace = context.config.shutdown_grace();
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                "{} connection(s) still open after {:?}, abandoning them",
                tracker.len(),
                grace
            );
        }
        info!("hack-http-server stopped");
    }
}

async fn serve_connection(stream: TcpStream, context: Arc<ServerContext>) {
    let shutdown = context.shutdown_token();
    let (stream, escape) = EscapableStream::new(stream);
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| {
        let context = Arc::clone(&context);
        let escape = escape.clone();
        async move { handle_request(req, &context, &escape).await }
    });

    // Queued header names go out as `X-Custom-Header`, not lower-cased
    let conn = http1::Builder::new()
        .title_case_headers(true)
        .serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.cancelled() => {
            // Finish the response in flight, then close
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        debug!("Connection error: {}", e);
    }
}

/// Authenticate, then route to the control plane or the response queue
pub async fn handle_request(
    req: Request<Incoming>,
    context: &ServerContext,
    escape: &RawEscape,
) -> Result<Response<ResponseBody>, Infallible> {
    let mut request = match InboundRequest::receive(req).await {
        Ok(request) => request,
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return Ok(build_response(StatusCode::BAD_REQUEST, Bytes::new()));
        }
    };

    if let GateOutcome::Reject(response) = context.gate.admit(&mut request) {
        return Ok(response);
    }

    if is_control_path(&request.path) {
        return Ok(route_control(&request, context, escape));
    }

    Ok(dispatch(&request, &context.state))
}
