//! HTTP Peer Server
//!
//! Server side of the peer transport. Answers
//! `GET <base><group>/<key>` with the protobuf-encoded value, looking the
//! key up through the named group of a [`GroupRegistry`].
//!
//! Group lookups block (backing stores, peer fetches, coalescing waits), so
//! each one runs on the blocking thread pool.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::http::DEFAULT_BASE_PATH;
use super::proto;
use crate::error::{Error, Result};
use crate::group::GroupRegistry;

type HttpResponse = Response<Full<Bytes>>;

/// Shared handler state
struct Handler {
    base_path: String,
    registry: Arc<GroupRegistry>,
}

/// Serves peer lookups for every group of a registry
pub struct PeerServer {
    listener: TcpListener,
    handler: Arc<Handler>,
}

impl PeerServer {
    /// Bind the server to `addr`
    pub async fn bind(
        addr: &str,
        base_path: impl Into<String>,
        registry: Arc<GroupRegistry>,
    ) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid peer server address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind peer server: {}", e)))?;

        Ok(Self {
            listener,
            handler: Arc::new(Handler {
                base_path: base_path.into(),
                registry,
            }),
        })
    }

    /// Bind with the default base path
    pub async fn bind_default(addr: &str, registry: Arc<GroupRegistry>) -> Result<Self> {
        Self::bind(addr, DEFAULT_BASE_PATH, registry).await
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Internal(format!("Peer server has no local address: {}", e)))
    }

    /// Accept connections until an accept error occurs
    pub async fn run(self) -> Result<()> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            base_path = %self.handler.base_path,
            "Peer server listening"
        );

        loop {
            let (stream, remote) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Internal(format!("Peer server accept error: {}", e)))?;

            let io = TokioIo::new(stream);
            let handler = Arc::clone(&self.handler);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, std::convert::Infallible>(handler.handle(req).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(%remote, "Peer server connection error: {}", e);
                }
            });
        }
    }
}

impl Handler {
    async fn handle(&self, req: Request<Incoming>) -> HttpResponse {
        let path = req.uri().path().to_string();
        drop(req);
        debug!(path = %path, "peer request");

        let (group_name, key) = match parse_path(&self.base_path, &path) {
            Some(parsed) => parsed,
            None => {
                return text(
                    StatusCode::BAD_REQUEST,
                    format!("bad request: expected {}<group>/<key>", self.base_path),
                )
            }
        };

        let group = match self.registry.get(&group_name) {
            Some(group) => group,
            None => {
                return text(
                    StatusCode::NOT_FOUND,
                    Error::GroupNotFound(group_name).to_string(),
                )
            }
        };

        let lookup = tokio::task::spawn_blocking(move || group.get(&key)).await;
        match lookup {
            Ok(Ok(value)) => {
                let body = proto::Response {
                    value: value.to_vec(),
                }
                .to_bytes();
                respond(
                    StatusCode::OK,
                    "application/octet-stream",
                    Bytes::from(body),
                )
            }
            Ok(Err(e)) => {
                if e.is_source_error() {
                    debug!(group = %group_name, error = %e, "peer lookup found nothing at source");
                } else {
                    warn!(group = %group_name, error = %e, "peer lookup failed");
                }
                text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Err(e) => {
                error!("peer lookup task failed: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "lookup task failed".to_string())
            }
        }
    }
}

/// Split `<base><group>/<key>` into decoded `(group, key)`
fn parse_path(base_path: &str, path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix(base_path)?;
    let (group, key) = rest.split_once('/')?;
    if group.is_empty() {
        return None;
    }
    let group = urlencoding::decode(group).ok()?.into_owned();
    let key = urlencoding::decode(key).ok()?.into_owned();
    Some((group, key))
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, body: String) -> HttpResponse {
    respond(status, "text/plain; charset=utf-8", Bytes::from(body))
}

// =============================================================================
// Tests
// =============================================================================
