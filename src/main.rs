//! gacache Node
//!
//! Runs one cache node: a demo "scores" group backed by a slow in-memory
//! database, the peer server, and optionally a front-end API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          gacache node                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  API server  │───▶│ Group scores │───▶│   Slow DB    │       │
//! │  │ /api /metrics│    │              │    │  (getter)    │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │ HttpPool                          │
//! │  ┌──────────────┐           ▼                                   │
//! │  │ Peer server  │◀──── other nodes                              │
//! │  │ /_gacache/   │                                               │
//! │  └──────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gacache::error::{Error, Result};
use gacache::{Group, GroupRegistry, HttpPool, LoadError, PeerServer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// gacache - Distributed read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peer server port; this node is reachable at http://localhost:<port>
    #[arg(long, env = "GACACHE_PORT", default_value = "8001")]
    port: u16,

    /// Also start the front-end API server
    #[arg(long, env = "GACACHE_API")]
    api: bool,

    /// Front-end API bind address
    #[arg(long, env = "GACACHE_API_ADDR", default_value = "127.0.0.1:9999")]
    api_addr: String,

    /// Comma-separated peer URLs, including this node
    #[arg(
        long,
        env = "GACACHE_PEERS",
        value_delimiter = ',',
        default_value = "http://localhost:8001,http://localhost:8002,http://localhost:8003"
    )]
    peers: Vec<String>,

    /// Byte budget for the scores group (0 = unlimited)
    #[arg(long, env = "GACACHE_CACHE_BYTES", default_value = "2048")]
    cache_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let self_url = format!("http://localhost:{}", args.port);
    info!("Starting gacache node");
    info!("  Self URL: {}", self_url);
    info!("  Peers: {}", args.peers.join(", "));
    info!("  Cache bytes: {}", args.cache_bytes);

    let registry = Arc::new(GroupRegistry::new());
    let group = registry.new_group("scores", args.cache_bytes, slow_db());

    // The blocking peer client must be created outside the async runtime
    let pool = Arc::new(HttpPool::new(self_url)?);
    pool.set_peers(&args.peers);
    group.register_peers(pool.clone())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build tokio runtime: {}", e)))?;

    let result = runtime.block_on(serve(&args, Arc::clone(&registry), Arc::clone(&group)));
    drop(runtime);

    info!("gacache node stopped");
    result
}

async fn serve(args: &Args, registry: Arc<GroupRegistry>, group: Arc<Group>) -> Result<()> {
    let peer_addr = format!("0.0.0.0:{}", args.port);
    let server = PeerServer::bind_default(&peer_addr, registry).await?;

    if args.api {
        let api_addr = args.api_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = api::run_api_server(&api_addr, group).await {
                error!("API server error: {}", e);
            }
        });
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    }
}

/// Demo backing store with a handful of scores
fn slow_db() -> gacache::GetterFn<impl Fn(&str) -> std::result::Result<Vec<u8>, LoadError>> {
    let db: HashMap<&'static str, &'static str> =
        HashMap::from([("tom", "630"), ("jack", "589"), ("sam", "567")]);

    gacache::GetterFn(move |key: &str| {
        info!(key, "[SlowDB] search key");
        db.get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or(LoadError::Missing)
    })
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// API Server
// =============================================================================

mod api {
    use super::*;

    use http_body_util::Full;
    use hyper::body::{Bytes, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
    use tokio::net::TcpListener;

    type HttpResponse = Response<Full<Bytes>>;

    /// Prometheus view of a group
    struct GroupExporter {
        registry: Registry,
        counters: IntGaugeVec,
        tiers: IntGaugeVec,
    }

    impl GroupExporter {
        fn new() -> Result<Self> {
            let counters = IntGaugeVec::new(
                Opts::new("gacache_group_events", "Lookup path counters per group"),
                &["group", "event"],
            )
            .map_err(|e| Error::Internal(format!("Failed to create metric: {}", e)))?;
            let tiers = IntGaugeVec::new(
                Opts::new("gacache_tier_bytes", "Bytes held per cache tier"),
                &["group", "tier"],
            )
            .map_err(|e| Error::Internal(format!("Failed to create metric: {}", e)))?;

            let registry = Registry::new();
            for collector in [counters.clone(), tiers.clone()] {
                registry
                    .register(Box::new(collector))
                    .map_err(|e| Error::Internal(format!("Failed to register metric: {}", e)))?;
            }

            Ok(Self {
                registry,
                counters,
                tiers,
            })
        }

        fn render(&self, group: &Group) -> Result<Vec<u8>> {
            let stats = group.stats();
            for (event, value) in stats.counters.counters() {
                self.counters
                    .with_label_values(&[stats.name.as_str(), event])
                    .set(value as i64);
            }
            self.tiers
                .with_label_values(&[stats.name.as_str(), "main"])
                .set(stats.main.used_bytes as i64);
            self.tiers
                .with_label_values(&[stats.name.as_str(), "hot"])
                .set(stats.hot.used_bytes as i64);

            let mut buffer = Vec::new();
            TextEncoder::new()
                .encode(&self.registry.gather(), &mut buffer)
                .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
            Ok(buffer)
        }
    }

    struct ApiState {
        group: Arc<Group>,
        exporter: GroupExporter,
    }

    pub(super) async fn run_api_server(addr: &str, group: Arc<Group>) -> Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid API server address: {}", e)))?;

        let state = Arc::new(ApiState {
            group,
            exporter: GroupExporter::new()?,
        });

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind API server: {}", e)))?;

        info!("API server listening on {}", addr);

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| Error::Internal(format!("API server accept error: {}", e)))?;

            let io = TokioIo::new(stream);
            let state = Arc::clone(&state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, std::convert::Infallible>(handle(&state, req).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("API server connection error: {}", e);
                }
            });
        }
    }

    async fn handle(state: &ApiState, req: Request<Incoming>) -> HttpResponse {
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();
        drop(req);

        match path.as_str() {
            "/api" => {
                let Some(key) = query_param(&query, "key") else {
                    return reply(StatusCode::BAD_REQUEST, "text/plain", "missing key".into());
                };
                let group = Arc::clone(&state.group);
                match tokio::task::spawn_blocking(move || group.get(&key)).await {
                    Ok(Ok(value)) => reply(
                        StatusCode::OK,
                        "application/octet-stream",
                        Bytes::from(value.to_vec()),
                    ),
                    Ok(Err(e)) => reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        e.to_string().into(),
                    ),
                    Err(e) => reply(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        format!("lookup task failed: {}", e).into(),
                    ),
                }
            }
            "/metrics" => match state.exporter.render(&state.group) {
                Ok(body) => reply(StatusCode::OK, "text/plain; version=0.0.4", body.into()),
                Err(e) => reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string().into(),
                ),
            },
            "/stats" => match serde_json::to_vec(&state.group.stats()) {
                Ok(body) => reply(StatusCode::OK, "application/json", body.into()),
                Err(e) => reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string().into(),
                ),
            },
            "/healthz" => reply(StatusCode::OK, "text/plain", Bytes::from_static(b"ok")),
            _ => reply(
                StatusCode::NOT_FOUND,
                "text/plain",
                Bytes::from_static(b"not found"),
            ),
        }
    }

    fn query_param(query: &str, name: &str) -> Option<String> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .and_then(|(_, v)| {
                urlencoding::decode(&v.replace('+', " "))
                    .ok()
                    .map(|v| v.into_owned())
            })
    }

    fn reply(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static(content_type),
        );
        response
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_query_param() {
            assert_eq!(query_param("key=tom", "key").as_deref(), Some("tom"));
            assert_eq!(query_param("a=1&key=a%20b", "key").as_deref(), Some("a b"));
            assert_eq!(query_param("a=1", "key"), None);
        }
    }
}
