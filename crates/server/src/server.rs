//! Server lifecycle: single-start, accept loop, forced shutdown.

use std::{
    net::SocketAddr,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use kiosk_config::ServeConfig;

use crate::{dispatch::Site, error::ServeError, registry::ConnectionRegistry};

/// How long a connection may sit idle (no request in flight) before the
/// transport closes it on its own.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Lifecycle states. Exactly one state machine exists per constructed
/// [`StaticServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

/// An embeddable static-file server with a controlled lifecycle.
///
/// Constructed once by the host and usually shared as an `Arc` singleton.
/// [`start`](Self::start) is idempotent; [`shutdown`](Self::shutdown)
/// severs every live connection and releases the listen port before it
/// returns.
pub struct StaticServer {
    config: ServeConfig,
    registry: Arc<ConnectionRegistry>,
    state: Mutex<ServerState>,
    bound: Mutex<Option<SocketAddr>>,
    // Serializes start/shutdown; holds the running listener's handles.
    lifecycle: tokio::sync::Mutex<Option<Listening>>,
}

struct Listening {
    stop: CancellationToken,
    accept_task: JoinHandle<()>,
}

impl StaticServer {
    pub fn new(config: ServeConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            state: Mutex::new(ServerState::NotStarted),
            bound: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(None),
        }
    }

    /// Start serving. `fallback_root` is the host's destination directory,
    /// used as the document root when the configuration names none.
    ///
    /// Returns the bound address once the server is reachable; returning
    /// is the readiness notification. Calling `start` on a server that is
    /// not in `NotStarted` is a silent no-op that still reports readiness
    /// with the existing binding.
    ///
    /// A bind failure (address in use, insufficient privilege) is fatal:
    /// it is logged, returned as [`ServeError::Bind`], and the server
    /// never reports ready.
    pub async fn start(&self, fallback_root: impl AsRef<Path>) -> Result<SocketAddr, ServeError> {
        let mut lifecycle = self.lifecycle.lock().await;

        let state = self.state();
        if state != ServerState::NotStarted {
            // Every transition past NotStarted happens under the lifecycle
            // lock we hold, after the binding was recorded.
            let addr = (*lock(&self.bound))
                .unwrap_or_else(|| unreachable!("server in {state:?} with no recorded binding"));
            return Ok(addr);
        }

        self.set_state(ServerState::Starting);
        let site = match self.config.resolve(fallback_root.as_ref()) {
            Ok(site) => site,
            Err(err) => {
                self.set_state(ServerState::NotStarted);
                return Err(err.into());
            }
        };

        let bind_addr = format!("{}:{}", site.host, site.port);
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.set_state(ServerState::NotStarted);
                error!(addr = %bind_addr, error = %source, "failed to bind listen address");
                return Err(ServeError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.set_state(ServerState::NotStarted);
                return Err(ServeError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };

        info!(
            root = %site.document_root.display(),
            host = %site.host,
            port = site.port,
            %addr,
            "serving static files"
        );

        let stop = CancellationToken::new();
        let site = Arc::new(Site::new(site));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            site,
            Arc::clone(&self.registry),
            stop.clone(),
        ));

        *lock(&self.bound) = Some(addr);
        *lifecycle = Some(Listening { stop, accept_task });
        self.set_state(ServerState::Listening);
        Ok(addr)
    }

    /// Stop serving: sever every live connection without a close handshake
    /// (in-flight responses are abandoned) and release the listen port.
    /// Returning is the completion notification; afterwards the registry
    /// is empty and the port can be rebound.
    ///
    /// Precondition: a prior successful [`start`](Self::start). Calling
    /// `shutdown` on a never-started server fails loudly with
    /// [`ServeError::NotStarted`]. Shutting down an already-stopped server
    /// completes immediately.
    pub async fn shutdown(&self) -> Result<(), ServeError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(Listening { stop, accept_task }) = lifecycle.take() else {
            return match self.state() {
                ServerState::NotStarted => Err(ServeError::NotStarted),
                _ => Ok(()),
            };
        };

        self.set_state(ServerState::ShuttingDown);

        // Stop accepting first so no connection can register behind the
        // destroy sweep, then drop the listener by finishing the loop.
        stop.cancel();
        if let Err(err) = accept_task.await {
            warn!(error = %err, "accept loop ended abnormally during shutdown");
        }
        let severed = self.registry.sever_all();

        self.set_state(ServerState::Stopped);
        info!(severed, "server stopped, listen port released");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    /// Number of currently open client connections.
    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }

    /// The bound listen address, once the server has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.bound)
    }

    fn set_state(&self, state: ServerState) {
        *lock(&self.state) = state;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accept connections until told to stop. Dropping the listener on exit is
/// what releases the port, so shutdown awaits this task.
async fn accept_loop(
    listener: TcpListener,
    site: Arc<Site>,
    registry: Arc<ConnectionRegistry>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_connection(stream, peer, &site, &registry),
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }
}

/// Register the connection, then serve it until it closes naturally, idles
/// out, or is severed by shutdown. Registration happens before the serving
/// task is spawned, so no request can be dispatched on an untracked
/// connection.
fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    site: &Arc<Site>,
    registry: &Arc<ConnectionRegistry>,
) {
    let token = CancellationToken::new();
    let id = registry.register(token.clone());
    debug!(id, %peer, "connection open");

    let site = Arc::clone(site);
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        let service = service_fn(move |req| {
            let site = Arc::clone(&site);
            async move { site.handle(req).await }
        });

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(IDLE_TIMEOUT)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        tokio::select! {
            result = &mut conn => {
                // Natural close, protocol error, or idle timeout; hyper
                // has already torn the transport down.
                if let Err(err) = result {
                    debug!(id, error = %err, "connection ended");
                }
            }
            _ = token.cancelled() => {
                // Forced shutdown: drop the connection without a close
                // handshake, abandoning any in-flight response.
            }
        }

        registry.unregister(id);
        debug!(id, "connection closed");
    });
}
