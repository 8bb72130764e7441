//! Server lifecycle: bind, serve, and bounded graceful shutdown.
//!
//! Every accepted connection runs as a task in a [`JoinSet`] owned by
//! [`BoundServer::serve`], so the grace deadline can drop them all before
//! the server reports [`LifecycleState::Stopped`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::http::{AppState, create_router};

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of the HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Routes built, listener not bound yet.
    Created,
    /// Accepting connections.
    Running,
    /// No longer accepting; draining in-flight requests.
    ShuttingDown,
    /// Every connection is closed.
    Stopped,
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// HTTP server that has not been bound yet.
pub struct HttpServer {
    router: Router,
    listen_addr: SocketAddr,
    metrics_path: String,
    grace: Duration,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(app: AppState, listen_addr: SocketAddr, metrics_path: String) -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            router: create_router(app, &metrics_path),
            listen_addr,
            metrics_path,
            grace: SHUTDOWN_GRACE,
            state: Arc::new(state),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Observe lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Bind the listener.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.listen_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: self.listen_addr,
            source,
        })?;

        info!(
            addr = %local_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        Ok(BoundServer {
            listener,
            router: self.router,
            local_addr,
            grace: self.grace,
            state: self.state,
        })
    }

    /// Bind and serve until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// HTTP server with a bound listener.
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    grace: Duration,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl BoundServer {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Observe lifecycle transitions.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serve until `shutdown` turns true, then drain.
    ///
    /// The listener is closed first. Open connections finish their current
    /// request and close; whatever is still open when the grace period
    /// elapses is aborted. Returns once every connection task has ended.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let BoundServer {
            listener,
            router,
            grace,
            state,
            ..
        } = self;
        let (close_tx, close_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        state.send_replace(LifecycleState::Running);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break Ok(()),
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(joined);
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            close_rx.clone(),
                        ));
                    }
                    Err(e) if is_connection_error(&e) => {
                        debug!(error = %e, "Connection dropped before accept");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        break Err(ServerError::Accept(e));
                    }
                }
            }
        };
        drop(listener);

        if outcome.is_ok() {
            state.send_replace(LifecycleState::ShuttingDown);
            info!(connections = connections.len(), "HTTP server shutting down");
            close_tx.send_replace(true);

            let drained = tokio::time::timeout(grace, async {
                while let Some(joined) = connections.join_next().await {
                    log_connection_exit(joined);
                }
            })
            .await;

            if drained.is_err() {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    remaining = connections.len(),
                    "Grace period elapsed, closing remaining connections"
                );
            }
        }

        connections.abort_all();
        while connections.join_next().await.is_some() {}

        state.send_replace(LifecycleState::Stopped);

        if outcome.is_ok() {
            info!("HTTP server stopped");
        }
        outcome
    }
}

/// Serve one HTTP/1 connection until it ends or the server starts closing.
///
/// Once closing, keep-alive is disabled: an idle connection closes at once
/// and a busy one after its current response.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    mut close: watch::Receiver<bool>,
) {
    let service = TowerToHyperService::new(router);
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    let mut conn = std::pin::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = closing(&mut close) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "Connection ended with error");
    }
}

async fn closing(close: &mut watch::Receiver<bool>) {
    let _ = close.wait_for(|closing| *closing).await;
}

fn log_connection_exit(joined: Result<(), JoinError>) {
    match joined {
        Err(e) if e.is_panic() => error!(error = %e, "Connection task panicked"),
        _ => {}
    }
}

/// Accept errors caused by the peer rather than the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Resolve once the shutdown flag is set or its sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if *shutdown.borrow_and_update() {
        return;
    }
    loop {
        if shutdown.changed().await.is_err() {
            break;
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSettings;
    use crate::registry::{MetricRegistry, SharedRegistry};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Instant;

    const REPORT: &str = r#"{"wifi":-50,"rco2":600,"pm01":1,"pm02":2,"pm10":3,"pm003_count":90,"tvoc_index":100,"nox_index":1,"atmp":20.0,"rhum":45,"boot":1}"#;

    fn make_server(grace: Duration) -> (HttpServer, SharedRegistry) {
        let registry = Arc::new(MetricRegistry::new("airgradient"));
        let app = AppState::new(registry.clone(), DeviceSettings::default());
        let server =
            HttpServer::new(app, "127.0.0.1:0".parse().unwrap(), "/metrics".to_string())
                .with_grace_period(grace);
        (server, registry)
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let app = AppState::new(
            Arc::new(MetricRegistry::new("airgradient")),
            DeviceSettings::default(),
        );
        let server = HttpServer::new(app, addr, "/metrics".to_string());
        let (_tx, rx) = watch::channel(false);

        let err = server.run(rx).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }), "{}", err);
    }

    #[tokio::test]
    async fn test_state_transitions_idle_shutdown() {
        let (server, _) = make_server(SHUTDOWN_GRACE);
        let mut lifecycle = server.lifecycle();
        assert_eq!(*lifecycle.borrow(), LifecycleState::Created);

        let bound = server.bind().await.unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(bound.serve(rx));

        lifecycle
            .wait_for(|s| *s == LifecycleState::Running)
            .await
            .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(*lifecycle.borrow(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_already_requested() {
        let (server, _) = make_server(SHUTDOWN_GRACE);
        let bound = server.bind().await.unwrap();
        let (_tx, rx) = watch::channel(true);

        tokio::time::timeout(Duration::from_secs(2), bound.serve(rx))
            .await
            .expect("server did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_delay_shutdown() {
        let (server, _) = make_server(SHUTDOWN_GRACE);
        let bound = server.bind().await.unwrap();
        let addr = bound.local_addr();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(bound.serve(rx));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("idle connection held shutdown open")
            .unwrap()
            .unwrap();
        assert!(started.elapsed() < SHUTDOWN_GRACE);

        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .expect("connection left open");
        assert!(matches!(read, Ok(0) | Err(_)), "{:?}", read);
    }

    #[tokio::test]
    async fn test_grace_deadline_closes_stalled_connection() {
        let grace = Duration::from_millis(300);
        let (server, registry) = make_server(grace);
        let bound = server.bind().await.unwrap();
        let addr = bound.local_addr();
        let mut lifecycle = bound.lifecycle();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(bound.serve(rx));

        // Send the head and the first bytes of a body that stalls.
        let (head, tail) = REPORT.split_at(8);
        let request = format!(
            "POST /sensors/dev1/measures HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            REPORT.len(),
            head
        );
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        tx.send(true).unwrap();
        lifecycle
            .wait_for(|s| *s == LifecycleState::ShuttingDown)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("server ignored grace deadline")
            .unwrap()
            .unwrap();

        assert!(started.elapsed() >= grace);
        assert_eq!(*lifecycle.borrow(), LifecycleState::Stopped);

        // The connection is gone by the time the server reports stopped.
        let mut buf = [0u8; 256];
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .expect("stalled connection left open");
        assert!(matches!(read, Ok(0) | Err(_)), "{:?}", read);

        // Completing the body afterwards gets no answer and records nothing.
        let _ = stream.write_all(tail.as_bytes()).await;
        let mut response = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(1), stream.read_to_end(&mut response))
            .await;
        assert!(
            !String::from_utf8_lossy(&response).contains("200 OK"),
            "{}",
            String::from_utf8_lossy(&response)
        );
        assert_eq!(registry.stats().measurements_recorded, 0);
        assert_eq!(registry.device_count(), 0);
    }
}
