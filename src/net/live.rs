//! Control over the running HTTP(S) listener.
//!
//! The settings managers never touch axum-server directly; they go through
//! [`LiveControl`] so the CLI can run the same code paths with no server.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes every validate → swap → persist sequence that touches the
/// live listener (certificate reloads and rebinds).
#[derive(Clone, Default)]
pub struct LiveLock(Arc<Mutex<()>>);

impl LiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.0.clone().lock_owned().await
    }
}

/// A listener opened for a rebind that has not replaced the active one yet.
pub struct StagedListener {
    local_addr: SocketAddr,
    inner: Staged,
}

enum Staged {
    Serving(Handle),
    Held(std::net::TcpListener),
}

impl StagedListener {
    /// Wrap a bound socket that is not serving requests.
    pub fn held(listener: std::net::TcpListener) -> io::Result<Self> {
        Ok(Self {
            local_addr: listener.local_addr()?,
            inner: Staged::Held(listener),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Operations the settings managers need from the running server.
#[async_trait]
pub trait LiveControl: Send + Sync {
    /// Address of the active listener, if one is serving.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Whether the listener speaks TLS. Fixed for the process lifetime.
    fn tls_enabled(&self) -> bool;

    /// Swap the certificate served on new handshakes.
    async fn reload_tls(&self, cert_pem: Vec<u8>, key_pem: Vec<u8>) -> io::Result<()>;

    /// Start serving on `listener` next to the active listener.
    async fn stage_listener(&self, listener: std::net::TcpListener) -> io::Result<StagedListener>;

    /// Make `staged` the active listener and drain the previous one.
    async fn commit_listener(&self, staged: StagedListener);

    /// Close a staged listener without touching the active one.
    async fn discard_listener(&self, staged: StagedListener);
}

struct Active {
    handle: Handle,
    local_addr: SocketAddr,
}

/// The panel's axum-server listener.
pub struct LiveServer {
    app: Router,
    tls: Option<RustlsConfig>,
    grace: Duration,
    active: ArcSwapOption<Active>,
}

impl LiveServer {
    /// `tls` decides between HTTPS and plain HTTP for the whole run.
    pub fn new(app: Router, tls: Option<RustlsConfig>, grace: Duration) -> Self {
        Self {
            app,
            tls,
            grace,
            active: ArcSwapOption::empty(),
        }
    }

    /// Serve on `listener` and make it the active listener.
    pub async fn start(&self, listener: std::net::TcpListener) -> io::Result<SocketAddr> {
        let staged = self.stage_listener(listener).await?;
        let addr = staged.local_addr();
        self.commit_listener(staged).await;
        Ok(addr)
    }

    /// Stop accepting and wait up to the grace period for open connections.
    pub async fn shutdown(&self) {
        let Some(active) = self.active.swap(None) else {
            return;
        };
        tracing::info!(address = %active.local_addr, "Stopping listener");
        drain(&active.handle, self.grace).await;
    }

    fn spawn(&self, listener: std::net::TcpListener, handle: Handle) {
        let app = self.app.clone();
        match self.tls.clone() {
            Some(tls) => {
                tokio::spawn(async move {
                    if let Err(e) = axum_server::from_tcp_rustls(listener, tls)
                        .handle(handle)
                        .serve(app.into_make_service())
                        .await
                    {
                        tracing::error!(error = %e, "HTTPS listener failed");
                    }
                });
            }
            None => {
                tokio::spawn(async move {
                    if let Err(e) = axum_server::from_tcp(listener)
                        .handle(handle)
                        .serve(app.into_make_service())
                        .await
                    {
                        tracing::error!(error = %e, "HTTP listener failed");
                    }
                });
            }
        }
    }
}

#[async_trait]
impl LiveControl for LiveServer {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.active.load_full().map(|a| a.local_addr)
    }

    fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    async fn reload_tls(&self, cert_pem: Vec<u8>, key_pem: Vec<u8>) -> io::Result<()> {
        match &self.tls {
            Some(config) => config.reload_from_pem(cert_pem, key_pem).await,
            None => {
                tracing::info!("Listener is plain HTTP; certificate takes effect once TLS is enabled");
                Ok(())
            }
        }
    }

    async fn stage_listener(&self, listener: std::net::TcpListener) -> io::Result<StagedListener> {
        let handle = Handle::new();
        self.spawn(listener, handle.clone());

        let local_addr = handle
            .listening()
            .await
            .ok_or_else(|| io::Error::other("listener stopped before accepting connections"))?;
        tracing::debug!(address = %local_addr, "Listener staged");

        Ok(StagedListener {
            local_addr,
            inner: Staged::Serving(handle),
        })
    }

    async fn commit_listener(&self, staged: StagedListener) {
        let handle = match staged.inner {
            Staged::Serving(handle) => handle,
            Staged::Held(listener) => {
                // Listeners staged elsewhere still need a server.
                let handle = Handle::new();
                self.spawn(listener, handle.clone());
                handle
            }
        };

        let previous = self.active.swap(Some(Arc::new(Active {
            handle,
            local_addr: staged.local_addr,
        })));
        tracing::info!(address = %staged.local_addr, "Listener active");

        if let Some(previous) = previous {
            tracing::info!(address = %previous.local_addr, "Draining previous listener");
            previous.handle.graceful_shutdown(Some(self.grace));
        }
    }

    async fn discard_listener(&self, staged: StagedListener) {
        if let Staged::Serving(handle) = staged.inner {
            handle.shutdown();
        }
        tracing::debug!(address = %staged.local_addr, "Staged listener discarded");
    }
}

async fn drain(handle: &Handle, grace: Duration) {
    handle.graceful_shutdown(Some(grace));
    let wait = async {
        while handle.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    let _ = tokio::time::timeout(grace, wait).await;
}

/// Stand-in used when no server runs in this process (the CLI). Listeners
/// are only bound to prove the address is usable and then dropped; the
/// persisted settings take effect on the next start.
pub struct OfflineControl {
    tls_enabled: bool,
}

impl OfflineControl {
    pub fn new(tls_enabled: bool) -> Self {
        Self { tls_enabled }
    }
}

#[async_trait]
impl LiveControl for OfflineControl {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    async fn reload_tls(&self, _cert_pem: Vec<u8>, _key_pem: Vec<u8>) -> io::Result<()> {
        Ok(())
    }

    async fn stage_listener(&self, listener: std::net::TcpListener) -> io::Result<StagedListener> {
        StagedListener::held(listener)
    }

    async fn commit_listener(&self, _staged: StagedListener) {}

    async fn discard_listener(&self, _staged: StagedListener) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::listener::{self, BindSpec};
    use axum::routing::get;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback() -> std::net::TcpListener {
        let spec = BindSpec {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ipv6: false,
        };
        listener::bind(&spec, false).unwrap()
    }

    #[tokio::test]
    async fn commit_moves_active_listener() {
        let app = Router::new().route("/", get(|| async { "ok" }));
        let server = LiveServer::new(app, None, Duration::from_millis(100));

        let first = server.start(loopback()).await.unwrap();
        assert_eq!(server.local_addr(), Some(first));
        assert!(tokio::net::TcpStream::connect(first).await.is_ok());

        let staged = server.stage_listener(loopback()).await.unwrap();
        let second = staged.local_addr();
        assert_eq!(server.local_addr(), Some(first));

        server.commit_listener(staged).await;
        assert_eq!(server.local_addr(), Some(second));
        assert!(tokio::net::TcpStream::connect(second).await.is_ok());

        server.shutdown().await;
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn discard_keeps_active_listener() {
        let app = Router::new().route("/", get(|| async { "ok" }));
        let server = LiveServer::new(app, None, Duration::from_millis(100));
        let first = server.start(loopback()).await.unwrap();

        let staged = server.stage_listener(loopback()).await.unwrap();
        server.discard_listener(staged).await;

        assert_eq!(server.local_addr(), Some(first));
        assert!(tokio::net::TcpStream::connect(first).await.is_ok());
    }

    #[tokio::test]
    async fn plain_listener_accepts_reload_as_noop() {
        let server = LiveServer::new(Router::new(), None, Duration::from_millis(10));
        assert!(!server.tls_enabled());
        assert!(server.reload_tls(vec![], vec![]).await.is_ok());
    }
}
