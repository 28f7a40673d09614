//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use panel_settings::certs::self_signed;
use panel_settings::config::PanelConfig;
use panel_settings::lifecycle::{self, Panel};
use panel_settings::net::tls;
use panel_settings::store::{MemoryStore, SettingsStore, StoreError, StoreResult};

pub const INITIAL_PASSWORD: &str = "Bootstrap#2024";

/// A memory store whose writes to selected keys fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }
}

impl SettingsStore for FailingStore {
    fn get(&self, key: &str) -> StoreResult<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(StoreError::Unavailable(format!("injected failure on {key}")));
        }
        self.inner.set(key, value)
    }

    fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        self.inner.entries()
    }
}

/// Config rooted in a temp dir, listening on a free loopback port.
pub fn test_config(dir: &TempDir, tls_enabled: bool) -> PanelConfig {
    let mut config = PanelConfig::default();
    config.paths.data_dir = dir.path().to_path_buf();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = free_port();
    config.server.tls_enabled = tls_enabled;
    config.server.shutdown_grace_secs = 1;
    config.bootstrap.initial_password = Some(INITIAL_PASSWORD.to_string());
    config
}

pub struct TestPanel {
    pub dir: TempDir,
    pub config: PanelConfig,
    pub store: Arc<FailingStore>,
    pub panel: Panel,
}

/// Bootstrap and start a panel on loopback.
pub async fn start_panel(tls_enabled: bool) -> TestPanel {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, tls_enabled);
    let store = Arc::new(FailingStore::new());
    let panel = lifecycle::launch(&config, store.clone()).await.unwrap();
    TestPanel {
        dir,
        config,
        store,
        panel,
    }
}

/// A port nothing is listening on right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Fresh `(cert PEM, key PEM)` for `name`.
pub fn cert_pair(name: &str, days: u32) -> (String, String) {
    self_signed::generate(name, &[name.to_string()], days).unwrap()
}

/// Plain-HTTP `GET /api/status`; true on a 200.
pub async fn probe_status(addr: SocketAddr) -> bool {
    let Ok(mut stream) = TcpStream::connect(addr).await else {
        return false;
    };
    let request = format!(
        "GET /api/status HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
    );
    if stream.write_all(request.as_bytes()).await.is_err() {
        return false;
    }
    let mut response = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response)).await;
    matches!(read, Ok(Ok(_))) && response.starts_with("HTTP/1.1 200")
}

/// Poll until nothing accepts on `addr`, up to `timeout`.
pub async fn wait_until_closed(addr: SocketAddr, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if TcpStream::connect(addr).await.is_err() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// DER of the leaf certificate `addr` presents in a TLS handshake.
pub async fn served_certificate(addr: SocketAddr) -> Vec<u8> {
    tokio::task::spawn_blocking(move || {
        tls::install_crypto_provider();
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAny(provider)))
            .with_no_client_auth();

        let mut conn =
            ClientConnection::new(Arc::new(config), ServerName::try_from("localhost").unwrap())
                .unwrap();
        let mut sock = std::net::TcpStream::connect(addr).unwrap();
        while conn.is_handshaking() {
            conn.complete_io(&mut sock).unwrap();
        }
        conn.peer_certificates().unwrap()[0].to_vec()
    })
    .await
    .unwrap()
}

/// DER of the first certificate in a PEM bundle.
pub fn pem_to_der(pem: &[u8]) -> Vec<u8> {
    rustls_pemfile::certs(&mut &pem[..])
        .next()
        .unwrap()
        .unwrap()
        .to_vec()
}

#[derive(Debug)]
struct AcceptAny(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAny {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
