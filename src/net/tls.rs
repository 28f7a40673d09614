//! TLS configuration and certificate loading.

use std::path::Path;
use std::sync::Once;

use axum_server::tls_rustls::RustlsConfig;

static PROVIDER: Once = Once::new();

/// Install aws-lc-rs as the process-wide rustls provider. Safe to call
/// repeatedly.
pub fn install_crypto_provider() {
    PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    install_crypto_provider();
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Build a TLS configuration from in-memory PEM.
pub async fn tls_config_from_pem(cert_pem: Vec<u8>, key_pem: Vec<u8>) -> Result<RustlsConfig, std::io::Error> {
    install_crypto_provider();
    RustlsConfig::from_pem(cert_pem, key_pem).await
}
