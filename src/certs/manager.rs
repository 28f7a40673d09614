use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;

use super::files::CertFiles;
use super::material::{self, CertificateInfo, CertificateSource, ValidatedPair};
use super::{self_signed, CertError};
use crate::config::TlsConfig;
use crate::net::live::{LiveControl, LiveLock};
use crate::store::{flag_value, SettingKey, SettingsStore, SettingsStoreExt, WriteSequence};

/// Owns the certificate pair in the secret directory and the `SSL` /
/// `SSLType` settings.
pub struct CertificateManager {
    store: Arc<dyn SettingsStore>,
    files: CertFiles,
    live: Arc<dyn LiveControl>,
    lock: LiveLock,
    tls: TlsConfig,
}

impl CertificateManager {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        files: CertFiles,
        live: Arc<dyn LiveControl>,
        lock: LiveLock,
        tls: TlsConfig,
    ) -> Self {
        Self {
            store,
            files,
            live,
            lock,
            tls,
        }
    }

    pub fn files(&self) -> &CertFiles {
        &self.files
    }

    /// Install an operator-supplied pair.
    pub async fn load_user_certificate(
        &self,
        cert_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<CertificateInfo, CertError> {
        let pair = material::validate_pair(cert_pem, key_pem, CertificateSource::Imported, Utc::now())
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected uploaded certificate"))?;
        self.install(pair).await
    }

    /// Replace the active pair with a freshly generated self-signed one.
    pub async fn regenerate_self_signed(&self, bind_address: IpAddr) -> Result<CertificateInfo, CertError> {
        let (cert, key) = self_signed::generate(
            &self.tls.common_name,
            &self_signed_sans(&self.tls, bind_address),
            self.tls.self_signed_days,
        )?;
        let pair = material::validate_pair(
            cert.as_bytes(),
            key.as_bytes(),
            CertificateSource::SelfSigned,
            Utc::now(),
        )?;
        self.install(pair).await
    }

    /// Raw bytes of the installed certificate for download.
    pub fn export_certificate(&self) -> Result<Vec<u8>, CertError> {
        match self.files.read_cert() {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CertError::NotFound(self.files.cert_path()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn describe_certificate(&self) -> Result<CertificateInfo, CertError> {
        let cert = self.export_certificate()?;
        let source = CertificateSource::from_setting(&self.store.get_or(
            SettingKey::SslType,
            CertificateSource::SelfSigned.as_setting(),
        )?);
        material::describe(&cert, source)
    }

    async fn install(&self, pair: ValidatedPair) -> Result<CertificateInfo, CertError> {
        let _guard = self.lock.acquire().await;

        let backup = self.files.backup()?;
        if let Err(e) = self.files.install(&pair.cert_pem, &pair.key_pem) {
            self.restore(&backup);
            return Err(e.into());
        }

        if let Err(e) = self
            .live
            .reload_tls(pair.cert_pem.clone(), pair.key_pem.clone())
            .await
        {
            self.restore(&backup);
            tracing::error!(error = %e, "TLS reload failed; previous certificate restored");
            return Err(CertError::ApplyFailed(e));
        }

        let source = pair.info.source;
        WriteSequence::new()
            .push(SettingKey::SslType, source.as_setting())
            .push(SettingKey::Ssl, flag_value(self.live.tls_enabled()))
            .apply(self.store.as_ref())
            .map_err(|f| CertError::PartialApply {
                // The file swap and reload count as the first step.
                committed: f.committed + 1,
                total: f.total + 1,
                source: f.source,
            })?;

        tracing::info!(
            source_kind = source.as_setting(),
            subject = %pair.info.subject,
            not_after = %pair.info.not_after,
            "Panel certificate installed"
        );
        Ok(pair.info)
    }

    fn restore(&self, backup: &super::files::Backup) {
        if let Err(e) = self.files.restore(backup) {
            tracing::error!(error = %e, "Could not restore previous certificate files");
        }
    }
}

/// SANs for a generated certificate: `localhost`, the loopback address, the
/// bind address unless it is a wildcard, and configured extras.
pub fn self_signed_sans(tls: &TlsConfig, bind_address: IpAddr) -> Vec<String> {
    let mut sans = vec!["localhost".to_string(), "127.0.0.1".to_string()];
    if !bind_address.is_unspecified() && !bind_address.is_loopback() {
        sans.push(bind_address.to_string());
    }
    for extra in &tls.extra_sans {
        if !sans.contains(extra) {
            sans.push(extra.clone());
        }
    }
    sans
}

/// Generate and write a self-signed pair when none is installed. Used at
/// startup before a listener exists, so there is nothing to reload.
pub fn ensure_certificate(
    store: &dyn SettingsStore,
    files: &CertFiles,
    tls: &TlsConfig,
    bind_address: IpAddr,
) -> Result<bool, CertError> {
    if files.exists() {
        return Ok(false);
    }
    let (cert, key) = self_signed::generate(
        &tls.common_name,
        &self_signed_sans(tls, bind_address),
        tls.self_signed_days,
    )?;
    files.install(cert.as_bytes(), key.as_bytes())?;
    store.set_key(SettingKey::SslType, CertificateSource::SelfSigned.as_setting())?;
    tracing::info!(path = %files.cert_path().display(), "Generated self-signed panel certificate");
    Ok(true)
}
