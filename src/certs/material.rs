//! PEM parsing and certificate inspection.
//!
//! Parsing goes through `rustls-pemfile` so the accepted formats are exactly
//! what the TLS listener can load; metadata comes from `x509-parser`.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use serde::{Deserialize, Serialize};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;
use x509_parser::prelude::X509Certificate;

use super::CertError;
use crate::store::keys::{SSL_TYPE_IMPORT, SSL_TYPE_SELF};

/// Where the installed certificate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateSource {
    #[serde(rename = "self")]
    SelfSigned,
    #[serde(rename = "import")]
    Imported,
}

impl CertificateSource {
    /// Value persisted under `SSLType`.
    pub fn as_setting(&self) -> &'static str {
        match self {
            CertificateSource::SelfSigned => SSL_TYPE_SELF,
            CertificateSource::Imported => SSL_TYPE_IMPORT,
        }
    }

    /// Unknown values fall back to self-signed, the bootstrap default.
    pub fn from_setting(value: &str) -> Self {
        if value == SSL_TYPE_IMPORT {
            CertificateSource::Imported
        } else {
            CertificateSource::SelfSigned
        }
    }
}

/// Metadata shown for the active certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub issuer: String,
    pub subject: String,
    /// DNS names and IP addresses from the SAN extension, or the subject CN
    /// when the certificate has none.
    pub domains: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub source: CertificateSource,
}

/// A certificate/key pair that parsed, is inside its validity window and
/// whose key matches the leaf certificate.
#[derive(Clone)]
pub struct ValidatedPair {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
    pub info: CertificateInfo,
}

impl std::fmt::Debug for ValidatedPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedPair")
            .field("info", &self.info)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Run every check a pair must pass before it may replace the live one.
pub fn validate_pair(
    cert_pem: &[u8],
    key_pem: &[u8],
    source: CertificateSource,
    now: DateTime<Utc>,
) -> Result<ValidatedPair, CertError> {
    let chain = parse_chain(cert_pem)?;
    let key = parse_key(key_pem)?;

    let info = inspect(chain[0].as_ref(), source)?;
    if now < info.not_before {
        return Err(CertError::NotYetValid {
            not_before: info.not_before.to_rfc3339(),
        });
    }
    if now > info.not_after {
        return Err(CertError::Expired {
            not_after: info.not_after.to_rfc3339(),
        });
    }

    check_key_matches(chain, &key)?;

    Ok(ValidatedPair {
        cert_pem: cert_pem.to_vec(),
        key_pem: key_pem.to_vec(),
        info,
    })
}

/// Describe the leaf certificate of a PEM bundle without judging validity.
pub fn describe(cert_pem: &[u8], source: CertificateSource) -> Result<CertificateInfo, CertError> {
    let chain = parse_chain(cert_pem)?;
    inspect(chain[0].as_ref(), source)
}

fn parse_chain(cert_pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, CertError> {
    let chain = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CertError::InvalidCertificate(e.to_string()))?;
    if chain.is_empty() {
        return Err(CertError::InvalidCertificate(
            "no PEM certificate found".to_string(),
        ));
    }
    Ok(chain)
}

fn parse_key(key_pem: &[u8]) -> Result<PrivateKeyDer<'static>, CertError> {
    rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| CertError::InvalidKey(e.to_string()))?
        .ok_or_else(|| CertError::InvalidKey("no PEM private key found".to_string()))
}

fn check_key_matches(
    chain: Vec<CertificateDer<'static>>,
    key: &PrivateKeyDer<'static>,
) -> Result<(), CertError> {
    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(key)
        .map_err(|e| CertError::InvalidKey(e.to_string()))?;

    match CertifiedKey::new(chain, signing_key).keys_match() {
        Ok(()) => Ok(()),
        Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::KeyMismatch)) => {
            Err(CertError::KeyMismatch)
        }
        Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => Err(
            CertError::InvalidKey("public key cannot be derived from private key".to_string()),
        ),
        Err(e) => Err(CertError::InvalidCertificate(e.to_string())),
    }
}

fn inspect(der: &[u8], source: CertificateSource) -> Result<CertificateInfo, CertError> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| CertError::InvalidCertificate(e.to_string()))?;

    let validity = cert.validity();
    Ok(CertificateInfo {
        issuer: cert.issuer().to_string(),
        subject: cert.subject().to_string(),
        domains: domains(&cert),
        not_before: timestamp(validity.not_before.timestamp()),
        not_after: timestamp(validity.not_after.timestamp()),
        source,
    })
}

fn domains(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => out.push((*dns).to_string()),
                GeneralName::IPAddress(raw) => {
                    if let Ok(v4) = <[u8; 4]>::try_from(*raw) {
                        out.push(Ipv4Addr::from(v4).to_string());
                    } else if let Ok(v6) = <[u8; 16]>::try_from(*raw) {
                        out.push(Ipv6Addr::from(v6).to_string());
                    }
                }
                _ => {}
            }
        }
    }

    if out.is_empty() {
        if let Some(cn) = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
        {
            out.push(cn.to_string());
        }
    }
    out
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::self_signed;
    use chrono::Duration;

    fn pair(days: u32) -> (String, String) {
        self_signed::generate("panel.test", &["panel.test".into(), "127.0.0.1".into()], days)
            .unwrap()
    }

    #[test]
    fn valid_pair_is_described() {
        let (cert, key) = pair(30);
        let validated = validate_pair(
            cert.as_bytes(),
            key.as_bytes(),
            CertificateSource::Imported,
            Utc::now(),
        )
        .unwrap();

        assert!(validated.info.subject.contains("panel.test"));
        assert!(validated.info.domains.contains(&"panel.test".to_string()));
        assert!(validated.info.domains.contains(&"127.0.0.1".to_string()));
        assert_eq!(validated.info.source, CertificateSource::Imported);
        assert!(validated.info.not_after > Utc::now() + Duration::days(29));
    }

    #[test]
    fn mismatched_key_rejected() {
        let (cert, _) = pair(30);
        let (_, other_key) = pair(30);
        let err = validate_pair(
            cert.as_bytes(),
            other_key.as_bytes(),
            CertificateSource::Imported,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CertError::KeyMismatch));
    }

    #[test]
    fn expiry_checked_against_now() {
        let (cert, key) = pair(30);
        let later = Utc::now() + Duration::days(60);
        let err = validate_pair(
            cert.as_bytes(),
            key.as_bytes(),
            CertificateSource::Imported,
            later,
        )
        .unwrap_err();
        assert!(matches!(err, CertError::Expired { .. }));

        let earlier = Utc::now() - Duration::days(5);
        let err = validate_pair(
            cert.as_bytes(),
            key.as_bytes(),
            CertificateSource::Imported,
            earlier,
        )
        .unwrap_err();
        assert!(matches!(err, CertError::NotYetValid { .. }));
    }

    #[test]
    fn garbage_rejected() {
        let (_, key) = pair(30);
        assert!(matches!(
            validate_pair(b"not a pem", key.as_bytes(), CertificateSource::Imported, Utc::now()),
            Err(CertError::InvalidCertificate(_))
        ));

        let (cert, _) = pair(30);
        assert!(matches!(
            validate_pair(cert.as_bytes(), b"", CertificateSource::Imported, Utc::now()),
            Err(CertError::InvalidKey(_))
        ));
    }

    #[test]
    fn source_round_trips_through_setting() {
        for source in [CertificateSource::SelfSigned, CertificateSource::Imported] {
            assert_eq!(CertificateSource::from_setting(source.as_setting()), source);
        }
    }
}
