//! Self-signed certificate generation.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use time::{Duration, OffsetDateTime};

use super::CertError;

/// Generate a `(certificate PEM, private key PEM)` pair valid for `days`.
///
/// SAN entries that parse as IP addresses become IP SANs, the rest DNS names.
pub fn generate(common_name: &str, sans: &[String], days: u32) -> Result<(String, String), CertError> {
    let now = OffsetDateTime::now_utc();
    generate_with_validity(
        common_name,
        sans,
        now - Duration::minutes(5),
        now + Duration::days(i64::from(days)),
    )
}

/// Same as [`generate`] with an explicit validity window.
pub fn generate_with_validity(
    common_name: &str,
    sans: &[String],
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
) -> Result<(String, String), CertError> {
    let mut names: Vec<String> = sans.to_vec();
    if !names.iter().any(|n| n == common_name) {
        names.insert(0, common_name.to_string());
    }

    let mut params =
        CertificateParams::new(names).map_err(|e| CertError::Generate(e.to_string()))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, "Panel");
    params.distinguished_name = dn;
    params.not_before = not_before;
    params.not_after = not_after;

    let key_pair = KeyPair::generate().map_err(|e| CertError::Generate(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::Generate(e.to_string()))?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}
