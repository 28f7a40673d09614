//! Outbound proxy settings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::store::{flag_value, SettingKey, WriteSequence};

/// Proxy update as submitted by the UI. `proxy_passwd` arrives base64
/// encoded.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyUpdate {
    pub proxy_type: String,
    pub proxy_url: String,
    pub proxy_port: String,
    pub proxy_user: String,
    pub proxy_passwd: String,
    pub proxy_passwd_keep: bool,
}

impl std::fmt::Debug for ProxyUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyUpdate")
            .field("proxy_type", &self.proxy_type)
            .field("proxy_url", &self.proxy_url)
            .field("proxy_port", &self.proxy_port)
            .field("proxy_user", &self.proxy_user)
            .field("proxy_passwd", &"<redacted>")
            .field("proxy_passwd_keep", &self.proxy_passwd_keep)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Close,
    Http,
    Https,
    Socks5,
}

impl ProxyKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" | "close" => Some(ProxyKind::Close),
            "http" => Some(ProxyKind::Http),
            "https" => Some(ProxyKind::Https),
            "socks5" => Some(ProxyKind::Socks5),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Close => "close",
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

impl ProxyUpdate {
    /// Validate and turn the update into store writes. Nothing is written
    /// when validation fails.
    pub fn into_writes(self) -> Result<WriteSequence, SettingsError> {
        let kind = ProxyKind::parse(&self.proxy_type).ok_or_else(|| {
            SettingsError::Validation(format!("unsupported proxy type {:?}", self.proxy_type))
        })?;

        if kind == ProxyKind::Close {
            return Ok(WriteSequence::new()
                .push(SettingKey::ProxyType, kind.as_str())
                .push(SettingKey::ProxyUrl, "")
                .push(SettingKey::ProxyPort, "")
                .push(SettingKey::ProxyUser, "")
                .push(SettingKey::ProxyPasswd, "")
                .push(SettingKey::ProxyPasswdKeep, flag_value(false)));
        }

        let url = self.proxy_url.trim();
        // `host:port` parses as a scheme with no host; retry with the proxy scheme.
        let parsed = match url::Url::parse(url) {
            Ok(parsed) if has_host(&parsed) => parsed,
            _ => url::Url::parse(&format!("{}://{url}", kind.as_str()))
                .map_err(|e| SettingsError::Validation(format!("invalid proxy url {url:?}: {e}")))?,
        };
        if !has_host(&parsed) {
            return Err(SettingsError::Validation(format!("proxy url {url:?} has no host")));
        }

        let port = match self.proxy_port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                return Err(SettingsError::Validation(format!(
                    "invalid proxy port {:?}",
                    self.proxy_port
                )))
            }
        };

        let passwd = if self.proxy_passwd_keep && !self.proxy_passwd.is_empty() {
            let raw = STANDARD
                .decode(self.proxy_passwd.trim())
                .map_err(|_| SettingsError::Validation("proxy password is not valid base64".to_string()))?;
            String::from_utf8(raw)
                .map_err(|_| SettingsError::Validation("proxy password is not valid UTF-8".to_string()))?
        } else {
            String::new()
        };

        Ok(WriteSequence::new()
            .push(SettingKey::ProxyType, kind.as_str())
            .push(SettingKey::ProxyUrl, url)
            .push(SettingKey::ProxyPort, port.to_string())
            .push(SettingKey::ProxyUser, self.proxy_user.trim())
            .push(SettingKey::ProxyPasswd, passwd)
            .push(SettingKey::ProxyPasswdKeep, flag_value(self.proxy_passwd_keep)))
    }
}

fn has_host(url: &url::Url) -> bool {
    url.host_str().is_some_and(|host| !host.is_empty())
}
