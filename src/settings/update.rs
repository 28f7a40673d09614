//! Closed set of updates accepted through the generic `(key, value)` path.

use std::net::IpAddr;

use crate::error::SettingsError;
use crate::password::policy::MAX_EXPIRATION_DAYS;
use crate::store::{SettingKey, DISABLE, ENABLE};

/// A parsed `(key, value)` update, routed by variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingUpdate {
    /// `ServerPort` → binding manager.
    Port(u16),
    /// `BindAddress` → binding manager.
    BindAddress(IpAddr),
    /// `Ipv6` → binding manager.
    Ipv6(bool),
    /// `MFAStatus=disable` → MFA unbind.
    DisableMfa,
    /// `ExpirationDays` → password manager, recomputes the expiry instant.
    ExpirationDays(u32),
    /// Known key stored verbatim after value validation.
    Plain { key: SettingKey, value: String },
    /// Key outside the catalog, stored verbatim.
    Passthrough { key: String, value: String },
}

impl SettingUpdate {
    pub fn parse(key: &str, value: &str) -> Result<Self, SettingsError> {
        let Some(known) = SettingKey::parse(key) else {
            if key.trim().is_empty() {
                return Err(SettingsError::Validation("setting key is empty".to_string()));
            }
            return Ok(SettingUpdate::Passthrough {
                key: key.to_string(),
                value: value.to_string(),
            });
        };

        let value = value.trim();
        match known {
            SettingKey::ServerPort => value
                .parse::<u16>()
                .map(SettingUpdate::Port)
                .map_err(|_| invalid(known, value, "expected a port number")),
            SettingKey::BindAddress => value
                .parse::<IpAddr>()
                .map(SettingUpdate::BindAddress)
                .map_err(|_| invalid(known, value, "expected an IP address")),
            SettingKey::Ipv6 => parse_flag(known, value).map(SettingUpdate::Ipv6),
            SettingKey::MfaStatus if value == DISABLE => Ok(SettingUpdate::DisableMfa),
            SettingKey::ExpirationDays => match value.parse::<u32>() {
                Ok(days) if days <= MAX_EXPIRATION_DAYS => Ok(SettingUpdate::ExpirationDays(days)),
                _ => Err(invalid(known, value, "expected 0 to 36500 days")),
            },
            SettingKey::SessionTimeout => match value.parse::<u64>() {
                Ok(minutes) if minutes > 0 => Ok(SettingUpdate::Plain {
                    key: known,
                    value: minutes.to_string(),
                }),
                _ => Err(invalid(known, value, "expected a positive number")),
            },
            SettingKey::ComplexityVerification => {
                parse_flag(known, value).map(|on| SettingUpdate::Plain {
                    key: known,
                    value: if on { ENABLE } else { DISABLE }.to_string(),
                })
            }
            SettingKey::MfaStatus | SettingKey::MfaSecret | SettingKey::MfaInterval => Err(
                reserved(known, "use the MFA bind operation"),
            ),
            SettingKey::Password | SettingKey::PasswordExpireAt => {
                Err(reserved(known, "use the password change operation"))
            }
            SettingKey::Ssl | SettingKey::SslType => {
                Err(reserved(known, "use the certificate operations"))
            }
            SettingKey::ProxyType
            | SettingKey::ProxyUrl
            | SettingKey::ProxyPort
            | SettingKey::ProxyUser
            | SettingKey::ProxyPasswd
            | SettingKey::ProxyPasswdKeep => Err(reserved(known, "use the proxy update operation")),
            SettingKey::LineHeight
            | SettingKey::LetterSpacing
            | SettingKey::FontSize
            | SettingKey::CursorBlink
            | SettingKey::CursorStyle
            | SettingKey::Scrollback
            | SettingKey::ScrollSensitivity => {
                Err(reserved(known, "use the terminal update operation"))
            }
            SettingKey::PanelName
            | SettingKey::UserName
            | SettingKey::Language
            | SettingKey::Theme
            | SettingKey::HideMenu => Ok(SettingUpdate::Plain {
                key: known,
                value: value.to_string(),
            }),
        }
    }
}

fn parse_flag(key: SettingKey, value: &str) -> Result<bool, SettingsError> {
    match value {
        ENABLE | "true" => Ok(true),
        DISABLE | "false" => Ok(false),
        _ => Err(invalid(key, value, "expected enable or disable")),
    }
}

fn invalid(key: SettingKey, value: &str, expected: &str) -> SettingsError {
    SettingsError::Validation(format!("{key}: {value:?} is invalid, {expected}"))
}

fn reserved(key: SettingKey, hint: &str) -> SettingsError {
    SettingsError::Validation(format!("{key} cannot be set directly, {hint}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn routes_network_keys() {
        assert_eq!(SettingUpdate::parse("ServerPort", "8443").unwrap(), SettingUpdate::Port(8443));
        assert_eq!(
            SettingUpdate::parse("BindAddress", "::").unwrap(),
            SettingUpdate::BindAddress("::".parse().unwrap())
        );
        assert_eq!(SettingUpdate::parse("Ipv6", "enable").unwrap(), SettingUpdate::Ipv6(true));
        assert!(SettingUpdate::parse("ServerPort", "70000").is_err());
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert_eq!(
            SettingUpdate::parse("DeveloperMode", "on").unwrap(),
            SettingUpdate::Passthrough {
                key: "DeveloperMode".into(),
                value: "on".into()
            }
        );
    }

    #[test]
    fn credential_keys_are_reserved() {
        for key in ["Password", "MFASecret", "MFAInterval", "SSL", "SSLType", "ProxyUrl", "FontSize"] {
            let err = SettingUpdate::parse(key, "x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{key}");
        }
        assert!(SettingUpdate::parse("MFAStatus", "enable").is_err());
        assert_eq!(SettingUpdate::parse("MFAStatus", "disable").unwrap(), SettingUpdate::DisableMfa);
    }

    #[test]
    fn expiration_days_bounded() {
        assert_eq!(
            SettingUpdate::parse("ExpirationDays", "36500").unwrap(),
            SettingUpdate::ExpirationDays(36_500)
        );
        for raw in ["36501", "4000000000", "-1"] {
            let err = SettingUpdate::parse("ExpirationDays", raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{raw}");
        }
    }

    #[test]
    fn plain_values_checked() {
        assert!(SettingUpdate::parse("SessionTimeout", "0").is_err());
        assert!(SettingUpdate::parse("ComplexityVerification", "maybe").is_err());
        assert_eq!(
            SettingUpdate::parse("Theme", "dark").unwrap(),
            SettingUpdate::Plain {
                key: SettingKey::Theme,
                value: "dark".into()
            }
        );
    }
}
