//! The known settings catalog.

/// Value written for boolean-style settings that are switched on.
pub const ENABLE: &str = "enable";
/// Value written for boolean-style settings that are switched off.
pub const DISABLE: &str = "disable";

/// `SSLType` value for a locally generated certificate.
pub const SSL_TYPE_SELF: &str = "self";
/// `SSLType` value for an operator-imported certificate.
pub const SSL_TYPE_IMPORT: &str = "import";

/// Every setting the panel knows about.
///
/// The string form (`as_str`) is the persisted key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    // Network binding
    ServerPort,
    BindAddress,
    Ipv6,

    // MFA
    MfaStatus,
    MfaSecret,
    MfaInterval,

    // Password
    Password,
    PasswordExpireAt,
    ExpirationDays,
    ComplexityVerification,

    // TLS
    Ssl,
    SslType,

    // Outbound proxy
    ProxyType,
    ProxyUrl,
    ProxyPort,
    ProxyUser,
    ProxyPasswd,
    ProxyPasswdKeep,

    // Plain panel preferences
    PanelName,
    UserName,
    Language,
    Theme,
    SessionTimeout,
    HideMenu,

    // Web terminal
    LineHeight,
    LetterSpacing,
    FontSize,
    CursorBlink,
    CursorStyle,
    Scrollback,
    ScrollSensitivity,
}

impl SettingKey {
    pub const ALL: [SettingKey; 31] = [
        SettingKey::ServerPort,
        SettingKey::BindAddress,
        SettingKey::Ipv6,
        SettingKey::MfaStatus,
        SettingKey::MfaSecret,
        SettingKey::MfaInterval,
        SettingKey::Password,
        SettingKey::PasswordExpireAt,
        SettingKey::ExpirationDays,
        SettingKey::ComplexityVerification,
        SettingKey::Ssl,
        SettingKey::SslType,
        SettingKey::ProxyType,
        SettingKey::ProxyUrl,
        SettingKey::ProxyPort,
        SettingKey::ProxyUser,
        SettingKey::ProxyPasswd,
        SettingKey::ProxyPasswdKeep,
        SettingKey::PanelName,
        SettingKey::UserName,
        SettingKey::Language,
        SettingKey::Theme,
        SettingKey::SessionTimeout,
        SettingKey::HideMenu,
        SettingKey::LineHeight,
        SettingKey::LetterSpacing,
        SettingKey::FontSize,
        SettingKey::CursorBlink,
        SettingKey::CursorStyle,
        SettingKey::Scrollback,
        SettingKey::ScrollSensitivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ServerPort => "ServerPort",
            SettingKey::BindAddress => "BindAddress",
            SettingKey::Ipv6 => "Ipv6",
            SettingKey::MfaStatus => "MFAStatus",
            SettingKey::MfaSecret => "MFASecret",
            SettingKey::MfaInterval => "MFAInterval",
            SettingKey::Password => "Password",
            SettingKey::PasswordExpireAt => "PasswordExpireAt",
            SettingKey::ExpirationDays => "ExpirationDays",
            SettingKey::ComplexityVerification => "ComplexityVerification",
            SettingKey::Ssl => "SSL",
            SettingKey::SslType => "SSLType",
            SettingKey::ProxyType => "ProxyType",
            SettingKey::ProxyUrl => "ProxyUrl",
            SettingKey::ProxyPort => "ProxyPort",
            SettingKey::ProxyUser => "ProxyUser",
            SettingKey::ProxyPasswd => "ProxyPasswd",
            SettingKey::ProxyPasswdKeep => "ProxyPasswdKeep",
            SettingKey::PanelName => "PanelName",
            SettingKey::UserName => "UserName",
            SettingKey::Language => "Language",
            SettingKey::Theme => "Theme",
            SettingKey::SessionTimeout => "SessionTimeout",
            SettingKey::HideMenu => "HideMenu",
            SettingKey::LineHeight => "LineHeight",
            SettingKey::LetterSpacing => "LetterSpacing",
            SettingKey::FontSize => "FontSize",
            SettingKey::CursorBlink => "CursorBlink",
            SettingKey::CursorStyle => "CursorStyle",
            SettingKey::Scrollback => "Scrollback",
            SettingKey::ScrollSensitivity => "ScrollSensitivity",
        }
    }

    /// Look up a key by its persisted name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    /// Keys whose values must never leave the service in clear.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            SettingKey::Password | SettingKey::MfaSecret | SettingKey::ProxyPasswd
        )
    }

    /// First-boot value for keys that do not depend on the config file.
    ///
    /// Network keys and `Password` are seeded from configuration instead.
    pub fn static_default(&self) -> Option<&'static str> {
        let value = match self {
            SettingKey::MfaStatus => DISABLE,
            SettingKey::MfaSecret => "",
            SettingKey::MfaInterval => "30",
            SettingKey::PasswordExpireAt => "",
            SettingKey::ComplexityVerification => ENABLE,
            SettingKey::Ssl => DISABLE,
            SettingKey::SslType => SSL_TYPE_SELF,
            SettingKey::ProxyType => "close",
            SettingKey::ProxyUrl => "",
            SettingKey::ProxyPort => "",
            SettingKey::ProxyUser => "",
            SettingKey::ProxyPasswd => "",
            SettingKey::ProxyPasswdKeep => DISABLE,
            SettingKey::PanelName => "Panel",
            SettingKey::UserName => "admin",
            SettingKey::Language => "en",
            SettingKey::Theme => "light",
            SettingKey::SessionTimeout => "86400",
            SettingKey::HideMenu => "",
            SettingKey::LineHeight => "1.2",
            SettingKey::LetterSpacing => "0",
            SettingKey::FontSize => "12",
            SettingKey::CursorBlink => ENABLE,
            SettingKey::CursorStyle => "block",
            SettingKey::Scrollback => "1000",
            SettingKey::ScrollSensitivity => "6",
            SettingKey::ServerPort
            | SettingKey::BindAddress
            | SettingKey::Ipv6
            | SettingKey::Password
            | SettingKey::ExpirationDays => return None,
        };
        Some(value)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::parse("NoSuchKey"), None);
    }

    #[test]
    fn secrets_are_flagged() {
        let secrets: Vec<_> = SettingKey::ALL.iter().filter(|k| k.is_secret()).collect();
        assert_eq!(secrets.len(), 3);
        assert!(SettingKey::MfaSecret.is_secret());
        assert!(!SettingKey::MfaStatus.is_secret());
    }
}
