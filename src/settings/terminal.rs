//! Web terminal appearance settings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::store::{flag_value, SettingKey, SettingsStore, SettingsStoreExt, StoreError, WriteSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyle {
    Block,
    Underline,
    Bar,
}

impl CursorStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorStyle::Block => "block",
            CursorStyle::Underline => "underline",
            CursorStyle::Bar => "bar",
        }
    }
}

impl FromStr for CursorStyle {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "block" => Ok(CursorStyle::Block),
            "underline" => Ok(CursorStyle::Underline),
            "bar" => Ok(CursorStyle::Bar),
            _ => Err(()),
        }
    }
}

/// Terminal settings as shown to and submitted by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalInfo {
    pub line_height: f32,
    pub letter_spacing: u32,
    pub font_size: u32,
    pub cursor_blink: bool,
    pub cursor_style: CursorStyle,
    pub scrollback: u32,
    pub scroll_sensitivity: u32,
}

impl Default for TerminalInfo {
    fn default() -> Self {
        Self {
            line_height: 1.2,
            letter_spacing: 0,
            font_size: 12,
            cursor_blink: true,
            cursor_style: CursorStyle::Block,
            scrollback: 1000,
            scroll_sensitivity: 6,
        }
    }
}

impl TerminalInfo {
    /// Read the persisted values; missing keys fall back to defaults.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, StoreError> {
        let defaults = Self::default();
        Ok(Self {
            line_height: read(store, SettingKey::LineHeight, defaults.line_height)?,
            letter_spacing: read(store, SettingKey::LetterSpacing, defaults.letter_spacing)?,
            font_size: read(store, SettingKey::FontSize, defaults.font_size)?,
            cursor_blink: match store.get_key(SettingKey::CursorBlink) {
                Ok(_) => store.get_flag(SettingKey::CursorBlink)?,
                Err(StoreError::NotFound(_)) => defaults.cursor_blink,
                Err(e) => return Err(e),
            },
            cursor_style: read(store, SettingKey::CursorStyle, defaults.cursor_style)?,
            scrollback: read(store, SettingKey::Scrollback, defaults.scrollback)?,
            scroll_sensitivity: read(store, SettingKey::ScrollSensitivity, defaults.scroll_sensitivity)?,
        })
    }

    /// Validate and turn the request into store writes. Nothing is written
    /// when validation fails.
    pub fn into_writes(self) -> Result<WriteSequence, SettingsError> {
        let problems = self.violations();
        if !problems.is_empty() {
            return Err(SettingsError::Validation(format!(
                "invalid terminal settings: {}",
                problems.join("; ")
            )));
        }

        Ok(WriteSequence::new()
            .push(SettingKey::LineHeight, self.line_height.to_string())
            .push(SettingKey::LetterSpacing, self.letter_spacing.to_string())
            .push(SettingKey::FontSize, self.font_size.to_string())
            .push(SettingKey::CursorBlink, flag_value(self.cursor_blink))
            .push(SettingKey::CursorStyle, self.cursor_style.as_str())
            .push(SettingKey::Scrollback, self.scrollback.to_string())
            .push(SettingKey::ScrollSensitivity, self.scroll_sensitivity.to_string()))
    }

    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !(1.0..=2.0).contains(&self.line_height) {
            out.push(format!("lineHeight {} not in 1.0..=2.0", self.line_height));
        }
        if self.letter_spacing > 10 {
            out.push(format!("letterSpacing {} not in 0..=10", self.letter_spacing));
        }
        if !(6..=72).contains(&self.font_size) {
            out.push(format!("fontSize {} not in 6..=72", self.font_size));
        }
        if self.scrollback > 100_000 {
            out.push(format!("scrollback {} exceeds 100000", self.scrollback));
        }
        if !(1..=100).contains(&self.scroll_sensitivity) {
            out.push(format!("scrollSensitivity {} not in 1..=100", self.scroll_sensitivity));
        }
        out
    }
}

impl FromStr for TerminalInfo {
    type Err = serde_json::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(raw)
    }
}

fn read<T: FromStr>(store: &dyn SettingsStore, key: SettingKey, default: T) -> Result<T, StoreError> {
    match store.get_key(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| StoreError::InvalidValue {
            key: key.as_str().to_string(),
            value: raw,
        }),
        Err(StoreError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}
