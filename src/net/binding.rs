//! Listener address/port changes.
//!
//! # Data Flow
//! ```text
//! update_binding(BindInfo)
//!     → parse + range checks (no side effects)
//!     → interfaces.rs (address must be on this host)
//!     → [live lock]
//!     → listener::bind (new socket next to the old one)
//!     → LiveControl::stage_listener (new socket serving)
//!     → store writes: ServerPort, BindAddress, Ipv6
//!     → LiveControl::commit_listener (old listener drained)
//! ```
//!
//! # Design Decisions
//! - A failed bind persists nothing and leaves the old listener alone
//! - Settings are written while both listeners are up; if a write fails the
//!   new listener is dropped and the committed writes are reverted
//! - Only IP literals are accepted as bind addresses
//! - `SO_REUSEPORT` sharing is only allowed with the panel's own live port

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::interfaces::{self, InterfaceAddr};
use super::listener::{self, BindSpec, ListenerError};
use super::live::{LiveControl, LiveLock};
use crate::error::ErrorKind;
use crate::store::{
    flag_value, SettingKey, SettingsStore, SettingsStoreExt, StoreError, WriteSequence,
};

const FIRST_UNPRIVILEGED_PORT: u16 = 1024;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("invalid port {port}: {reason}")]
    InvalidPort { port: u16, reason: &'static str },

    #[error("{0} is already in use")]
    PortInUse(SocketAddr),

    #[error("could not apply new listener: {0}")]
    ReapplyFailed(String),

    #[error("listener settings partially written ({committed}/{total}) and could not be reverted: {source}")]
    PartialApply {
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    #[error("could not list host interfaces: {0}")]
    Interfaces(#[source] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BindingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindingError::InvalidAddress(_) | BindingError::InvalidPort { .. } => {
                ErrorKind::Validation
            }
            BindingError::PortInUse(_) => ErrorKind::Conflict,
            BindingError::ReapplyFailed(_) => ErrorKind::ApplyFailed,
            BindingError::PartialApply { .. } => ErrorKind::PartialApply,
            BindingError::Interfaces(_) => ErrorKind::Internal,
            BindingError::Store(e) => e.kind(),
        }
    }
}

/// Requested listener settings as entered by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindInfo {
    pub bind_address: String,
    pub ipv6: bool,
    pub port: u16,
}

impl From<BindSpec> for BindInfo {
    fn from(spec: BindSpec) -> Self {
        Self {
            bind_address: spec.address.to_string(),
            ipv6: spec.ipv6,
            port: spec.port,
        }
    }
}

pub struct BindingManager {
    store: Arc<dyn SettingsStore>,
    live: Arc<dyn LiveControl>,
    lock: LiveLock,
    allow_privileged_ports: bool,
}

impl BindingManager {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        live: Arc<dyn LiveControl>,
        lock: LiveLock,
        allow_privileged_ports: bool,
    ) -> Self {
        Self {
            store,
            live,
            lock,
            allow_privileged_ports,
        }
    }

    /// The persisted binding.
    pub fn current(&self) -> Result<BindSpec, BindingError> {
        read_spec(self.store.as_ref())
    }

    /// Addresses the operator can choose from.
    pub fn interface_addresses(&self) -> Result<Vec<InterfaceAddr>, BindingError> {
        interfaces::local_addresses().map_err(BindingError::Interfaces)
    }

    /// Move the panel listener to `info`, keeping the old one serving until
    /// the new one is up and persisted.
    pub async fn update_binding(&self, info: BindInfo) -> Result<SocketAddr, BindingError> {
        let spec = self.parse(&info)?;
        if !interfaces::is_bindable(spec.address, &self.interface_addresses()?) {
            return Err(BindingError::InvalidAddress(format!(
                "{} is not assigned to any interface on this host",
                spec.address
            )));
        }

        let _guard = self.lock.acquire().await;
        let previous = self.current()?;
        if previous == spec {
            tracing::debug!(address = %spec.socket_addr(), "Binding unchanged");
            return Ok(self.live.local_addr().unwrap_or_else(|| spec.socket_addr()));
        }

        let shares_live_port = self.live.local_addr().is_some_and(|a| a.port() == spec.port);
        let socket = listener::bind(&spec, shares_live_port).map_err(|e| match e {
            ListenerError::AddrInUse(addr) => BindingError::PortInUse(addr),
            ListenerError::AddrNotAvailable(addr) => {
                BindingError::InvalidAddress(format!("{} is not a local address", addr.ip()))
            }
            other => BindingError::ReapplyFailed(other.to_string()),
        })?;
        let staged = self
            .live
            .stage_listener(socket)
            .await
            .map_err(|e| BindingError::ReapplyFailed(e.to_string()))?;
        let addr = staged.local_addr();

        if let Err(e) = self.persist(&previous, &spec) {
            self.live.discard_listener(staged).await;
            tracing::warn!(address = %addr, error = %e, "Binding not persisted; keeping previous listener");
            return Err(e);
        }

        self.live.commit_listener(staged).await;
        tracing::info!(
            address = %addr,
            previous = %previous.socket_addr(),
            "Panel listener rebound"
        );
        Ok(addr)
    }

    /// Change only the port, keeping address and IPv6 flag.
    pub async fn update_port(&self, port: u16) -> Result<SocketAddr, BindingError> {
        let mut info = BindInfo::from(self.current()?);
        info.port = port;
        self.update_binding(info).await
    }

    fn parse(&self, info: &BindInfo) -> Result<BindSpec, BindingError> {
        let raw = info.bind_address.trim();
        let address: IpAddr = raw
            .parse()
            .map_err(|_| BindingError::InvalidAddress(format!("{raw:?} is not an IP address")))?;
        if address.is_ipv6() && !info.ipv6 {
            return Err(BindingError::InvalidAddress(format!(
                "{address} is an IPv6 address but IPv6 is disabled"
            )));
        }

        if info.port == 0 {
            return Err(BindingError::InvalidPort {
                port: 0,
                reason: "port must be between 1 and 65535",
            });
        }
        if info.port < FIRST_UNPRIVILEGED_PORT && !self.allow_privileged_ports {
            return Err(BindingError::InvalidPort {
                port: info.port,
                reason: "privileged ports are not permitted",
            });
        }

        Ok(BindSpec {
            address,
            port: info.port,
            ipv6: info.ipv6,
        })
    }

    fn persist(&self, previous: &BindSpec, spec: &BindSpec) -> Result<(), BindingError> {
        let failure = match binding_writes(spec).apply(self.store.as_ref()) {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        if failure.committed == 0 {
            return Err(BindingError::Store(failure.source));
        }

        match binding_writes(previous)
            .truncate(failure.committed)
            .apply(self.store.as_ref())
        {
            Ok(()) => Err(BindingError::Store(failure.source)),
            Err(revert) => {
                tracing::error!(error = %revert.source, "Could not revert listener settings");
                Err(BindingError::PartialApply {
                    committed: failure.committed,
                    total: failure.total,
                    source: failure.source,
                })
            }
        }
    }
}

fn binding_writes(spec: &BindSpec) -> WriteSequence {
    WriteSequence::new()
        .push(SettingKey::ServerPort, spec.port.to_string())
        .push(SettingKey::BindAddress, spec.address.to_string())
        .push(SettingKey::Ipv6, flag_value(spec.ipv6))
}

/// Binding as persisted. A missing address reads as the IPv4 wildcard.
pub fn read_spec(store: &dyn SettingsStore) -> Result<BindSpec, BindingError> {
    let port = store.get_u64(SettingKey::ServerPort)?;
    let port = u16::try_from(port).map_err(|_| StoreError::InvalidValue {
        key: SettingKey::ServerPort.as_str().to_string(),
        value: port.to_string(),
    })?;

    let raw = store.get_or(SettingKey::BindAddress, "0.0.0.0")?;
    let address = if raw.trim().is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        raw.trim().parse().map_err(|_| StoreError::InvalidValue {
            key: SettingKey::BindAddress.as_str().to_string(),
            value: raw.clone(),
        })?
    };

    Ok(BindSpec {
        address,
        port,
        ipv6: store.get_flag(SettingKey::Ipv6)?,
    })
}
