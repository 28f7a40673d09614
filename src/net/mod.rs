//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Persisted (BindAddress, ServerPort, Ipv6)
//!     → listener.rs (socket2 bind, error classification)
//!     → live.rs (axum-server on the socket, optional rustls)
//!     → Hand off to HTTP layer
//!
//! Rebind:
//!     Active(old) → Staged(old + new) → Active(new), old draining
//! ```
//!
//! # Design Decisions
//! - Sockets use SO_REUSEPORT so a rebind to the same port can overlap;
//!   any other port must first pass an exclusive trial bind
//! - TLS on/off is decided at startup; certificates reload in place
//! - Managers reach the server only through `LiveControl`

pub mod binding;
pub mod interfaces;
pub mod listener;
pub mod live;
pub mod tls;

pub use binding::{BindInfo, BindingError, BindingManager};
pub use interfaces::InterfaceAddr;
pub use listener::BindSpec;
pub use live::{LiveControl, LiveLock, LiveServer, OfflineControl, StagedListener};
