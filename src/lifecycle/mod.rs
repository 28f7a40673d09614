//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open store → Seed defaults → Initial password → Certificate → Start listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → LiveServer::shutdown (drain within grace period)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: store first, then credentials, then listeners
//! - Shutdown has a deadline: the grace period from config

pub mod signals;
pub mod startup;

pub use signals::shutdown_signal;
pub use startup::{launch, open_store, Panel, StartupError};
