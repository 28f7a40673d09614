//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (one per state change, secrets never included)
//!     → logging.rs subscriber (pretty or JSON on stdout)
//! HTTP requests:
//!     → tower_http TraceLayer spans
//! ```

pub mod logging;
