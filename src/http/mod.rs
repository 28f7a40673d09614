//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net::live)
//!     → server.rs (Axum router, trace + timeout layers)
//!     → GET /api/status
//! ```

pub mod server;

pub use server::build_router;
