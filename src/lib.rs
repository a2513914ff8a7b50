//! ccnping - connectivity probing for named-data networks.
//!
//! This crate provides a client-server application pair. The client sends
//! Interests named `<prefix>/ping/<number>` at a fixed interval and reports
//! round-trip times, timeouts and packet loss. The server answers those
//! Interests with a small signed acknowledgement.
//!
//! # Usage
//!
//! Run the responder (server):
//! ```bash
//! ccnpingserver ccnx:/example/site -x 5
//! ```
//!
//! Run the prober (client):
//! ```bash
//! ccnping ccnx:/example/site -c 3 -i 0.5 --remote 192.0.2.10:6363
//! ```

/// Command-line configuration and validation.
pub mod configuration;
/// HMAC and digest operations for Data signatures.
pub mod crypto;
/// Server daemonization.
#[cfg(unix)]
pub mod daemon;
/// Transports carrying Interests and Data.
pub mod face;
/// Hierarchical names.
pub mod name;
/// Interest and Data structures and serialization.
pub mod packets;
/// Ping responder.
pub mod responder;
/// Probe session management.
pub mod session;
/// Statistics accumulation and reporting.
pub mod stats;
/// Timestamped output lines.
pub mod time;
