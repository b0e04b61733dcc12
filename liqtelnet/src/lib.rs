//! Liquidsoap telnet control link
//!
//! This crate maintains a resilient control link to a running Liquidsoap
//! instance over its line-oriented telnet server, and derives from it a
//! consistent snapshot of what is currently playing.
//!
//! The engine never pushes events: the client polls, parses free-form text
//! responses, and reconciles missing or conflicting information with
//! heuristics. Failures degrade to "less information" (empty source, zero
//! uptime, unset remaining time) instead of surfacing errors, so callers
//! only ever need absence-of-field handling.
//!
//! This requires the Liquidsoap script to enable the telnet server, with
//! settings matching the connector configuration:
//!
//! ```text
//! settings.server.telnet := true
//! settings.server.telnet.bind_addr := "192.168.1.10"
//! settings.server.telnet.port := 1234
//! ```
//!
//! # Example
//!
//! ```no_run
//! use liqtelnet::{Connector, ConnectorConfig, ConnectorMethod};
//!
//! let config = ConnectorConfig {
//!     method: ConnectorMethod::Live,
//!     host: "192.168.1.10".to_string(),
//!     port: 1234,
//!     ..ConnectorConfig::default()
//! };
//! let connector = Connector::from_config(&config);
//!
//! let snapshot = connector.current();
//! println!(
//!     "{} - {}",
//!     snapshot.get("artist").map(String::as_str).unwrap_or("?"),
//!     snapshot.get("title").map(String::as_str).unwrap_or("?"),
//! );
//! ```
//!
//! # Concurrency
//!
//! One connector addresses one engine endpoint, and all socket I/O funnels
//! through one internal lock held for a whole command/response round trip.
//! `Connector` is `Send + Sync`: share a single instance by reference across
//! threads.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod connector;
pub mod errors;
pub mod probe;
pub mod session;
pub mod simulator;
pub mod snapshot;

pub use catalog::Catalog;
pub use config::{ConnectorConfig, ConnectorMethod};
pub use connector::{Connector, TelnetConnector, NOT_CONFIGURED};
pub use errors::{Error, Result};
pub use probe::ActiveSource;
pub use session::{TelnetSession, Transport};
pub use simulator::SimulatedConnector;
