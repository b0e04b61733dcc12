//! Connector flavors and the live telnet connector
//!
//! The composition root builds exactly one [`Connector`] from its
//! configuration and passes it by reference to every caller (request
//! handlers, the scheduler worker). There is no global instance and no
//! runtime transition between flavors.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::{ConnectorConfig, ConnectorMethod};
use crate::session::{TelnetSession, Transport, DEFAULT_TIMEOUT_SECS};
use crate::simulator::SimulatedConnector;
use crate::snapshot;

/// Snapshot status reported when no engine is configured.
pub const NOT_CONFIGURED: &str = "Liquidsoap connection is not configured";

/// Everything the live connector mutates: the socket, the inventory and the
/// active-source cache. Guarded by one lock so each externally visible
/// operation is atomic with respect to the wire.
#[derive(Debug)]
struct ConnectorState {
    session: TelnetSession,
    catalog: Catalog,
}

/// Thread-safe control link to one running engine.
///
/// All methods serialize on an internal lock held for the whole
/// command/response round trip, including any reconnect-and-retry. Polling
/// cadence is seconds-scale, so funneling every caller through a single
/// connection is acceptable.
#[derive(Debug)]
pub struct TelnetConnector {
    state: Mutex<ConnectorState>,
}

impl TelnetConnector {
    /// Connect to the engine and prime the capability catalog.
    ///
    /// An unreachable engine is not fatal: the session stays disconnected
    /// and the next command attempt triggers another try.
    pub fn new(config: &ConnectorConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let mut session = TelnetSession::new(config.host.clone(), config.port, timeout);
        if let Err(err) = session.connect() {
            warn!("Engine not reachable yet: {}", err);
        }
        let connector = Self {
            state: Mutex::new(ConnectorState {
                session,
                catalog: Catalog::new(config.primary_output.clone()),
            }),
        };
        connector.uptime();
        connector
    }

    /// Engine process age; reading it refreshes the catalog on restart.
    pub fn uptime(&self) -> Duration {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.catalog.uptime(&mut state.session)
    }

    /// Metadata snapshot of what is currently playing.
    pub fn current(&self) -> HashMap<String, String> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        snapshot::current(&mut state.catalog, &mut state.session)
    }

    /// Generic passthrough for one-off engine commands.
    pub fn command(&self, command: &str) -> Option<Vec<String>> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.session.command(command)
    }

    pub fn skip(&self) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        snapshot::skip(&mut state.catalog, &mut state.session);
    }

    pub fn remaining(&self) -> Option<f64> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        snapshot::remaining(&mut state.catalog, &mut state.session)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().catalog.commands().to_vec()
    }

    pub fn version(&self) -> String {
        self.state.lock().unwrap().catalog.version().to_string()
    }
}

/// The control link as seen by collaborators, in one of three mutually
/// exclusive flavors fixed at startup.
#[derive(Debug)]
pub enum Connector {
    /// No engine configured.
    Disabled,
    /// Deterministic fake for demos and tests.
    Simulated(SimulatedConnector),
    /// Live telnet session.
    Live(TelnetConnector),
}

impl Connector {
    /// Build the flavor selected by the configuration. Call once at process
    /// start, from the composition root.
    pub fn from_config(config: &ConnectorConfig) -> Self {
        match config.method {
            ConnectorMethod::Disabled => {
                info!("Engine connection is disabled");
                Connector::Disabled
            }
            ConnectorMethod::Simulated => {
                info!("Using the simulated engine");
                Connector::Simulated(SimulatedConnector::new())
            }
            ConnectorMethod::Live => Connector::Live(TelnetConnector::new(config)),
        }
    }

    /// Metadata of what is currently playing. Missing fields are normal;
    /// callers keep their prior cached state across empty answers.
    pub fn current(&self) -> HashMap<String, String> {
        match self {
            Connector::Disabled => {
                HashMap::from([("status".to_string(), NOT_CONFIGURED.to_string())])
            }
            Connector::Simulated(simulator) => simulator.current(),
            Connector::Live(live) => live.current(),
        }
    }

    /// Send one raw command line; `None` means "no answer".
    pub fn command(&self, command: &str) -> Option<Vec<String>> {
        match self {
            Connector::Disabled | Connector::Simulated(_) => None,
            Connector::Live(live) => live.command(command),
        }
    }

    /// Skip the track currently playing on the primary output.
    pub fn skip(&self) {
        match self {
            Connector::Disabled => {}
            Connector::Simulated(simulator) => simulator.skip(),
            Connector::Live(live) => live.skip(),
        }
    }

    /// Seconds left on the current track, when known.
    pub fn remaining(&self) -> Option<f64> {
        match self {
            Connector::Disabled => None,
            Connector::Simulated(simulator) => simulator.remaining(),
            Connector::Live(live) => live.remaining(),
        }
    }

    /// Engine uptime; zero when disabled or unreachable.
    pub fn uptime(&self) -> Duration {
        match self {
            Connector::Disabled => Duration::ZERO,
            Connector::Simulated(simulator) => simulator.uptime(),
            Connector::Live(live) => live.uptime(),
        }
    }

    /// Invocable commands discovered on the engine.
    pub fn commands(&self) -> Vec<String> {
        match self {
            Connector::Disabled => Vec::new(),
            Connector::Simulated(simulator) => simulator.commands(),
            Connector::Live(live) => live.commands(),
        }
    }

    /// Connected engine version, empty when unknown.
    pub fn version(&self) -> String {
        match self {
            Connector::Disabled => String::new(),
            Connector::Simulated(simulator) => simulator.version(),
            Connector::Live(live) => live.version(),
        }
    }
}
