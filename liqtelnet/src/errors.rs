//! Error types for the telnet control link

/// Result type alias for telnet session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the engine.
///
/// These never cross the public API: the connector degrades to `None` or
/// empty maps instead, so callers only ever deal with absence of data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connecting to the engine failed (refused, unreachable, unresolvable)
    #[error("cannot connect to {0}: {1}")]
    Connect(String, std::io::Error),

    /// Read or write failed on an established session
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine announced it is closing the session
    #[error("engine closed the session: {0}")]
    SessionClosed(String),

    /// No socket is open and no connect attempt was made
    #[error("not connected to {0}")]
    NotConnected(String),
}

impl Error {
    /// Tells whether the failure is worth one reconnect-and-retry.
    ///
    /// Covers the engine's inactivity close, broken pipes, resets and clean
    /// EOF in the middle of an exchange. A refused connection is not
    /// transient: the session stays down until the next command attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::SessionClosed(_) => true,
            Error::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            Error::Connect(_, _) | Error::NotConnected(_) => false,
        }
    }
}
