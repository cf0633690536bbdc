//! Types for errors that can occur in a live session.
use thiserror::Error;

use crate::client::ClientState;

/// An error that can occur while connecting to or streaming from a live gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An invalid setting was passed by the caller, such as a malformed API key or an
    /// invalid symbol.
    #[error("bad configuration of {param_name}: {desc}")]
    Configuration {
        /// The name of the setting or parameter.
        param_name: String,
        /// Why the value was rejected.
        desc: String,
    },
    /// The gateway sent something unexpected during the handshake.
    #[error("{desc}: '{msg}'")]
    Protocol {
        /// What was wrong.
        desc: String,
        /// The offending message.
        msg: String,
    },
    /// The gateway rejected the authentication attempt.
    #[error("failed to authenticate: {0}")]
    Authentication(String),
    /// The gateway closed the connection.
    #[error("reached end of DBN stream")]
    StreamClosed,
    /// An operation was attempted after the session was stopped.
    #[error("session closed")]
    SessionClosed,
    /// An operation isn't valid in the client's current state.
    #[error("can't {op} while the session is {state}")]
    InvalidState {
        /// The attempted operation.
        op: &'static str,
        /// The state of the client at the time.
        state: ClientState,
    },
    /// An I/O error on the transport.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// The original error.
        #[source]
        source: std::io::Error,
        /// The context in which the error occurred.
        context: String,
    },
    /// An error decoding DBN metadata or records.
    #[error(transparent)]
    Dbn(#[from] dbn::Error),
}

/// An alias for a `Result` with [`dbn_live::Error`](crate::Error) as the error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(param_name: impl ToString, desc: impl ToString) -> Self {
        Self::Configuration {
            param_name: param_name.to_string(),
            desc: desc.to_string(),
        }
    }

    pub(crate) fn protocol(desc: impl ToString, msg: impl ToString) -> Self {
        Self::Protocol {
            desc: desc.to_string(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn io(error: std::io::Error, context: impl ToString) -> Self {
        Self::Io {
            source: error,
            context: context.to_string(),
        }
    }
}
