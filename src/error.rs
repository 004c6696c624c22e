use std::io;

use thiserror::Error;

/// Any error this library might encounter.
///
/// Timeouts are not errors anywhere in this crate.
/// Both engines return `Ok(None)` when a bounded wait expires,
/// since a slow or silent device is expected operational noise.
#[derive(Debug, Error)]
pub enum Error {
    /// The pattern cannot be used for scanning.
    /// Raised before any I/O is attempted.
    #[error("The pattern cannot be scanned for: {0}")]
    BadPattern(String),

    /// The underlying link failed.
    /// Distinct from a timeout: the device or process stream itself broke.
    #[error("Underlying IO problem")]
    Io(#[from] io::Error),

    /// A serial port could not be opened.
    #[error("Could not open serial port `{tty}`")]
    OpenPort {
        /// The requested port.
        tty: String,

        /// What the serial layer reported.
        #[source]
        source: tokio_serial::Error,
    },

    /// The control node helper process could not be launched.
    #[error("Could not launch control node helper `{helper}`")]
    Launch {
        /// The helper executable.
        helper: String,

        /// The spawn failure.
        #[source]
        source: io::Error,
    },

    /// The channel is not started, or already stopped.
    #[error("The control channel is not running")]
    NotStarted,

    /// The configuration file is not usable.
    #[error("Bad config: {0}")]
    BadConfig(String),
}

impl Error {
    /// If the error variant is [`Error::BadConfig`], get the message.
    pub fn try_into_bad_config(self) -> Option<String> {
        match self {
            Error::BadConfig(message) => Some(message),
            _ => None,
        }
    }
}
