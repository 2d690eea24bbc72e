//! Error types for GRBL detection

use std::io;

use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// The operating system could not list serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(#[source] serialport::Error),

    /// A candidate port could not be opened
    #[error("failed to open port {port}: {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Reading the boot banner failed
    #[error("I/O error on {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: io::Error,
    },

    /// Line control setup failed after open
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}
