//! Handshake validation
//!
//! Opens a candidate port and waits for the controller's boot banner
//! before the port is trusted with motion commands.

use std::thread;
use std::time::Duration;

use grbl_protocol::{is_greeting, LineTransport};
use tracing::{debug, info, trace};

use crate::error::DetectError;
use crate::transport::{ConnectionConfig, PortOpener, SerialOpener, SerialTransport};

/// Boards whose port name contains this marker never print a banner
const NO_BANNER_MARKER: &str = "linvor";

/// Time to let the board finish its reset after the port is opened
pub const BOOT_DELAY: Duration = Duration::from_secs(2);

/// Opens candidate ports and confirms a GRBL controller is attached
pub struct Handshake<O = SerialOpener> {
    opener: O,
    config: ConnectionConfig,
    boot_delay: Duration,
}

impl Handshake {
    /// Create a handshake over real serial ports
    pub fn new() -> Self {
        Self::with_opener(SerialOpener)
    }
}

impl<O: PortOpener> Handshake<O> {
    /// Create a handshake over a custom opener
    pub fn with_opener(opener: O) -> Self {
        Self {
            opener,
            config: ConnectionConfig::grbl(),
            boot_delay: BOOT_DELAY,
        }
    }

    /// Override the post-open boot delay
    pub fn with_boot_delay(mut self, boot_delay: Duration) -> Self {
        self.boot_delay = boot_delay;
        self
    }

    /// Open `candidate` and return the transport if a GRBL controller answers
    ///
    /// Every failure (open error, read error, no banner) is a normal "not
    /// this port" outcome and yields `None`.
    pub fn open_and_validate(&self, candidate: Option<&str>) -> Option<O::Transport> {
        let port = candidate?;

        let mut transport = match self.opener.open(port, &self.config) {
            Ok(t) => t,
            Err(e) => {
                debug!("{}", e);
                return None;
            }
        };

        if port.contains(NO_BANNER_MARKER) {
            info!("Accepting {} without banner check", port);
            return Some(transport);
        }

        thread::sleep(self.boot_delay);

        match wait_for_greeting(&mut transport, port) {
            Ok(true) => return Some(transport),
            Ok(false) => debug!("No GRBL banner on {}", port),
            Err(e) => debug!("{}", e),
        }

        if let Err(e) = transport.close() {
            trace!("Error closing {}: {}", port, e);
        }
        None
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Read lines until the banner appears or the device goes quiet
fn wait_for_greeting<T: LineTransport>(transport: &mut T, port: &str) -> Result<bool, DetectError> {
    loop {
        let line = transport.read_line().map_err(|source| DetectError::Io {
            port: port.to_string(),
            source,
        })?;

        if line.is_empty() {
            return Ok(false);
        }

        trace!("Boot line from {}: {:?}", port, line);

        if is_greeting(&line) {
            info!("GRBL controller on {}: {}", port, line.trim());
            return Ok(true);
        }
    }
}

/// Validate a specific serial port, skipping discovery
///
/// This is a convenience function for when the operator already knows
/// which port the controller is on.
pub fn validate_port(port: &str) -> Option<SerialTransport> {
    Handshake::new().open_and_validate(Some(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_boot_delay() {
        let handshake = Handshake::new();
        assert_eq!(handshake.boot_delay, Duration::from_secs(2));
        assert_eq!(handshake.config, ConnectionConfig::grbl());
    }

    #[test]
    fn test_no_candidate() {
        let handshake = Handshake::new().with_boot_delay(Duration::ZERO);
        assert!(handshake.open_and_validate(None).is_none());
    }
}
