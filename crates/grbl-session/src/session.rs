//! Command/query session with a validated controller
//!
//! A [`Session`] owns the transport of a controller that passed the
//! handshake. It speaks GRBL's line protocol:
//!
//! - **command**: send a line, expect one acknowledgment (`ok`)
//! - **query**: send a line, expect one payload line, then an acknowledgment
//!
//! Both retry empty (timed-out) reads a bounded number of times. Each read
//! blocks for the transport's read timeout, which paces the retries.
//!
//! A session is used by one caller at a time. Interleaving calls from
//! several threads mixes up the controller's replies; nothing here guards
//! against it.

use std::io;

use grbl_protocol::{is_acknowledgment, strip_line_ending, LineTransport};
use tracing::{debug, error, warn};

use crate::error::SessionError;
use crate::exchange_log::{Direction, ExchangeLog, FileLog, LogEntry, NullLog};

/// Reads allowed for each line of a query reply
pub const QUERY_READ_ATTEMPTS: usize = 100;

/// Extra reads allowed when a command's acknowledgment is late
pub const COMMAND_RETRIES: usize = 30;

/// An open, validated connection to a GRBL controller
pub struct Session<T: LineTransport> {
    /// Transport, `None` only while being closed
    transport: Option<T>,
    /// Exchange transcript
    log: Box<dyn ExchangeLog>,
}

impl<T: LineTransport> Session<T> {
    /// Wrap a validated transport, recording exchanges to `log`
    pub fn new(transport: T, log: impl ExchangeLog + 'static) -> Self {
        Self {
            transport: Some(transport),
            log: Box::new(log),
        }
    }

    /// Wrap a validated transport, logging to the default transcript file if enabled
    pub fn with_logging(transport: T, log_enabled: bool) -> Self {
        if log_enabled {
            Self::new(transport, FileLog::default())
        } else {
            Self::new(transport, NullLog)
        }
    }

    /// Whether exchanges are being recorded
    pub fn log_enabled(&self) -> bool {
        self.log.is_enabled()
    }

    /// Send raw data to the controller
    pub fn write(&mut self, data: &str) -> io::Result<()> {
        self.record(Direction::Send, data);
        self.transport()?.write_all(data.as_bytes())
    }

    /// Read one line, terminator included; empty on timeout
    pub fn read_line(&mut self) -> io::Result<String> {
        let line = self.transport()?.read_line()?;
        self.record(Direction::Recv, &line);
        Ok(line)
    }

    /// Send `cmd` and return the single payload line the controller answers with
    ///
    /// The acknowledgment that follows the payload is read and discarded.
    /// Returns `None` for an empty command. A reply that never arrives
    /// yields an empty string; transport failures are reported and yield
    /// whatever was received before the failure.
    pub fn query(&mut self, cmd: &str) -> Option<String> {
        if cmd.is_empty() || self.transport.is_none() {
            return None;
        }

        let mut response = String::new();
        if let Err(e) = self.exchange_query(cmd, &mut response) {
            error!(command = %cmd.trim(), "Error reading serial data: {}", e);
        }

        Some(strip_line_ending(&response).to_string())
    }

    fn exchange_query(&mut self, cmd: &str, response: &mut String) -> io::Result<()> {
        self.write(cmd)?;

        *response = self.read_nonempty(QUERY_READ_ATTEMPTS, true)?;
        if response.is_empty() {
            debug!("No reply to {:?} after {} reads", cmd.trim(), QUERY_READ_ATTEMPTS);
        }

        let ack = self.read_nonempty(QUERY_READ_ATTEMPTS, false)?;
        if !is_acknowledgment(&ack) {
            debug!("Discarded {:?} after query {:?}", ack.trim(), cmd.trim());
        }

        Ok(())
    }

    /// Send `cmd` and wait for its acknowledgment
    ///
    /// An empty command is a no-op. Any error means the controller's state
    /// is unknown and the current job must stop.
    pub fn command(&mut self, cmd: &str) -> Result<(), SessionError> {
        if cmd.is_empty() || self.transport.is_none() {
            return Ok(());
        }

        let command = cmd.trim().to_string();
        let response = match self.exchange_command(cmd) {
            Ok(response) => response,
            Err(source) => {
                error!("Failed after command: {}", command);
                return Err(SessionError::Transport { command, source });
            }
        };

        if is_acknowledgment(&response) {
            return Ok(());
        }

        if !response.is_empty() {
            let response = response.trim().to_string();
            error!(
                "Unexpected response from GRBL. Command: {} Response: {}",
                command, response
            );
            Err(SessionError::ProtocolViolation { command, response })
        } else {
            error!("GRBL serial timeout after command: {}", command);
            Err(SessionError::CommandTimeout { command })
        }
    }

    fn exchange_command(&mut self, cmd: &str) -> io::Result<String> {
        self.write(cmd)?;
        self.read_nonempty(1 + COMMAND_RETRIES, false)
    }

    /// Read until a non-empty line arrives or `attempts` reads come back empty
    fn read_nonempty(&mut self, attempts: usize, report_progress: bool) -> io::Result<String> {
        let mut line = String::new();
        for attempt in 0..attempts {
            let retry = attempt > 0;
            if retry && report_progress {
                self.record(Direction::Query, &format!("read {}", attempt - 1));
            }

            line = self.read_line()?;

            if retry && report_progress {
                self.record(Direction::Query, &format!("response is {}", line));
            }
            if !line.is_empty() {
                break;
            }
        }
        Ok(line)
    }

    /// Close the connection
    ///
    /// Close failures are logged and otherwise ignored.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                debug!("Error closing serial port: {}", e);
            }
        }
    }

    fn transport(&mut self) -> io::Result<&mut T> {
        self.transport
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session is closed"))
    }

    fn record(&mut self, direction: Direction, payload: &str) {
        if !self.log.is_enabled() {
            return;
        }
        if let Err(e) = self.log.append(&LogEntry::now(direction, payload)) {
            warn!("Error logging serial data: {}", e);
        }
    }
}

impl<T: LineTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.release();
    }
}
