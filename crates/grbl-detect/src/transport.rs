//! Serial transport for GRBL controllers
//!
//! Opens ports with the fixed GRBL line settings and frames incoming bytes
//! into lines for the handshake and session layers.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use grbl_protocol::{LineBuffer, LineTransport};
use serialport::SerialPort;
use tracing::{debug, trace, warn};

use crate::error::DetectError;

/// Line settings applied to every port we open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Time a single line read may block
    pub read_timeout: Duration,
    /// Request-to-send line level
    pub rts: bool,
    /// Data-terminal-ready line level
    pub dtr: bool,
}

impl ConnectionConfig {
    /// The settings GRBL firmware expects
    pub const fn grbl() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(1),
            rts: false,
            dtr: true,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::grbl()
    }
}

/// Opens a named port as a line transport
pub trait PortOpener {
    /// Transport produced by this opener
    type Transport: LineTransport;

    /// Open the port with the given settings
    fn open(&self, port: &str, config: &ConnectionConfig) -> Result<Self::Transport, DetectError>;
}

impl<F, T> PortOpener for F
where
    F: Fn(&str, &ConnectionConfig) -> Result<T, DetectError>,
    T: LineTransport,
{
    type Transport = T;

    fn open(&self, port: &str, config: &ConnectionConfig) -> Result<T, DetectError> {
        self(port, config)
    }
}

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    type Transport = SerialTransport;

    fn open(&self, port: &str, config: &ConnectionConfig) -> Result<SerialTransport, DetectError> {
        SerialTransport::open(port, config)
    }
}

/// Serial connection to a GRBL controller
pub struct SerialTransport {
    /// Port name
    name: String,
    /// Serial port, `None` once closed
    port: Option<Box<dyn SerialPort>>,
    /// Time a single line read may block
    read_timeout: Duration,
    /// Bytes received but not yet returned as a line
    buffer: LineBuffer,
    /// Scratch space for port reads
    scratch: Vec<u8>,
}

impl SerialTransport {
    /// Open a port with the given settings
    pub fn open(port_name: &str, config: &ConnectionConfig) -> Result<Self, DetectError> {
        debug!("Opening {} at {} baud", port_name, config.baud_rate);

        let mut port = serialport::new(port_name, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| DetectError::OpenFailed {
                port: port_name.to_string(),
                source,
            })?;

        port.write_request_to_send(config.rts)?;
        port.write_data_terminal_ready(config.dtr)?;

        Ok(Self::from_port(port_name, port, config.read_timeout))
    }

    /// Wrap a port that is already open and configured
    fn from_port(name: &str, port: Box<dyn SerialPort>, read_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            port: Some(port),
            read_timeout,
            buffer: LineBuffer::new(),
            scratch: vec![0; 256],
        }
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "serial port is closed")
        })
    }
}

impl LineTransport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(line);
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let port = self.port.as_mut().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "serial port is closed")
            })?;
            port.set_timeout(remaining)?;

            match port.read(&mut self.scratch) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("Read {} bytes from {}", n, self.name);
                    self.buffer.push_bytes(&self.scratch[..n]);
                    if let Some(line) = self.buffer.next_line() {
                        return Ok(line);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }

        Ok(self.buffer.take_partial())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.name);
        }
        self.buffer.clear();
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing {}: {}", self.name, e);
        }
    }
}
