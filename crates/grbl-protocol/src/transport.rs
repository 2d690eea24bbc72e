//! Line-oriented transport boundary
//!
//! Everything that talks to a controller goes through this trait, so the
//! handshake and session logic can run against a real serial port or a
//! simulated controller alike.

use std::io;

/// A blocking, line-oriented byte transport
///
/// Implementations are used by one caller at a time; they are not expected
/// to be safe for interleaved use.
pub trait LineTransport {
    /// Write all bytes to the device
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read one line, terminator included
    ///
    /// Blocks up to the transport's read timeout. A timeout is not an
    /// error: it returns whatever partial data arrived, or an empty string.
    fn read_line(&mut self) -> io::Result<String>;

    /// Release the underlying device
    fn close(&mut self) -> io::Result<()>;
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
