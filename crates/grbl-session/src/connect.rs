//! Discovery-to-session composition

use grbl_detect::{Handshake, PortOpener, PortScanner, PortSource, SerialTransport};
use grbl_protocol::ABSOLUTE_POSITIONING;
use tracing::info;

use crate::error::SessionError;
use crate::exchange_log::{ExchangeLog, FileLog, NullLog};
use crate::session::Session;

/// Find, validate and open the attached GRBL controller
///
/// Returns `Ok(None)` when no controller is found. The new session is
/// switched to absolute positioning before it is returned; if the
/// controller does not acknowledge that, the error is returned and the
/// port is closed.
pub fn open_port(log_enabled: bool) -> Result<Option<Session<SerialTransport>>, SessionError> {
    let log: Box<dyn ExchangeLog> = if log_enabled {
        Box::new(FileLog::default())
    } else {
        Box::new(NullLog)
    };
    connect(&PortScanner::new(), &Handshake::new(), log)
}

/// Generic form of [`open_port`] over any port source and opener
pub fn connect<S, O, L>(
    scanner: &PortScanner<S>,
    handshake: &Handshake<O>,
    log: L,
) -> Result<Option<Session<O::Transport>>, SessionError>
where
    S: PortSource,
    O: PortOpener,
    L: ExchangeLog + 'static,
{
    let candidate = scanner.find_port();
    let Some(transport) = handshake.open_and_validate(candidate.as_deref()) else {
        return Ok(None);
    };

    let mut session = Session::new(transport, log);
    session.command(ABSOLUTE_POSITIONING)?;

    if let Some(port) = candidate {
        info!("Connected to GRBL controller on {}", port);
    }
    Ok(Some(session))
}
