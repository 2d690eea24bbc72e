//! Integration tests for GRBL sessions
//!
//! These tests run sessions against simulated controllers and verify:
//! - Query payload/acknowledgment handling and retry budgets
//! - Command acknowledgment, protocol violations and timeouts
//! - Diagnostics emitted through tracing
//! - Exchange transcripts, including escaping and sink failures

use std::io;
use std::sync::{Arc, Mutex};

use grbl_session::{
    Direction, ExchangeLog, FileLog, LogEntry, MemoryLog, NullLog, Session, SessionError,
    COMMAND_RETRIES, QUERY_READ_ATTEMPTS,
};
use grbl_sim::{Reply, SimulatedGrbl};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Writer that collects formatted tracing output
    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` and return its result with the warnings and errors it emitted
    pub fn diagnostics<R>(f: impl FnOnce() -> R) -> (R, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
        (result, text)
    }

    /// A log sink that always fails
    pub struct BrokenLog;

    impl ExchangeLog for BrokenLog {
        fn append(&mut self, _entry: &LogEntry) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }
}

// ============================================================================
// Query
// ============================================================================

#[test]
fn query_returns_payload_and_swallows_ack() {
    let grbl = SimulatedGrbl::scripted([Reply::line("G90 G94\n"), Reply::line("ok\n")]);
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    assert_eq!(session.query("$I\r").as_deref(), Some("G90 G94"));
    assert_eq!(handle.written(), b"$I\r");
    assert_eq!(handle.reads(), 2);
    assert_eq!(handle.pending_replies(), 0);
}

#[test]
fn query_leaves_following_lines_alone() {
    let grbl = SimulatedGrbl::scripted([
        Reply::line("G90 G94\n"),
        Reply::line("ok\n"),
        Reply::line("[MSG:next]\n"),
    ]);
    let mut session = Session::new(grbl, NullLog);

    assert_eq!(session.query("$G\r").as_deref(), Some("G90 G94"));
    assert_eq!(session.read_line().unwrap(), "[MSG:next]\n");
}

#[test]
fn query_waits_through_timeouts() {
    let grbl = SimulatedGrbl::scripted([
        Reply::Timeout,
        Reply::Timeout,
        Reply::line("[VER:1.1h.20190825:]\r\n"),
        Reply::Timeout,
        Reply::line("ok\r\n"),
    ]);
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    assert_eq!(session.query("$I\r").as_deref(), Some("[VER:1.1h.20190825:]"));
    assert_eq!(handle.reads(), 5);
}

#[test]
fn query_against_silent_device_returns_empty() {
    let grbl = SimulatedGrbl::silent();
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    let (response, diagnostics) = helpers::diagnostics(|| session.query("$I\r"));

    assert_eq!(response.as_deref(), Some(""));
    assert_eq!(handle.reads(), 2 * QUERY_READ_ATTEMPTS);
    assert!(diagnostics.is_empty());
}

#[test]
fn query_read_failure_keeps_partial_response() {
    let grbl = SimulatedGrbl::scripted([
        Reply::line("[VER:1.1h]\n"),
        Reply::Fail(io::ErrorKind::BrokenPipe),
    ]);
    let mut session = Session::new(grbl, NullLog);

    let (response, diagnostics) = helpers::diagnostics(|| session.query("$I\r"));

    assert_eq!(response.as_deref(), Some("[VER:1.1h]"));
    assert!(diagnostics.contains("Error reading serial data"));
}

#[test]
fn query_write_failure_returns_empty() {
    let grbl = SimulatedGrbl::controller().fail_writes();
    let mut session = Session::new(grbl, NullLog);

    let (response, diagnostics) = helpers::diagnostics(|| session.query("$I\r"));

    assert_eq!(response.as_deref(), Some(""));
    assert!(diagnostics.contains("$I"));
}

// ============================================================================
// Command
// ============================================================================

#[test]
fn command_acknowledged() {
    let grbl = SimulatedGrbl::scripted([Reply::line("ok\n")]);
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    let (result, diagnostics) = helpers::diagnostics(|| session.command("G90\r"));

    assert!(result.is_ok());
    assert!(diagnostics.is_empty());
    assert_eq!(handle.written(), b"G90\r");
    assert_eq!(handle.reads(), 1);
}

#[test]
fn command_late_acknowledgment() {
    let mut replies = vec![Reply::Timeout; COMMAND_RETRIES];
    replies.push(Reply::line("ok\r\n"));
    let grbl = SimulatedGrbl::scripted(replies);
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    assert!(session.command("G1 X10 F500\r").is_ok());
    assert_eq!(handle.reads(), COMMAND_RETRIES + 1);
}

#[test]
fn command_error_response_is_protocol_violation() {
    let grbl = SimulatedGrbl::scripted([Reply::line("error:9\n")]);
    let mut session = Session::new(grbl, NullLog);

    let (result, diagnostics) = helpers::diagnostics(|| session.command("G90\r"));

    match result {
        Err(SessionError::ProtocolViolation { command, response }) => {
            assert_eq!(command, "G90");
            assert_eq!(response, "error:9");
        }
        other => panic!("expected protocol violation, got {:?}", other),
    }
    assert!(diagnostics.contains("G90"));
    assert!(diagnostics.contains("error:9"));
}

#[test]
fn protocol_violation_message_names_command_and_response() {
    let grbl = SimulatedGrbl::scripted([Reply::line("error:20\r\n")]);
    let mut session = Session::new(grbl, NullLog);

    let err = session.command("G5\r").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("G5"));
    assert!(message.contains("error:20"));
    assert_eq!(err.command(), "G5");
}

#[test]
fn command_timeout() {
    let grbl = SimulatedGrbl::silent();
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);

    let (result, diagnostics) = helpers::diagnostics(|| session.command("G90\r"));

    assert!(matches!(
        result,
        Err(SessionError::CommandTimeout { ref command }) if command == "G90"
    ));
    assert_eq!(handle.reads(), COMMAND_RETRIES + 1);
    assert!(diagnostics.contains("timeout"));
    assert!(diagnostics.contains("G90"));
}

#[test]
fn command_transport_failure() {
    let grbl = SimulatedGrbl::scripted([Reply::Fail(io::ErrorKind::BrokenPipe)]);
    let mut session = Session::new(grbl, NullLog);

    let (result, diagnostics) = helpers::diagnostics(|| session.command("M3 S1000\r"));

    match result {
        Err(SessionError::Transport { command, source }) => {
            assert_eq!(command, "M3 S1000");
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert!(diagnostics.contains("Failed after command: M3 S1000"));
}

#[test]
fn commands_against_simulated_controller() {
    let grbl = SimulatedGrbl::controller();
    let handle = grbl.handle();
    let mut session = Session::new(grbl, NullLog);
    // Consume the boot output the handshake would have read
    session.read_line().unwrap();
    session.read_line().unwrap();

    for cmd in ["G90\r", "G0 X0 Y0\r", "G1 X20 Y20 F1500\r", "M5\r"] {
        session.command(cmd).unwrap();
    }
    assert_eq!(
        session.query("$I\r").as_deref(),
        Some("[VER:1.1h.20190825:]")
    );
    assert_eq!(handle.pending_replies(), 0);
}

// ============================================================================
// Exchange Log
// ============================================================================

#[test]
fn transcript_escapes_control_bytes() {
    let log = MemoryLog::new();
    let grbl = SimulatedGrbl::scripted([Reply::line("ok\r\n")]);
    let mut session = Session::new(grbl, log.clone());

    session.write("\x1b").unwrap();
    session.read_line().unwrap();

    let sent = log.entries_for(Direction::Send);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, "<1B>");
    assert!(log.entries().iter().all(|e| !e.payload.contains('\x1b')));
    assert_eq!(log.entries_for(Direction::Recv)[0].payload, "ok<0D><0A>");
}

#[test]
fn transcript_records_timeouts_as_empty_reads() {
    let log = MemoryLog::new();
    let mut session = Session::new(SimulatedGrbl::silent(), log.clone());

    assert_eq!(session.read_line().unwrap(), "");

    let received = log.entries_for(Direction::Recv);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload, "");
}

#[test]
fn transcript_of_a_command() {
    let log = MemoryLog::new();
    let grbl = SimulatedGrbl::scripted([Reply::Timeout, Reply::line("ok\n")]);
    let mut session = Session::new(grbl, log.clone());

    session.command("G90\r").unwrap();

    let tags: Vec<&str> = log.entries().iter().map(|e| e.direction.tag()).collect();
    assert_eq!(tags, vec!["SEND", "RECV", "RECV"]);
}

#[test]
fn transcript_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serial.log");
    let grbl = SimulatedGrbl::scripted([Reply::line("ok\n")]);
    let mut session = Session::new(grbl, FileLog::new(&path));

    session.write("\x1b\x18").unwrap();
    session.read_line().unwrap();
    session.close();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("<1B><18>"));
    assert!(!contents.contains('\x1b'));
    assert!(!contents.contains('\x18'));
    assert!(contents.contains("\nSEND\n"));
    assert!(contents.contains("\nRECV\nok<0A>\n"));
}

#[test]
fn transcript_failure_is_not_fatal() {
    let grbl = SimulatedGrbl::scripted([Reply::line("ok\n")]);
    let mut session = Session::new(grbl, helpers::BrokenLog);

    let (result, diagnostics) = helpers::diagnostics(|| session.command("G90\r"));

    assert!(result.is_ok());
    assert!(diagnostics.contains("Error logging serial data"));
}

#[test]
fn disabled_log_records_nothing() {
    let grbl = SimulatedGrbl::scripted([Reply::line("ok\n")]);
    let mut session = Session::with_logging(grbl, false);

    assert!(!session.log_enabled());
    assert!(session.command("G90\r").is_ok());
}
