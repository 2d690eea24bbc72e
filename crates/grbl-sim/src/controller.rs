//! Simulated GRBL controller
//!
//! Implements [`LineTransport`] over an in-memory reply queue. Every read
//! pops one reply; an empty queue behaves like a silent device and times
//! out. A [`SimHandle`] stays with the test after the simulator has been
//! moved into a session, to inspect what was sent.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use grbl_protocol::{LineTransport, ACKNOWLEDGMENT};
use tracing::trace;

/// Boot banner printed after reset
pub const BANNER: &str = "Grbl 1.1h ['$' for help]\r\n";

/// Build info reported for `$I`
pub const VERSION_REPORT: &str = "[VER:1.1h.20190825:]\r\n";

/// One scripted reaction to a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A line, returned verbatim (include the terminator)
    Line(String),
    /// A read that times out with no data
    Timeout,
    /// A read that fails with an I/O error of this kind
    Fail(io::ErrorKind),
}

impl Reply {
    /// Shorthand for [`Reply::Line`]
    pub fn line(text: impl Into<String>) -> Self {
        Reply::Line(text.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Scripted,
    Controller,
}

#[derive(Debug)]
struct SimState {
    mode: Mode,
    replies: VecDeque<Reply>,
    written: Vec<u8>,
    pending_command: String,
    reads: usize,
    closed: bool,
    fail_writes: bool,
}

impl SimState {
    fn new(mode: Mode, replies: VecDeque<Reply>) -> Self {
        Self {
            mode,
            replies,
            written: Vec::new(),
            pending_command: String::new(),
            reads: 0,
            closed: false,
            fail_writes: false,
        }
    }

    /// Queue the controller's answer to each complete command in `data`
    fn react(&mut self, data: &[u8]) {
        for c in String::from_utf8_lossy(data).chars() {
            if c != '\r' && c != '\n' {
                self.pending_command.push(c);
                continue;
            }

            let command = std::mem::take(&mut self.pending_command);
            let command = command.trim();
            if command.is_empty() {
                continue;
            }

            trace!("Simulated controller received {:?}", command);
            if command == "$I" {
                self.replies.push_back(Reply::line(VERSION_REPORT));
            } else if command == "$G" {
                self.replies
                    .push_back(Reply::line("[GC:G0 G54 G17 G21 G90 G94 M5 M9 T0 F0 S0]\r\n"));
            }
            self.replies
                .push_back(Reply::line(format!("{}\r\n", ACKNOWLEDGMENT)));
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "simulated port is closed")
}

/// A simulated GRBL board
#[derive(Debug)]
pub struct SimulatedGrbl {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGrbl {
    /// A device that replies with exactly `replies`, then goes silent
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(
                Mode::Scripted,
                replies.into_iter().collect(),
            ))),
        }
    }

    /// A device that never answers
    pub fn silent() -> Self {
        Self::scripted(Vec::<Reply>::new())
    }

    /// A freshly reset GRBL 1.1 board that acknowledges every command
    pub fn controller() -> Self {
        let replies = VecDeque::from([Reply::line("\r\n"), Reply::line(BANNER)]);
        Self {
            state: Arc::new(Mutex::new(SimState::new(Mode::Controller, replies))),
        }
    }

    /// Make every subsequent write fail
    pub fn fail_writes(self) -> Self {
        lock(&self.state).fail_writes = true;
        self
    }

    /// Append more scripted replies
    pub fn push_replies(&self, replies: impl IntoIterator<Item = Reply>) {
        lock(&self.state).replies.extend(replies);
    }

    /// Handle for inspecting the simulator after it has been moved
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl LineTransport for SimulatedGrbl {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(closed_error());
        }
        if state.fail_writes {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write failure",
            ));
        }

        state.written.extend_from_slice(data);
        if state.mode == Mode::Controller {
            state.react(data);
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(closed_error());
        }

        state.reads += 1;
        match state.replies.pop_front() {
            Some(Reply::Line(line)) => Ok(line),
            Some(Reply::Timeout) | None => Ok(String::new()),
            Some(Reply::Fail(kind)) => Err(io::Error::new(kind, "simulated read failure")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// Inspection handle for a [`SimulatedGrbl`]
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Every byte written so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Bytes written so far, as text
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.state).written).into_owned()
    }

    /// Number of reads performed, including timed-out ones
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }

    /// Number of replies still queued
    pub fn pending_replies(&self) -> usize {
        lock(&self.state).replies.len()
    }

    /// Whether the transport has been closed
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}
