//! GRBL Session Library
//!
//! This crate turns a validated controller connection into a synchronous
//! command/query channel:
//!
//! - **Session**: command and query with bounded retries
//! - **Exchange log**: optional plain-text transcript of every byte exchanged
//! - **open_port**: discovery, handshake and session setup in one call
//!
//! # Example
//!
//! ```rust,no_run
//! use grbl_session::open_port;
//!
//! if let Some(mut session) = open_port(true).expect("controller rejected G90") {
//!     let version = session.query("$I\r").unwrap_or_default();
//!     println!("ver: {}", version);
//!
//!     session.command("G1 X10 Y10 F1000\r").expect("motion command failed");
//!     session.close();
//! }
//! ```

pub mod connect;
pub mod error;
pub mod exchange_log;
pub mod session;

pub use connect::{connect, open_port};
pub use error::SessionError;
pub use exchange_log::{
    Direction, ExchangeLog, FileLog, LogEntry, MemoryLog, NullLog, DEFAULT_LOG_FILE,
};
pub use session::{Session, COMMAND_RETRIES, QUERY_READ_ATTEMPTS};
