//! GRBL Controller Simulation Library
//!
//! This crate provides a stand-in for a GRBL board so the handshake and
//! session layers can be exercised without hardware. It has two modes:
//!
//! - **Scripted**: replies exactly the lines (and timeouts, and failures)
//!   a test lays out, in order
//! - **Controller**: behaves like an idle GRBL 1.1 board, printing its
//!   banner and acknowledging every command
//!
//! # Example
//!
//! ```rust
//! use grbl_protocol::LineTransport;
//! use grbl_sim::{Reply, SimulatedGrbl};
//!
//! let mut grbl = SimulatedGrbl::scripted([Reply::line("G90 G94\n"), Reply::line("ok\n")]);
//! let handle = grbl.handle();
//!
//! grbl.write_all(b"$G\r").unwrap();
//! assert_eq!(grbl.read_line().unwrap(), "G90 G94\n");
//! assert_eq!(grbl.read_line().unwrap(), "ok\n");
//! assert_eq!(grbl.read_line().unwrap(), ""); // script exhausted: timeout
//!
//! assert_eq!(handle.written(), b"$G\r");
//! assert_eq!(handle.reads(), 3);
//! ```

pub mod controller;

pub use controller::{Reply, SimHandle, SimulatedGrbl, BANNER, VERSION_REPORT};
