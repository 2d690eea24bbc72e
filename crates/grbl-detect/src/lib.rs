//! GRBL Serial Port Detection Library
//!
//! This crate finds the serial port a GRBL controller is attached to and
//! confirms the controller is really there before anything else talks
//! to it.
//!
//! # Example
//!
//! ```rust,no_run
//! use grbl_detect::{Handshake, PortScanner};
//!
//! let scanner = PortScanner::new();
//! let candidate = scanner.find_port();
//!
//! if let Some(transport) = Handshake::new().open_and_validate(candidate.as_deref()) {
//!     println!("GRBL controller on {}", transport.name());
//! }
//! ```

pub mod error;
pub mod handshake;
pub mod scanner;
pub mod transport;

pub use error::DetectError;
pub use handshake::{validate_port, Handshake, BOOT_DELAY};
pub use scanner::{is_grbl_candidate, DeviceDescriptor, PortScanner, PortSource, SystemPorts};
pub use transport::{ConnectionConfig, PortOpener, SerialOpener, SerialTransport};
