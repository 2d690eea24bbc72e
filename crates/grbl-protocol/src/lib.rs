//! GRBL Wire Protocol Library
//!
//! This crate holds the pieces of the GRBL serial convention that every
//! other crate in the workspace agrees on:
//!
//! - **Commands**: ASCII lines terminated by a carriage return (`\r`)
//! - **Acknowledgment**: a reply line containing `ok`
//! - **Greeting**: the boot banner, a line starting with `Grbl`
//!
//! It also defines the [`LineTransport`] trait, the boundary between the
//! protocol logic and whatever moves the bytes (a serial port, a simulator).
//!
//! # Example
//!
//! ```rust
//! use grbl_protocol::{escape_control, is_acknowledgment, is_greeting, LineBuffer};
//!
//! let mut buffer = LineBuffer::new();
//! buffer.push_bytes(b"Grbl 1.1h ['$' for help]\r\nok\r\n");
//!
//! let greeting = buffer.next_line().unwrap();
//! assert!(is_greeting(&greeting));
//! assert_eq!(escape_control(&greeting), "Grbl 1.1h ['$' for help]<0D><0A>");
//!
//! let ack = buffer.next_line().unwrap();
//! assert!(is_acknowledgment(&ack));
//! ```

pub mod escape;
pub mod line;
pub mod transport;

pub use escape::escape_control;
pub use line::{strip_line_ending, LineBuffer};
pub use transport::LineTransport;

/// Terminator appended to every command sent to the controller
pub const COMMAND_TERMINATOR: char = '\r';

/// Substring that marks a successful acknowledgment
pub const ACKNOWLEDGMENT: &str = "ok";

/// Prefix of the boot banner a GRBL controller prints after reset
pub const GREETING_PREFIX: &str = "Grbl";

/// Switch the controller to absolute positioning
pub const ABSOLUTE_POSITIONING: &str = "G90\r";

/// Ask the controller for its build information
pub const BUILD_INFO: &str = "$I\r";

/// Returns true if the line is a GRBL boot banner
pub fn is_greeting(line: &str) -> bool {
    line.starts_with(GREETING_PREFIX)
}

/// Returns true if the line acknowledges a command
///
/// Matching is by substring on the trimmed line, so `ok`, `ok\r\n` and
/// `[MSG:...] ok` all count.
pub fn is_acknowledgment(line: &str) -> bool {
    line.trim().contains(ACKNOWLEDGMENT)
}

/// Append the command terminator if the command does not already end with one
pub fn terminated(command: &str) -> String {
    if command.ends_with(COMMAND_TERMINATOR) {
        command.to_string()
    } else {
        format!("{}{}", command, COMMAND_TERMINATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_detection() {
        assert!(is_greeting("Grbl v1.1\n"));
        assert!(is_greeting("Grbl 0.9j ['$' for help]\r\n"));
        assert!(!is_greeting("grbl v1.1\n"));
        assert!(!is_greeting(" Grbl v1.1\n"));
        assert!(!is_greeting(""));
    }

    #[test]
    fn test_acknowledgment_detection() {
        assert!(is_acknowledgment("ok\r\n"));
        assert!(is_acknowledgment("  ok  "));
        assert!(!is_acknowledgment("error:9\r\n"));
        assert!(!is_acknowledgment(""));
    }

    #[test]
    fn test_terminated() {
        assert_eq!(terminated("G90"), "G90\r");
        assert_eq!(terminated("G90\r"), "G90\r");
        assert_eq!(terminated(""), "\r");
    }
}
