//! Printable rendering of control characters
//!
//! Exchange transcripts must stay plain text no matter what the controller
//! sends, so every character below 0x20 is replaced with its hex code in
//! angle brackets (`<1B>` for ESC, `<0D>` for CR).

use std::fmt::Write;

/// Replace every control character (ordinal < 32) with `<XX>`
pub fn escape_control(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) < 32 {
            // Writing to a String cannot fail
            let _ = write!(escaped, "<{:02X}>", c as u32);
        } else {
            escaped.push(c);
        }
    }
    escaped
}
