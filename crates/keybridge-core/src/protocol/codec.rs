//! Line codec: raw bytes/strings ⇄ typed [`Command`]s and `STATE:` lines.
//!
//! # Why parsing is total
//!
//! The device side of the link is a microcontroller on a USB CDC serial
//! port.  Partial lines, stray bytes after a replug, and firmware debug
//! noise are all normal.  The codec therefore never returns an error:
//! undecodable bytes are dropped silently by [`clean_line`] and any line
//! that does not match the grammar becomes [`Command::Unknown`] so the
//! caller can log it and move on.
//!
//! Serialization is equally simple: the protocol has no escaping and no
//! framing beyond the newline, which the transport owns.

use crate::protocol::commands::Command;

/// Prefix for key-press lines: `TOGGLE:<int>`.
const TOGGLE_PREFIX: &str = "TOGGLE:";
/// Prefix for firmware diagnostic passthrough lines.
const DEBUG_PREFIX: &str = "DEBUG:";
/// Prefix for firmware error passthrough lines.
const ERROR_PREFIX: &str = "ERROR:";

/// Parses a single protocol line into a [`Command`].
///
/// Rules are checked in order: exact matches first, then prefixed forms,
/// then the `Unknown` catch-all.  The input is expected to already be free
/// of the line terminator (see [`clean_line`]).
///
/// A `TOGGLE:` line whose suffix is not a valid key index (not an integer,
/// or out of the `u8` range; the device has at most 16 keys) parses as
/// `Unknown`, never as an error.
///
/// # Example
///
/// ```rust
/// use keybridge_core::{parse_line, Command};
///
/// assert_eq!(parse_line("TOGGLE:3"), Command::Toggle(3));
/// assert_eq!(parse_line("TOGGLE:x"), Command::Unknown("TOGGLE:x".to_string()));
/// ```
pub fn parse_line(line: &str) -> Command {
    if line == "READY" {
        return Command::Ready;
    }
    if line == "HEARTBEAT" {
        return Command::Heartbeat;
    }
    if let Some(suffix) = line.strip_prefix(TOGGLE_PREFIX) {
        return match suffix.parse::<u8>() {
            Ok(key) => Command::Toggle(key),
            Err(_) => Command::Unknown(line.to_string()),
        };
    }
    if let Some(text) = line.strip_prefix(DEBUG_PREFIX) {
        return Command::Debug(text.to_string());
    }
    if let Some(text) = line.strip_prefix(ERROR_PREFIX) {
        return Command::Error(text.to_string());
    }
    Command::Unknown(line.to_string())
}

/// Serializes a state update into its wire form: `STATE:<key>:<on|off>`.
///
/// No trailing newline is appended; the transport adds the terminator when
/// it writes the line.
pub fn format_state(key: u8, on: bool) -> String {
    let state = if on { "on" } else { "off" };
    format!("STATE:{key}:{state}")
}

/// Converts one raw received line into clean text.
///
/// Two kinds of hygiene, both required by the protocol contract:
///
/// - Bytes that are not valid UTF-8 are dropped silently (the CDC link can
///   deliver garbage around device resets; a decode failure must not be
///   fatal and must not corrupt the rest of the line).
/// - The trailing `\n` terminator and any trailing `\r` are stripped, so
///   devices that send `\r\n` parse identically to ones that send `\n`.
pub fn clean_line(raw: &[u8]) -> String {
    // `from_utf8_lossy` replaces each invalid sequence with U+FFFD; removing
    // the replacement character afterwards gives "drop silently" semantics.
    let mut text = String::from_utf8_lossy(raw).into_owned();
    text.retain(|c| c != '\u{FFFD}');
    while text.ends_with('\n') || text.ends_with('\r') {
        text.pop();
    }
    text
}

// ── Tests ─────────────────────────────────────────────────────────────────────
