//! The line-transport seam between the session and the physical device.
//!
//! The byte-stream link to the keypad has no built-in framing or delivery
//! guarantees; all the session needs from it is "give me one clean line if
//! one arrived" and "send this line".  Keeping that surface behind a trait
//! means the dispatch loop can be exercised end-to-end against a scripted
//! transport without a serial port anywhere near the test.
//!
//! # Failure taxonomy
//!
//! Only two failures exist at this seam, and both are session-fatal:
//! opening the device failed, or an established stream broke.  Everything
//! recoverable (a poll window with no data) is `Ok(None)`, not an error.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors crossing the transport seam.
///
/// String payloads rather than wrapped `io::Error`s: the supervisor only
/// classifies and logs these (it never downcasts), and owning the message
/// keeps the type `Clone` for outcome values that tests assert on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The device transport could not be opened at all.
    #[error("failed to open device transport: {0}")]
    ConnectFailed(String),

    /// An established stream was lost: end-of-stream, unplug, or I/O error.
    #[error("device transport disconnected: {0}")]
    Disconnected(String),
}

impl TransportError {
    /// Convenience constructor for open failures.
    pub fn connect_failed(err: impl ToString) -> Self {
        Self::ConnectFailed(err.to_string())
    }

    /// Convenience constructor for failures on an established stream.
    pub fn disconnected(err: impl ToString) -> Self {
        Self::Disconnected(err.to_string())
    }
}

/// One connected byte-stream link to the device, framed into text lines.
///
/// # Ownership contract
///
/// A transport is exclusively owned by the one session driving it; no
/// concurrent readers or writers exist within a session's lifetime, which
/// is why the methods take `&mut self` rather than hiding a lock.
#[async_trait]
pub trait LineTransport: Send {
    /// Waits up to `timeout` for one complete line.
    ///
    /// - `Ok(Some(line))` – a line arrived; terminator stripped, undecodable
    ///   bytes already dropped.
    /// - `Ok(None)` – nothing (or only a partial line) arrived within the
    ///   poll window.  Not an error; call again.
    ///
    /// # Errors
    ///
    /// [`TransportError::Disconnected`] when the stream is gone.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError>;

    /// Writes one line, appending the newline terminator and flushing.
    ///
    /// # Errors
    ///
    /// [`TransportError::Disconnected`] when the stream is gone.
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Releases the underlying device.
    ///
    /// Must be idempotent and safe to call on a transport whose open never
    /// fully succeeded, since the session calls it unconditionally on every exit
    /// path.
    async fn close(&mut self);
}

/// Opens a fresh [`LineTransport`] for each session attempt.
///
/// The supervisor never reuses a transport across sessions; reopening per
/// attempt is what lets a replugged device (new tty node, fresh USB
/// enumeration) come back without operator intervention.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Opens the device and returns a ready-to-use transport.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectFailed`] when the device cannot be opened.
    async fn connect(&self) -> Result<Box<dyn LineTransport>, TransportError>;
}
