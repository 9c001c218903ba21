//! Typed representation of device → bridge protocol lines.

/// A single command received from the keypad, parsed from one transport line.
///
/// Produced by [`crate::protocol::codec::parse_line`]; consumed exactly once
/// by the session dispatcher.
///
/// # Wire grammar
///
/// | Line            | Variant            |
/// |-----------------|--------------------|
/// | `READY`         | `Ready`            |
/// | `HEARTBEAT`     | `Heartbeat`        |
/// | `TOGGLE:<int>`  | `Toggle(int)`      |
/// | `DEBUG:<text>`  | `Debug(text)`      |
/// | `ERROR:<text>`  | `Error(text)`      |
/// | anything else   | `Unknown(line)`    |
///
/// `Unknown` carries the raw line so the daemon can log exactly what the
/// device sent.  There is deliberately no parse-error type: an unparseable
/// line from a flaky USB link must never be able to kill the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The device booted (or was physically reset).  The first `Ready` of a
    /// session triggers a full state reconciliation pass; a second one means
    /// the device rebooted mid-session and the bridge must restart.
    Ready,
    /// Periodic liveness ping from the device firmware.
    Heartbeat,
    /// Key `<n>` was pressed; the mapped entity should be toggled.
    Toggle(u8),
    /// Diagnostic passthrough from the device firmware.
    Debug(String),
    /// Error passthrough from the device firmware.
    Error(String),
    /// Any line that did not match the grammar, carried verbatim.
    Unknown(String),
}
