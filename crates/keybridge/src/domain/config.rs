//! Bridge configuration.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is constructed once at startup (from CLI arguments in production,
//! from `Default` plus overrides in tests) and passed explicitly into the
//! supervisor and the clients, never read from ambient/global state.

use std::fmt;
use std::time::Duration;

/// All runtime configuration for the bridge daemon.
///
/// Build this struct once at startup and share it via `Arc`; every field is
/// read-only for the life of the process.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Base URL of the Home Assistant instance, without a trailing slash
    /// (e.g. `http://10.0.0.58:8123`).  Use [`BridgeConfig::normalized`] to
    /// strip one if the operator supplied it.
    pub ha_url: String,

    /// Long-lived access token for the Home Assistant REST API.  Sent as a
    /// bearer token on every request; redacted from `Debug` output so it
    /// never lands in logs.
    pub ha_token: String,

    /// Serial device path of the keypad (e.g. `/dev/ttyACM0`).
    pub serial_port: String,

    /// Serial line speed.  The Keybow firmware talks at 115 200 baud.
    pub baud_rate: u32,

    /// Poll window for a single transport read.  Nothing arriving within
    /// this window is not an error; the session loop simply comes back
    /// around, which is also where it observes the shutdown flag.
    pub read_timeout: Duration,

    /// Per-request timeout for every Home Assistant REST call.  Bounds the
    /// longest the session can stall on a flaky remote.
    pub request_timeout: Duration,

    /// Wait between a successful service invoke and the state re-query, so
    /// Home Assistant has applied the toggle before we read it back.
    pub settle_delay: Duration,

    /// Wait after opening the serial port before using it; the device
    /// needs a moment to finish initialising after (re)enumeration.
    pub connect_settle: Duration,

    /// Wait between supervisor restart attempts after a real failure.
    /// Device-initiated resets restart immediately and skip this delay.
    pub retry_delay: Duration,

    /// Maximum consecutive failed attempts before the process aborts with a
    /// non-zero exit status.  `None` retries forever.
    pub max_retries: Option<u32>,
}

impl BridgeConfig {
    /// Returns a copy with the `ha_url` trailing slash (if any) stripped, so
    /// URL concatenation never produces `//api/...`.
    pub fn normalized(mut self) -> Self {
        while self.ha_url.ends_with('/') {
            self.ha_url.pop();
        }
        self
    }
}

impl Default for BridgeConfig {
    /// Defaults suitable for local development and tests; production values
    /// come from the CLI.
    fn default() -> Self {
        Self {
            ha_url: "http://homeassistant.local:8123".to_string(),
            ha_token: String::new(),
            serial_port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(50),
            request_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(200),
            connect_settle: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("ha_url", &self.ha_url)
            .field("ha_token", &"<redacted>")
            .field("serial_port", &self.serial_port)
            .field("baud_rate", &self.baud_rate)
            .field("read_timeout", &self.read_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("settle_delay", &self.settle_delay)
            .field("connect_settle", &self.connect_settle)
            .field("retry_delay", &self.retry_delay)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
