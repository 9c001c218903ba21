//! Scripted in-memory transports for testing the session and supervisor
//! without hardware.
//!
//! These are hand-written rather than generated because the interesting
//! part is the *sequence*: a transport that yields these lines, then goes
//! quiet, then drops, while recording everything written to it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::application::transport::{DeviceConnector, LineTransport, TransportError};

/// One step of a [`ScriptedTransport`] read script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver this line (already cleaned, no terminator).
    Line(String),
    /// Report an empty poll window (`Ok(None)`).
    Silence,
    /// Fail the read as a broken stream.
    Drop,
}

/// A [`LineTransport`] that replays a read script and records writes.
///
/// An exhausted script reads as a broken stream, so a test whose session
/// out-lives its script ends with `ConnectionLost` instead of hanging.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptStep>>,
    writes: Arc<Mutex<Vec<String>>>,
    close_count: Arc<AtomicU32>,
    fail_writes: bool,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            writes: Arc::new(Mutex::new(Vec::new())),
            close_count: Arc::new(AtomicU32::new(0)),
            fail_writes: false,
        }
    }

    /// Makes every `write_line` fail as a broken stream.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Handle to the lines written so far, usable after the transport has
    /// been consumed by a session.
    pub fn writes_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.writes)
    }

    /// Handle to the number of `close` calls, for release assertions.
    pub fn close_count_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.close_count)
    }
}

#[async_trait]
impl LineTransport for ScriptedTransport {
    async fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, TransportError> {
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptStep::Line(line)) => Ok(Some(line)),
            Some(ScriptStep::Silence) => Ok(None),
            Some(ScriptStep::Drop) => Err(TransportError::disconnected("scripted disconnect")),
            None => Err(TransportError::disconnected("script exhausted")),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::disconnected("scripted write failure"));
        }
        self.writes.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// A [`DeviceConnector`] that hands out one pre-built transport, then fails
/// further connect attempts.
pub struct ScriptedConnector {
    transport: Mutex<Option<Box<dyn LineTransport>>>,
}

impl ScriptedConnector {
    pub fn new(transport: Box<dyn LineTransport>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
        }
    }
}

#[async_trait]
impl DeviceConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn LineTransport>, TransportError> {
        self.transport
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::connect_failed("no transport scripted"))
    }
}

/// A [`DeviceConnector`] whose every connect attempt fails, as if the
/// device path did not exist.
pub struct FailingConnector;

#[async_trait]
impl DeviceConnector for FailingConnector {
    async fn connect(&self) -> Result<Box<dyn LineTransport>, TransportError> {
        Err(TransportError::connect_failed("no such device"))
    }
}
