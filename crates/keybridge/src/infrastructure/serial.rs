//! The real device transport: newline framing over any async byte stream,
//! plus the serial-port connector.
//!
//! [`StreamLineTransport`] is generic over the stream so the framing logic
//! is tested against an in-memory duplex pipe; production hands it a
//! `tokio_serial::SerialStream`.

use std::time::Duration;

use async_trait::async_trait;
use keybridge_core::clean_line;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::application::transport::{DeviceConnector, LineTransport, TransportError};
use crate::domain::BridgeConfig;

/// Newline-framed [`LineTransport`] over an async byte stream.
pub struct StreamLineTransport<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    /// Bytes of a line still being assembled.  `read_until` is cancel-safe
    /// and appends into this buffer, so a line split across poll windows
    /// (or interrupted by the timeout mid-line) is never lost.
    pending: Vec<u8>,
    closed: bool,
}

impl<S> StreamLineTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            pending: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl<S> LineTransport for StreamLineTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("transport closed"));
        }

        match tokio::time::timeout(timeout, self.reader.read_until(b'\n', &mut self.pending)).await
        {
            // Poll window elapsed; any partial bytes stay in `pending`.
            Err(_elapsed) => Ok(None),
            // Zero bytes appended means the stream hit end-of-file.
            Ok(Ok(0)) => Err(TransportError::disconnected("end of stream")),
            Ok(Ok(_)) => {
                if self.pending.ends_with(b"\n") {
                    let line = clean_line(&self.pending);
                    self.pending.clear();
                    debug!("device -> bridge: {line:?}");
                    Ok(Some(line))
                } else {
                    // Bytes arrived but the terminator has not; keep
                    // assembling on the next poll.
                    Ok(None)
                }
            }
            Ok(Err(e)) => Err(TransportError::disconnected(e)),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("transport closed"));
        }

        debug!("bridge -> device: {line:?}");
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::disconnected(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| TransportError::disconnected(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::disconnected(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // A failed shutdown on an already-dead stream is expected when the
        // session is closing because the device vanished.
        let _ = self.writer.shutdown().await;
    }
}

/// Opens the configured serial port for each session attempt.
pub struct SerialConnector {
    port: String,
    baud_rate: u32,
    connect_settle: Duration,
}

impl SerialConnector {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            port: config.serial_port.clone(),
            baud_rate: config.baud_rate,
            connect_settle: config.connect_settle,
        }
    }
}

#[async_trait]
impl DeviceConnector for SerialConnector {
    async fn connect(&self) -> Result<Box<dyn LineTransport>, TransportError> {
        info!("opening serial port {} at {} baud", self.port, self.baud_rate);
        let stream = tokio_serial::new(self.port.as_str(), self.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::connect_failed(e))?;

        // Freshly (re)enumerated devices need a moment before the firmware
        // is actually listening.
        tokio::time::sleep(self.connect_settle).await;

        Ok(Box::new(StreamLineTransport::new(stream)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
