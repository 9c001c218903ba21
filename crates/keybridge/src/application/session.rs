//! One connected bridge session: the read-dispatch loop and state
//! reconciliation.
//!
//! A [`BridgeSession`] owns exactly one transport for its whole lifetime.
//! It is the only reader of the device stream and the only writer of
//! `STATE:` lines; there is no concurrency inside a session, so there are
//! no locks.  A remote call blocking for up to its timeout stalls line
//! reads for that duration, which is an accepted trade-off given how rarely
//! a human presses keypad keys.
//!
//! # How a session ends
//!
//! `run` always returns an explicit [`SessionOutcome`]; the supervisor
//! never has to inspect error types to tell a device reset from a dead
//! serial link from an operator Ctrl-C:
//!
//! - **`DeviceReset`** – the device sent a second `READY` in one session,
//!   meaning it rebooted under us.  Not a failure: the supervisor restarts
//!   immediately and resets its retry counter.
//! - **`ConnectionLost`** – the transport could not be opened, or broke.
//!   The supervisor counts this against the retry bound and backs off.
//! - **`Interrupted`** – the shutdown flag was observed at the top of the
//!   loop.  The supervisor exits cleanly.
//!
//! On every one of those paths the transport is closed before `run`
//! returns; the supervisor never receives a session that is still holding
//! the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keybridge_core::{format_state, parse_line, Command, EntityMap, EntityState};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::remote::RemoteStateClient;
use crate::application::transport::{DeviceConnector, LineTransport, TransportError};
use crate::domain::BridgeConfig;

/// How one session run ended.  Consumed by the supervisor's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The device re-sent `READY` mid-session: it was physically reset.
    /// A control signal, not a failure.
    DeviceReset,
    /// The transport failed to open or broke while in use.
    ConnectionLost(TransportError),
    /// The operator requested a stop; the session unwound cleanly.
    Interrupted,
}

/// Dispatch result for a single command: keep looping, or leave the session
/// because the device reset.
enum Dispatch {
    Continue,
    Reset,
}

/// One connected session between the keypad and Home Assistant.
///
/// Created fresh by the supervisor for every connection attempt, so the
/// ready counter always starts at zero and no state leaks across restarts.
pub struct BridgeSession {
    connector: Arc<dyn DeviceConnector>,
    remote: Arc<dyn RemoteStateClient>,
    entities: Arc<EntityMap>,
    config: Arc<BridgeConfig>,
    shutdown: Arc<AtomicBool>,
    /// Log-correlation id; every line this session logs carries it.
    session_id: Uuid,
    /// `READY` commands observed in this session.  The second one signals a
    /// device reset.
    ready_count: u32,
}

impl BridgeSession {
    /// Creates a session bound to its collaborators.  Nothing is opened
    /// until [`run`](Self::run) is called.
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        remote: Arc<dyn RemoteStateClient>,
        entities: Arc<EntityMap>,
        config: Arc<BridgeConfig>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connector,
            remote,
            entities,
            config,
            shutdown,
            session_id: Uuid::new_v4(),
            ready_count: 0,
        }
    }

    /// Opens the transport and drives the session to completion.
    ///
    /// A connect failure ends the session immediately: retrying is the
    /// supervisor's job, never the session's.  The transport is released on
    /// every exit path.
    pub async fn run(mut self) -> SessionOutcome {
        let session_id = self.session_id;
        info!("session {session_id}: connecting to keypad");

        let mut transport = match self.connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("session {session_id}: {e}");
                return SessionOutcome::ConnectionLost(e);
            }
        };
        info!(
            "session {session_id}: connected; bridging {} mapped keys",
            self.entities.len()
        );

        let outcome = self.drive(transport.as_mut()).await;

        // Scoped release: whatever happened above, the device is freed
        // before the supervisor decides what to do next.
        transport.close().await;
        info!("session {session_id}: ended with {outcome:?}");
        outcome
    }

    /// The read-dispatch loop.
    async fn drive(&mut self, transport: &mut dyn LineTransport) -> SessionOutcome {
        loop {
            // The shutdown flag is observed once per iteration, which the
            // short read poll below bounds to ~read_timeout latency.
            if self.shutdown.load(Ordering::Relaxed) {
                info!("session {}: stop requested", self.session_id);
                return SessionOutcome::Interrupted;
            }

            let line = match transport.read_line(self.config.read_timeout).await {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    warn!("session {}: {e}", self.session_id);
                    return SessionOutcome::ConnectionLost(e);
                }
            };

            match self.dispatch(transport, parse_line(&line)).await {
                Ok(Dispatch::Continue) => {}
                Ok(Dispatch::Reset) => return SessionOutcome::DeviceReset,
                Err(e) => {
                    warn!("session {}: {e}", self.session_id);
                    return SessionOutcome::ConnectionLost(e);
                }
            }
        }
    }

    /// Routes one parsed command.
    ///
    /// Only transport failures propagate as errors.  Remote-call failures
    /// have already been absorbed into `Unknown`/`false` by the client and
    /// are handled as degraded data here.
    async fn dispatch(
        &mut self,
        transport: &mut dyn LineTransport,
        command: Command,
    ) -> Result<Dispatch, TransportError> {
        match command {
            Command::Ready => {
                self.ready_count += 1;
                if self.ready_count > 1 {
                    // The bridge did not restart, so a repeated READY can
                    // only mean the device itself rebooted.
                    info!(
                        "session {}: device reset detected (READY #{})",
                        self.session_id, self.ready_count
                    );
                    return Ok(Dispatch::Reset);
                }
                info!("session {}: device ready, syncing states", self.session_id);
                self.reconcile(transport).await?;
            }
            Command::Heartbeat => {
                debug!("session {}: heartbeat", self.session_id);
            }
            Command::Toggle(key) => {
                self.handle_toggle(transport, key).await?;
            }
            Command::Debug(text) => {
                debug!("session {}: [device] {text}", self.session_id);
            }
            Command::Error(text) => {
                warn!("session {}: [device] {text}", self.session_id);
            }
            Command::Unknown(raw) => {
                warn!(
                    "session {}: unrecognised line from device: {raw:?}",
                    self.session_id
                );
            }
        }
        Ok(Dispatch::Continue)
    }

    /// The reconciliation pass: push every mapped key's authoritative state
    /// to the device, in ascending key order.
    ///
    /// A key whose state cannot be determined is logged and skipped; one
    /// flaky entity must not abort the sync for the rest.  A write failure,
    /// by contrast, is a transport failure and ends the session.
    async fn reconcile(&self, transport: &mut dyn LineTransport) -> Result<(), TransportError> {
        for (key, entity) in self.entities.iter() {
            match self.remote.get_state(entity).await {
                EntityState::Unknown => {
                    warn!(
                        "session {}: key {key} ({entity}): state unknown, skipped",
                        self.session_id
                    );
                }
                state => {
                    transport.write_line(&format_state(key, state.is_on())).await?;
                    info!(
                        "session {}: key {key} ({entity}): {}",
                        self.session_id,
                        if state.is_on() { "on" } else { "off" }
                    );
                }
            }
        }
        Ok(())
    }

    /// Handles one key press.
    ///
    /// Unmapped keys are a no-op beyond the log line: no remote call, no
    /// state line.  For mapped keys, a failed invoke also pushes nothing,
    /// leaving the key LED showing its previous state until the next
    /// successful toggle or `READY` resync; that inconsistency window is
    /// accepted rather than papered over with a guess.
    async fn handle_toggle(
        &self,
        transport: &mut dyn LineTransport,
        key: u8,
    ) -> Result<(), TransportError> {
        let Some(entity) = self.entities.get(key) else {
            warn!(
                "session {}: key {key} is not mapped to any entity",
                self.session_id
            );
            return Ok(());
        };

        info!("session {}: toggle key {key} ({entity})", self.session_id);
        if !self.remote.invoke(entity).await {
            warn!(
                "session {}: invoke failed for {entity}; state not pushed",
                self.session_id
            );
            return Ok(());
        }

        // Give Home Assistant a moment to apply the toggle before reading
        // the state back.
        tokio::time::sleep(self.config.settle_delay).await;

        let state = self.remote.get_state(entity).await;
        if state == EntityState::Unknown {
            warn!(
                "session {}: post-toggle state query for {entity} failed; reporting off",
                self.session_id
            );
        }
        transport.write_line(&format_state(key, state.is_on())).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
