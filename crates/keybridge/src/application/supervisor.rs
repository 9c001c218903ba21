//! The supervisor: runs sessions in a loop and decides what each outcome
//! means for the process.
//!
//! # The restart policy in one paragraph
//!
//! A device reset is routine (the keypad rebooted, power-cycled, or was
//! replugged) and restarts the session immediately with the retry counter
//! cleared.  A lost connection is a real failure: it increments the
//! counter, and once the configured bound is reached the supervisor gives
//! up so the process exits non-zero and the service manager can take over.
//! Any run of failures is forgiven in full by a single reset, because a
//! device that manages to announce `READY` is demonstrably alive.
//!
//! The supervisor is generic over [`SessionDriver`] so its state machine
//! can be tested against a scripted sequence of outcomes without a
//! transport or a remote anywhere in sight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keybridge_core::EntityMap;
use tracing::{info, warn};

use crate::application::remote::RemoteStateClient;
use crate::application::session::{BridgeSession, SessionOutcome};
use crate::application::transport::{DeviceConnector, TransportError};
use crate::domain::BridgeConfig;

/// Runs one complete session and reports how it ended.
///
/// The production implementation builds a fresh [`BridgeSession`] per call;
/// tests substitute a scripted sequence of outcomes.
#[async_trait]
pub trait SessionDriver: Send {
    async fn run_session(&mut self) -> SessionOutcome;
}

/// Production [`SessionDriver`]: a fresh session per attempt, sharing the
/// same connector, remote client, mapping, and config via `Arc`.
pub struct BridgeSessionDriver {
    connector: Arc<dyn DeviceConnector>,
    remote: Arc<dyn RemoteStateClient>,
    entities: Arc<EntityMap>,
    config: Arc<BridgeConfig>,
    shutdown: Arc<AtomicBool>,
}

impl BridgeSessionDriver {
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
        }
    }
}

#[async_trait]
impl SessionDriver for BridgeSessionDriver {
    async fn run_session(&mut self) -> SessionOutcome {
        // A fresh session per attempt: the ready counter and session id must
        // not leak across restarts.
        BridgeSession::new(
            Arc::clone(&self.connector),
            Arc::clone(&self.remote),
            Arc::clone(&self.entities),
            Arc::clone(&self.config),
            Arc::clone(&self.shutdown),
        )
        .run()
        .await
    }
}

/// How the supervisor, and therefore the process, ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Operator-requested stop; the process should exit zero.
    Interrupted,
    /// The consecutive-failure bound was hit; the process should exit
    /// non-zero so a service manager notices.
    RetriesExhausted { attempts: u32 },
}

/// Consecutive-failure bookkeeping between sessions.
#[derive(Debug, Default)]
struct RetryState {
    /// Failed attempts since the last success-equivalent (a device reset).
    attempts: u32,
    /// Most recent failure, kept for the give-up log line.
    last_failure: Option<TransportError>,
}

/// The restart/retry state machine around [`BridgeSession`] runs.
pub struct BridgeSupervisor<D: SessionDriver> {
    driver: D,
    retry_delay: Duration,
    max_retries: Option<u32>,
    shutdown: Arc<AtomicBool>,
    retry: RetryState,
}

impl<D: SessionDriver> BridgeSupervisor<D> {
    pub fn new(driver: D, config: &BridgeConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            driver,
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
            shutdown,
            retry: RetryState::default(),
        }
    }

    /// Consecutive failed attempts so far.  Exposed for tests asserting on
    /// the reset-forgives-failures rule.
    pub fn attempts(&self) -> u32 {
        self.retry.attempts
    }

    /// Runs sessions until interrupted or out of retries.
    pub async fn run(&mut self) -> SupervisorExit {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("supervisor: stop requested");
                return SupervisorExit::Interrupted;
            }

            match self.driver.run_session().await {
                SessionOutcome::Interrupted => {
                    info!("supervisor: session interrupted, shutting down");
                    return SupervisorExit::Interrupted;
                }
                SessionOutcome::DeviceReset => {
                    // The device proved itself alive; prior failures are
                    // forgiven and the restart is immediate.
                    info!("supervisor: device reset, restarting session now");
                    self.retry = RetryState::default();
                }
                SessionOutcome::ConnectionLost(e) => {
                    self.retry.attempts += 1;
                    self.retry.last_failure = Some(e);

                    if let Some(max) = self.max_retries {
                        if self.retry.attempts >= max {
                            warn!(
                                "supervisor: giving up after {} failed attempts (last: {})",
                                self.retry.attempts,
                                self.retry
                                    .last_failure
                                    .as_ref()
                                    .map(ToString::to_string)
                                    .unwrap_or_default()
                            );
                            return SupervisorExit::RetriesExhausted {
                                attempts: self.retry.attempts,
                            };
                        }
                    }

                    warn!(
                        "supervisor: session failed (attempt {}), retrying in {:?}",
                        self.retry.attempts, self.retry_delay
                    );
                    if !self.wait_retry_delay().await {
                        info!("supervisor: stop requested during retry wait");
                        return SupervisorExit::Interrupted;
                    }
                }
            }
        }
    }

    /// Sleeps for the retry delay in small slices so a shutdown request is
    /// honoured within ~50 ms instead of after the full delay.
    ///
    /// Returns `false` if shutdown was requested during the wait.
    async fn wait_retry_delay(&self) -> bool {
        const SLICE: Duration = Duration::from_millis(50);

        let mut remaining = self.retry_delay;
        while remaining > Duration::ZERO {
            if self.shutdown.load(Ordering::Relaxed) {
                return false;
            }
            let nap = remaining.min(SLICE);
            tokio::time::sleep(nap).await;
            remaining = remaining.saturating_sub(nap);
        }
        !self.shutdown.load(Ordering::Relaxed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;

    /// Replays a fixed sequence of outcomes; once exhausted it reports
    /// `Interrupted` so runaway loops end the test instead of hanging it.
    struct ScriptedDriver {
        outcomes: VecDeque<SessionOutcome>,
        calls: Arc<AtomicU32>,
        /// When set, the first call also raises this shutdown flag, which
        /// lets tests exercise interruption during the retry wait.
        raise_on_first_call: Option<Arc<AtomicBool>>,
    }

    impl ScriptedDriver {
        fn new(outcomes: Vec<SessionOutcome>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    outcomes: outcomes.into(),
                    calls: Arc::clone(&calls),
                    raise_on_first_call: None,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl SessionDriver for ScriptedDriver {
        async fn run_session(&mut self) -> SessionOutcome {
            if self.calls.fetch_add(1, Ordering::Relaxed) == 0 {
                if let Some(flag) = &self.raise_on_first_call {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            self.outcomes
                .pop_front()
                .unwrap_or(SessionOutcome::Interrupted)
        }
    }

    fn fast_config(max_retries: Option<u32>) -> BridgeConfig {
        BridgeConfig {
            retry_delay: Duration::from_millis(1),
            max_retries,
            ..Default::default()
        }
    }

    fn lost() -> SessionOutcome {
        SessionOutcome::ConnectionLost(TransportError::disconnected("unplugged"))
    }

    #[tokio::test]
    async fn test_bounded_retries_give_up_after_exactly_max_failures() {
        // Arrange: the driver would happily fail ten times, but max is 3.
        let (driver, calls) = ScriptedDriver::new(vec![lost(); 10]);
        let mut supervisor = BridgeSupervisor::new(
            driver,
            &fast_config(Some(3)),
            Arc::new(AtomicBool::new(false)),
        );

        // Act
        let exit = supervisor.run().await;

        // Assert
        assert_eq!(exit, SupervisorExit::RetriesExhausted { attempts: 3 });
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_unbounded_retries_never_give_up() {
        // 25 consecutive failures, then the script runs out and interrupts.
        let (driver, calls) = ScriptedDriver::new(vec![lost(); 25]);
        let mut supervisor =
            BridgeSupervisor::new(driver, &fast_config(None), Arc::new(AtomicBool::new(false)));

        let exit = supervisor.run().await;

        assert_eq!(exit, SupervisorExit::Interrupted);
        assert_eq!(calls.load(Ordering::Relaxed), 26);
        assert_eq!(supervisor.attempts(), 25);
    }

    #[tokio::test]
    async fn test_device_reset_clears_the_failure_count() {
        // Two failures, then a reset, then one more failure: the count must
        // end at 1, and a max of 3 must never trip.
        let (driver, calls) = ScriptedDriver::new(vec![
            lost(),
            lost(),
            SessionOutcome::DeviceReset,
            lost(),
        ]);
        let mut supervisor = BridgeSupervisor::new(
            driver,
            &fast_config(Some(3)),
            Arc::new(AtomicBool::new(false)),
        );

        let exit = supervisor.run().await;

        assert_eq!(exit, SupervisorExit::Interrupted);
        assert_eq!(calls.load(Ordering::Relaxed), 5);
        assert_eq!(supervisor.attempts(), 1);
    }

    #[tokio::test]
    async fn test_device_reset_restarts_without_the_retry_delay() {
        // A long retry delay that must never be slept: every outcome is a
        // reset, so the whole run has to finish well inside that delay.
        let (driver, _) = ScriptedDriver::new(vec![SessionOutcome::DeviceReset; 20]);
        let config = BridgeConfig {
            retry_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let mut supervisor =
            BridgeSupervisor::new(driver, &config, Arc::new(AtomicBool::new(false)));

        let exit = tokio::time::timeout(Duration::from_secs(5), supervisor.run())
            .await
            .expect("resets must not incur the retry delay");

        assert_eq!(exit, SupervisorExit::Interrupted);
    }

    #[tokio::test]
    async fn test_session_interruption_ends_the_supervisor() {
        let (driver, calls) = ScriptedDriver::new(vec![SessionOutcome::Interrupted]);
        let mut supervisor = BridgeSupervisor::new(
            driver,
            &fast_config(Some(3)),
            Arc::new(AtomicBool::new(false)),
        );

        let exit = supervisor.run().await;

        assert_eq!(exit, SupervisorExit::Interrupted);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_preset_shutdown_flag_skips_the_first_session() {
        let (driver, calls) = ScriptedDriver::new(vec![lost()]);
        let mut supervisor = BridgeSupervisor::new(
            driver,
            &fast_config(None),
            Arc::new(AtomicBool::new(true)),
        );

        let exit = supervisor.run().await;

        assert_eq!(exit, SupervisorExit::Interrupted);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_retry_wait_is_honoured_promptly() {
        // Arrange: a 60 s retry delay, with the shutdown flag raised by the
        // (only) session run.  The supervisor must notice during the wait
        // and exit long before the delay elapses.
        let shutdown = Arc::new(AtomicBool::new(false));
        let (mut driver, calls) = ScriptedDriver::new(vec![lost()]);
        driver.raise_on_first_call = Some(Arc::clone(&shutdown));

        let config = BridgeConfig {
            retry_delay: Duration::from_secs(60),
            max_retries: None,
            ..Default::default()
        };
        let mut supervisor = BridgeSupervisor::new(driver, &config, shutdown);

        // Act
        let exit = tokio::time::timeout(Duration::from_secs(5), supervisor.run())
            .await
            .expect("shutdown must interrupt the retry wait");

        // Assert
        assert_eq!(exit, SupervisorExit::Interrupted);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
