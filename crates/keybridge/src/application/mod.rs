//! Application layer: the session dispatch loop, the supervisor state
//! machine, and the trait seams they are written against.
//!
//! Nothing in this layer touches a serial port or a socket directly: the
//! session talks to a [`transport::LineTransport`] and a
//! [`remote::RemoteStateClient`], both supplied by the infrastructure layer
//! in production and by mocks in tests.

pub mod remote;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use session::{BridgeSession, SessionOutcome};
pub use supervisor::{BridgeSessionDriver, BridgeSupervisor, SessionDriver, SupervisorExit};
