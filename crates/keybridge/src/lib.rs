//! Keypad ⇄ Home Assistant bridge daemon library.
//!
//! The binary in `main.rs` is a thin shell: parse CLI arguments, initialise
//! logging, install the Ctrl-C handler, and run the supervisor.  Everything
//! testable lives here, layered the same way throughout the workspace:
//!
//! ```text
//! main()
//!  └─ BridgeSupervisor            restart/retry state machine
//!      └─ BridgeSession           one connected session
//!          ├─ LineTransport       serial line framing   (infrastructure/serial)
//!          └─ RemoteStateClient   Home Assistant REST   (infrastructure/ha_client)
//! ```
//!
//! - **`domain`** – [`BridgeConfig`], the single immutable configuration
//!   value constructed once at startup and passed explicitly into
//!   constructors.  Nothing in this crate reads ambient/global state.
//! - **`application`** – the session dispatch loop and the supervisor, both
//!   written against trait seams so tests can substitute a scripted
//!   transport and a mock remote client.
//! - **`infrastructure`** – the real adapters: a tokio-serial line transport
//!   and a reqwest client for the Home Assistant REST API, plus the
//!   recording mocks used by unit and integration tests.
//!
//! [`BridgeConfig`]: domain::config::BridgeConfig

pub mod application;
pub mod domain;
pub mod infrastructure;
