//! # keybridge-core
//!
//! Shared library for the keypad ⇄ Home Assistant bridge containing the
//! device line protocol and the domain entities.
//!
//! This crate is used by the bridge daemon and by its tests.  It has zero
//! dependencies on serial ports, sockets, HTTP clients, or async runtimes.
//!
//! # Architecture overview
//!
//! The bridge connects a physical keypad (a Keybow 2040 speaking a
//! newline-delimited text protocol over USB serial) to Home Assistant
//! entities.  A key press on the device toggles the mapped entity; the
//! entity's actual on/off state is pushed back so the key LED always shows
//! the truth, not an optimistic guess.
//!
//! This crate defines the two halves the daemon builds on:
//!
//! - **`protocol`** – How lines travel over the wire.  Inbound device lines
//!   (`READY`, `TOGGLE:3`, ...) parse into a typed [`Command`]; outbound
//!   state updates serialize to `STATE:<key>:<on|off>` lines.  Parsing is
//!   total: garbage never produces an error, only [`Command::Unknown`].
//!
//! - **`domain`** – Pure business types with no I/O.  [`EntityId`] knows its
//!   Home Assistant domain and which service activates it; [`EntityState`]
//!   is the tri-state (`On` / `Off` / `Unknown`) that keeps "the query
//!   failed" distinct from "the light is off"; [`EntityMap`] is the
//!   immutable key-index → entity mapping loaded once at startup.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `keybridge_core::Command` instead of `keybridge_core::protocol::commands::Command`.
pub use domain::entity::{EntityId, EntityState};
pub use domain::entity_map::{EntityMap, EntityMapError};
pub use protocol::codec::{clean_line, format_state, parse_line};
pub use protocol::commands::Command;
