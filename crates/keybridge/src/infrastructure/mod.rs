//! Infrastructure layer: concrete implementations of the application-layer
//! seams.
//!
//! - [`serial`] – the real serial-port transport and its connector.
//! - [`ha_client`] – the Home Assistant REST client.
//! - [`mock`] – scripted in-memory implementations used by the application
//!   tests and the integration tests.

pub mod ha_client;
pub mod mock;
pub mod serial;
