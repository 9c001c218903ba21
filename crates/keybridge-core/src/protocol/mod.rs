//! The device line protocol.
//!
//! One command per line, newline-terminated, UTF-8 text.  [`commands`]
//! defines the typed representation; [`codec`] converts between raw lines
//! and types.

pub mod codec;
pub mod commands;
