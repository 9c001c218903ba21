//! Pure domain types: entity identifiers, the tri-state entity state, and
//! the immutable key → entity mapping.  No I/O, no async, no globals.

pub mod entity;
pub mod entity_map;
