//! The immutable key-index → entity mapping.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::entity::EntityId;

/// Error building an [`EntityMap`] from configuration pairs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityMapError {
    /// The same key index was mapped twice.  Silently keeping one of the two
    /// entities would toggle the wrong device, so this is a startup error.
    #[error("key {key} is mapped more than once")]
    DuplicateKey { key: u8 },
}

/// Immutable mapping from physical key index to Home Assistant entity.
///
/// Built once at startup from configuration and read-only thereafter; the
/// session only ever looks keys up.  A `BTreeMap` keeps iteration ordered by
/// key index so the reconciliation pass pushes states deterministically.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entries: BTreeMap<u8, EntityId>,
}

impl EntityMap {
    /// Builds a map from `(key, entity)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`EntityMapError::DuplicateKey`] if any key index appears
    /// more than once.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (u8, EntityId)>,
    ) -> Result<Self, EntityMapError> {
        let mut entries = BTreeMap::new();
        for (key, entity) in pairs {
            if entries.insert(key, entity).is_some() {
                return Err(EntityMapError::DuplicateKey { key });
            }
        }
        Ok(Self { entries })
    }

    /// Looks up the entity mapped to `key`, if any.
    pub fn get(&self, key: u8) -> Option<&EntityId> {
        self.entries.get(&key)
    }

    /// Iterates all mappings in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &EntityId)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are mapped (a configuration error at startup, but a
    /// valid value for the type itself).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
