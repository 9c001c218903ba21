//! The remote-state seam between the session and the automation system.
//!
//! # Why the signatures are infallible
//!
//! The session must never be crashed, or even early-returned, by remote
//! flakiness.  A timeout, a 500, a malformed body: from the session's point
//! of view these are all just "I don't know" ([`EntityState::Unknown`]) or
//! "that didn't work" (`false`).  Encoding that policy in the trait
//! signature makes it impossible for an implementation to leak an error past
//! this seam; retries, if any, are the supervisor's business at a much
//! higher level.

use async_trait::async_trait;
use keybridge_core::{EntityId, EntityState};

/// Stateless request/response client against the remote automation system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStateClient: Send + Sync {
    /// Queries the entity's current state.
    ///
    /// Every failure mode (transport error, non-200 status, missing state
    /// field) degrades to [`EntityState::Unknown`].
    async fn get_state(&self, entity: &EntityId) -> EntityState;

    /// Toggles the entity, or activates it for one-shot domains like
    /// scenes and scripts.
    ///
    /// Returns `false` on any failure.  Deliberately does not report *why*:
    /// the caller's only decision is whether to re-query and push state, and
    /// the implementation has already logged the detail.
    async fn invoke(&self, entity: &EntityId) -> bool;
}
