//! Home Assistant entity identifiers and the tri-state entity state.

use std::fmt;

/// An addressable automation object in Home Assistant, identified by a
/// string of the form `domain.name` (e.g. `switch.living_room_lights`,
/// `scene.movie_night`).
///
/// The identifier is treated as opaque text except for one structural fact:
/// the prefix before the first `.` is the entity's *domain*, which selects
/// the service verb used to activate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps a raw identifier string.  No validation is performed; Home
    /// Assistant is the authority on which ids exist; an unknown id simply
    /// yields failed remote calls, which the bridge already tolerates.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier, e.g. `switch.living_room_lights`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The domain prefix before the first `.`.
    ///
    /// An identifier without a separator is its own domain; the REST call
    /// will simply fail and degrade, same as any other bad id.
    pub fn domain(&self) -> &str {
        match self.0.split_once('.') {
            Some((domain, _)) => domain,
            None => &self.0,
        }
    }

    /// The service verb that "activates" this entity.
    ///
    /// Scenes and scripts are one-shot: they have no meaningful off state,
    /// so pressing their key runs `turn_on`.  Everything else (switches,
    /// lights, ...) genuinely toggles.
    pub fn activation_service(&self) -> &'static str {
        match self.domain() {
            "scene" | "script" => "turn_on",
            _ => "toggle",
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The bridge's view of a remote entity's state.
///
/// `Unknown` means the query failed (transport error, non-200, missing
/// field); it is **never** conflated with `Off`.  A light that is off and
/// a Home Assistant that is unreachable are different situations and the
/// reconciliation logic treats them differently: `Off` is pushed to the
/// device LED, `Unknown` is logged and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    On,
    Off,
    Unknown,
}

impl EntityState {
    /// Interprets a remote query result.
    ///
    /// - `Some("on")` → `On`
    /// - `Some(_)` → `Off`; non-binary states exist (`unavailable`, a
    ///   scene's last-activated timestamp) and the key LED displays them as
    ///   off, matching how the device behaves for anything that is not
    ///   actively on.
    /// - `None` (the query itself failed) → `Unknown`
    pub fn from_remote(state: Option<&str>) -> Self {
        match state {
            Some("on") => Self::On,
            Some(_) => Self::Off,
            None => Self::Unknown,
        }
    }

    /// Whether the entity is definitely on.
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
