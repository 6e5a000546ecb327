//! Typed identifier wrappers.
//!
//! Factor layers and simulation runs each get a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. Factor identifiers are
//! small integers assigned by configuration; their ascending order is the
//! canonical feature-vector order seen by the prediction oracle, so the
//! assignment must stay stable for a trained model to remain meaningful.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a driver-factor layer.
///
/// Factor identifiers double as the canonical ordering key: wherever the
/// engine gathers per-cell feature vectors, factors appear in ascending
/// `FactorId` order. Reassigning identifiers changes model input semantics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FactorId(pub u16);

impl FactorId {
    /// Create a factor identifier from its raw integer value.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Return the raw integer value.
    pub const fn into_inner(self) -> u16 {
        self.0
    }
}

impl core::fmt::Display for FactorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "factor#{}", self.0)
    }
}

impl From<u16> for FactorId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<FactorId> for u16 {
    fn from(id: FactorId) -> Self {
        id.0
    }
}

/// Unique identifier for one simulation run.
///
/// Uses UUID v7 (time-ordered) so run artifacts sort chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new run identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<RunId> for Uuid {
    fn from(id: RunId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn factor_ids_order_by_raw_value() {
        let a = FactorId::new(1);
        let b = FactorId::new(6);
        assert!(a < b);
        assert_eq!(a.into_inner(), 1);
    }

    #[test]
    fn factor_id_serializes_transparently() {
        let id = FactorId::new(3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "3");
        let back: FactorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
