//! Unique identifiers for editor entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a change delta
///
/// Every undoable unit of work gets its own id so collaborators can tell
/// whether the change they observed is still the one on top of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeltaId(Uuid);

impl DeltaId {
    /// Creates a new random delta ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a delta ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DeltaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delta({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_id_creation() {
        let id1 = DeltaId::new();
        let id2 = DeltaId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_delta_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = DeltaId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_delta_id_display() {
        let id = DeltaId::new();
        assert!(format!("{}", id).starts_with("Delta("));
    }

    #[test]
    fn test_delta_id_serde() {
        let id = DeltaId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: DeltaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
