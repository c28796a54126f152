//! ID generation utilities.

use uuid::Uuid;

/// Type-safe wrapper for an event source session ID.
///
/// Every event carries the ID of the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EventSourceId(String);

impl EventSourceId {
    /// Create a new random session ID.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tether_core::EventSourceId;
    ///
    /// let id = EventSourceId::new();
    /// assert!(id.as_str().starts_with("es_"));
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self(format!("es_{}", Uuid::new_v4().simple()))
    }

    /// Create from an existing string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventSourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventSourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventSourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EventSourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = EventSourceId::new();
        let b = EventSourceId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 35);
    }

    #[test]
    fn test_from_string() {
        let id = EventSourceId::from_string("es_fixed");
        assert_eq!(id.to_string(), "es_fixed");
        assert_eq!(EventSourceId::from("es_fixed"), id);
    }
}
