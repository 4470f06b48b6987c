use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque conversation thread identifier.
///
/// Freshly minted ids are v4 uuids, but any caller-supplied string is
/// accepted: the store treats unknown ids as fresh threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_ids_are_unique() {
        let a = ThreadId::new();
        let b = ThreadId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn thread_id_display_matches_as_str() {
        let tid = ThreadId::new();
        assert_eq!(tid.to_string(), tid.as_str());
    }

    #[test]
    fn thread_id_accepts_caller_strings() {
        let tid = ThreadId::from("session-42");
        assert_eq!(tid.as_str(), "session-42");
    }

    #[test]
    fn thread_id_serialization_round_trip() {
        let tid = ThreadId::new();
        let json = serde_json::to_string(&tid).unwrap();
        let back: ThreadId = serde_json::from_str(&json).unwrap();
        assert_eq!(tid, back);
    }

    #[test]
    fn thread_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let t1 = ThreadId::new();
        let t2 = t1.clone();
        set.insert(t1);
        set.insert(t2);
        assert_eq!(set.len(), 1);
    }
}
