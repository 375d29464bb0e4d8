//! Memory entry: one timestamped, importance-rated observation.
//!
//! Entries are immutable once created. Importance is clamped into
//! [`MIN_IMPORTANCE`, `MAX_IMPORTANCE`] at construction and never changes;
//! a re-rated observation is a new entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest importance an entry can carry.
pub const MIN_IMPORTANCE: u8 = 1;

/// Highest importance an entry can carry.
pub const MAX_IMPORTANCE: u8 = 10;

/// Clamp an arbitrary integer rating into the importance range.
pub fn clamp_importance(raw: i64) -> u8 {
    raw.clamp(MIN_IMPORTANCE as i64, MAX_IMPORTANCE as i64) as u8
}

/// A single memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    created_at: DateTime<Utc>,
    content: String,
    importance: u8,
}

impl MemoryEntry {
    /// Create an entry stamped with the current time.
    pub fn new(content: impl Into<String>, importance: i64) -> Self {
        Self::with_timestamp(content, importance, Utc::now())
    }

    /// Create an entry with an explicit creation time.
    pub fn with_timestamp(
        content: impl Into<String>,
        importance: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            created_at,
            content: content.into(),
            importance: clamp_importance(importance),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn importance(&self) -> u8 {
        self.importance
    }

    /// `"[HH:MM:SS] content"` in local time.
    pub fn render_line(&self) -> String {
        format!(
            "[{}] {}",
            self.created_at
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S"),
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_is_clamped_on_creation() {
        assert_eq!(MemoryEntry::new("a", -4).importance(), 1);
        assert_eq!(MemoryEntry::new("b", 0).importance(), 1);
        assert_eq!(MemoryEntry::new("c", 7).importance(), 7);
        assert_eq!(MemoryEntry::new("d", 42).importance(), 10);
    }

    #[test]
    fn render_line_has_time_prefix() {
        let line = MemoryEntry::new("editing main.rs", 5).render_line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] editing main.rs"));
    }

    #[test]
    fn memory_entry_serialization() {
        let entry = MemoryEntry::new("The user is debugging a login error", 9);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("login error"));
        assert!(json.contains(r#""importance":9"#));
    }
}
