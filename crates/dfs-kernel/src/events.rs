//! Append-only audit log of administrative actions.
//!
//! Every mutating facade call appends one event. The log is kept for
//! observability and tests; nothing reads it to make decisions.

use serde::Serialize;
use std::time::SystemTime;

/// One audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: u64,
    pub description: String,
    pub timestamp: SystemTime,
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its id.
    pub fn record(&mut self, description: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let event = Event {
            id,
            description: description.into(),
            timestamp: SystemTime::now(),
        };
        tracing::info!(event_id = event.id, "{}", event.description);
        self.events.push(event);

        id
    }

    /// Get the last N events.
    pub fn recent(&self, limit: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(limit);
        &self.events[start..]
    }

    /// Get all events.
    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_monotonic() {
        let mut log = EventLog::new();
        assert_eq!(log.record("cd docs"), 0);
        assert_eq!(log.record("up"), 1);
        assert_eq!(log.record("mkdir root/x"), 2);

        let ids: Vec<_> = log.all().iter().map(|e| e.id).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_recent() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.record(format!("write root/{i}"));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "write root/3");
        assert_eq!(recent[1].description, "write root/4");
        assert_eq!(log.recent(100).len(), 5);
    }

    #[test]
    fn test_json_shape() {
        let mut log = EventLog::new();
        log.record("up");
        let json = serde_json::to_value(&log.all()[0]).unwrap();
        assert_eq!(json["id"], 0);
        assert_eq!(json["description"], "up");
        assert!(json["timestamp"].is_object());
    }
}
