//! Structured query events, the bounded event log, and filtered views

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Hard ceiling on retained events. Oldest entries are evicted first.
pub const MAX_EVENTS: usize = 1000;

/// One reconstructed statement from the server log.
///
/// Immutable once constructed; produced only by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// Timestamp in the log's native format (e.g. `2024-01-10 20:30:45.123 UTC`)
    pub timestamp: String,
    /// Backend process id that executed the statement
    pub pid: i32,
    /// Role that executed the statement
    pub user: String,
    /// Database the statement ran against
    pub database: String,
    /// Full SQL text; multi-line statements are space-joined
    pub sql: String,
    /// Execution time in milliseconds, when the log recorded one
    pub duration_ms: Option<f64>,
}

/// Filter criteria for the event feed.
///
/// A derived view only; never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Case-insensitive substring matched against sql, user, or database
    pub search: String,
    /// Entries without a recorded duration are excluded once this is > 0
    pub min_duration_ms: f64,
}

impl FilterCriteria {
    /// Whether a single event passes this filter.
    pub fn matches(&self, event: &QueryEvent) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let hit = event.sql.to_lowercase().contains(&needle)
                || event.user.to_lowercase().contains(&needle)
                || event.database.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        if self.min_duration_ms > 0.0 {
            match event.duration_ms {
                Some(d) => d >= self.min_duration_ms,
                None => false,
            }
        } else {
            true
        }
    }
}

/// Ordered event feed, capped at [`MAX_EVENTS`] entries.
///
/// Insertion order equals log-emission order. Mutated only by appending a
/// batch and truncating from the front; never element-wise.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<QueryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of events, then evict the oldest past [`MAX_EVENTS`].
    pub fn append<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = QueryEvent>,
    {
        self.entries.extend(batch);
        while self.entries.len() > MAX_EVENTS {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryEvent> {
        self.entries.iter()
    }

    /// The most recent `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Vec<QueryEvent> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Pure filtered view over the current contents. Never mutates the source.
    pub fn filtered(&self, criteria: &FilterCriteria) -> Vec<QueryEvent> {
        self.entries
            .iter()
            .filter(|e| criteria.matches(e))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(sql: &str, duration_ms: Option<f64>) -> QueryEvent {
        QueryEvent {
            timestamp: "2024-01-10 20:30:45.123".to_string(),
            pid: 4242,
            user: "app".to_string(),
            database: "shop".to_string(),
            sql: sql.to_string(),
            duration_ms,
        }
    }

    #[test]
    fn test_append_respects_cap() {
        let mut log = EventLog::new();
        let batch: Vec<_> = (0..1500)
            .map(|i| event(&format!("SELECT {}", i), None))
            .collect();
        log.append(batch);

        assert_eq!(log.len(), MAX_EVENTS);
        // Oldest entries were evicted first
        assert_eq!(log.iter().next().unwrap().sql, "SELECT 500");
    }

    #[test]
    fn test_append_across_batches() {
        let mut log = EventLog::new();
        for _ in 0..10 {
            log.append((0..200).map(|i| event(&format!("SELECT {}", i), None)));
            assert!(log.len() <= MAX_EVENTS);
        }
        assert_eq!(log.len(), MAX_EVENTS);
    }

    #[test]
    fn test_duration_filter() {
        let mut log = EventLog::new();
        log.append(vec![
            event("SELECT 1", Some(5.0)),
            event("SELECT 2", Some(50.0)),
        ]);

        let criteria = FilterCriteria {
            search: String::new(),
            min_duration_ms: 10.0,
        };
        let hits = log.filtered(&criteria);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sql, "SELECT 2");
    }

    #[test]
    fn test_duration_filter_excludes_missing_duration() {
        let mut log = EventLog::new();
        log.append(vec![event("BEGIN", None), event("COMMIT", Some(12.0))]);

        let criteria = FilterCriteria {
            search: String::new(),
            min_duration_ms: 1.0,
        };
        let hits = log.filtered(&criteria);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sql, "COMMIT");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let mut log = EventLog::new();
        log.append(vec![event("SELECT * FROM Users", None)]);

        let criteria = FilterCriteria {
            search: "users".to_string(),
            min_duration_ms: 0.0,
        };
        assert_eq!(log.filtered(&criteria).len(), 1);
    }

    #[test]
    fn test_search_matches_user_and_database() {
        let mut log = EventLog::new();
        log.append(vec![event("SELECT 1", None)]);

        for needle in ["APP", "SHOP"] {
            let criteria = FilterCriteria {
                search: needle.to_string(),
                min_duration_ms: 0.0,
            };
            assert_eq!(log.filtered(&criteria).len(), 1, "needle: {}", needle);
        }

        let criteria = FilterCriteria {
            search: "nomatch".to_string(),
            min_duration_ms: 0.0,
        };
        assert!(log.filtered(&criteria).is_empty());
    }

    #[test]
    fn test_tail() {
        let mut log = EventLog::new();
        log.append((0..5).map(|i| event(&format!("SELECT {}", i), None)));

        let last_two = log.tail(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].sql, "SELECT 3");
        assert_eq!(last_two[1].sql, "SELECT 4");

        assert_eq!(log.tail(100).len(), 5);
    }

    #[test]
    fn test_filtered_does_not_mutate() {
        let mut log = EventLog::new();
        log.append(vec![event("SELECT 1", Some(5.0))]);

        let _ = log.filtered(&FilterCriteria {
            search: "zzz".to_string(),
            min_duration_ms: 100.0,
        });
        assert_eq!(log.len(), 1);
    }
}
