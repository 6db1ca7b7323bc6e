//! Log-line parsing and multi-line statement reconstruction
//!
//! Input is a raw chunk of log text produced with
//! `log_line_prefix = '%m [%p] %u@%d '`. A statement-start line carries the
//! prefix; continuation lines (multi-line SQL) start with whitespace and are
//! space-joined onto the statement in progress. Malformed lines are skipped
//! without aborting the batch.

use crate::event::QueryEvent;
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL fragments emitted by pglens itself while tailing. Entries whose text
/// contains any of these are dropped so the tool never appears in its own feed.
pub const INTERNAL_MARKERS: [&str; 4] = [
    "pg_ls_logdir",
    "pg_read_binary_file",
    "pg_reload_conf",
    "alter system",
];

// %m renders as `2024-01-10 20:30:45.123 UTC`; the timezone token is absent
// on some platforms, so it is optional here.
static STATEMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}(?: [A-Z][A-Z0-9+\-]*)?) \[(\d+)\] (\w+)@(\w+) (.*)$",
    )
    .expect("statement pattern is valid")
});

static DURATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"duration: ([\d.]+) ms").expect("duration pattern is valid"));

static CONTINUATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+(.+)$").expect("continuation pattern is valid"));

/// Reconstructs [`QueryEvent`]s from raw log chunks.
///
/// Holds the entry still being assembled across lines; the next
/// statement-start line or end of input finalizes it.
#[derive(Debug)]
pub struct LogParser {
    watcher_pid: i32,
    in_progress: Option<QueryEvent>,
}

impl LogParser {
    /// `watcher_pid` is the backend pid of the watching connection; its own
    /// statements are suppressed from the output.
    pub fn new(watcher_pid: i32) -> Self {
        Self {
            watcher_pid,
            in_progress: None,
        }
    }

    /// Parse one chunk of log text into query events.
    ///
    /// Unparseable lines are skipped; the entry in progress at end of input
    /// is finalized.
    pub fn parse_chunk(&mut self, content: &str) -> Vec<QueryEvent> {
        let mut out = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = STATEMENT_PATTERN.captures(line) {
                let Ok(pid) = caps[2].parse::<i32>() else {
                    // Corrupted pid field; skip the line, keep the batch.
                    continue;
                };

                self.finalize(&mut out);

                let rest = caps[5].to_string();
                let duration_ms = DURATION_PATTERN
                    .captures(&rest)
                    .and_then(|d| d[1].parse::<f64>().ok());

                self.in_progress = Some(QueryEvent {
                    timestamp: caps[1].to_string(),
                    pid,
                    user: caps[3].to_string(),
                    database: caps[4].to_string(),
                    sql: rest,
                    duration_ms,
                });
            } else if let Some(entry) = self.in_progress.as_mut() {
                if let Some(caps) = CONTINUATION_PATTERN.captures(line) {
                    entry.sql.push(' ');
                    entry.sql.push_str(caps[1].trim());
                }
            }
        }

        self.finalize(&mut out);
        out
    }

    fn finalize(&mut self, out: &mut Vec<QueryEvent>) {
        if let Some(entry) = self.in_progress.take() {
            if self.should_include(&entry) {
                out.push(entry);
            }
        }
    }

    /// Echo suppression: drop the watcher's own statements and the tailing
    /// machinery's queries.
    fn should_include(&self, entry: &QueryEvent) -> bool {
        if entry.pid == self.watcher_pid {
            return false;
        }

        let sql_lower = entry.sql.to_lowercase();
        !INTERNAL_MARKERS.iter().any(|m| sql_lower.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCHER_PID: i32 = 999;

    fn parse(content: &str) -> Vec<QueryEvent> {
        LogParser::new(WATCHER_PID).parse_chunk(content)
    }

    #[test]
    fn test_single_statement() {
        let events = parse(
            "2024-01-10 20:30:45.123 [4242] app@shop LOG:  statement: SELECT * FROM orders",
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, "2024-01-10 20:30:45.123");
        assert_eq!(events[0].pid, 4242);
        assert_eq!(events[0].user, "app");
        assert_eq!(events[0].database, "shop");
        assert!(events[0].sql.contains("SELECT * FROM orders"));
        assert_eq!(events[0].duration_ms, None);
    }

    #[test]
    fn test_timestamp_with_timezone() {
        let events =
            parse("2024-01-10 20:30:45.123 UTC [4242] app@shop LOG:  statement: SELECT 1");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, "2024-01-10 20:30:45.123 UTC");
    }

    #[test]
    fn test_duration_extraction() {
        let events = parse(
            "2024-01-10 20:30:45.123 [4242] app@shop LOG:  duration: 15.5 ms  statement: SELECT 1",
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_ms, Some(15.5));
    }

    #[test]
    fn test_multiline_reconstruction() {
        let chunk = "2024-01-10 20:30:45.123 [4242] app@shop LOG:  statement: SELECT id, name\n\
                     \tFROM users\n\
                     \tWHERE active = true";
        let events = parse(chunk);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].sql,
            "LOG:  statement: SELECT id, name FROM users WHERE active = true"
        );
    }

    #[test]
    fn test_continuations_joined_in_order() {
        let chunk = "2024-01-10 20:30:45.123 [4242] app@shop one\n  two\n  three\n  four";
        let events = parse(chunk);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sql, "one two three four");
    }

    #[test]
    fn test_echo_suppression() {
        let chunk = format!(
            "2024-01-10 20:30:45.123 [{}] postgres@shop LOG:  statement: SELECT 1\n\
             2024-01-10 20:30:45.456 [4242] app@shop LOG:  statement: SELECT 2",
            WATCHER_PID
        );
        let events = parse(&chunk);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pid, 4242);
        assert!(events.iter().all(|e| e.pid != WATCHER_PID));
    }

    #[test]
    fn test_internal_markers_filtered() {
        let chunk = "\
2024-01-10 20:30:45.100 [4242] postgres@shop LOG:  statement: SELECT name, size FROM pg_ls_logdir()
2024-01-10 20:30:45.200 [4242] postgres@shop LOG:  statement: SELECT convert_from(pg_read_binary_file('log/x', 0, 100), 'UTF8')
2024-01-10 20:30:45.300 [4242] postgres@shop LOG:  statement: SELECT pg_reload_conf()
2024-01-10 20:30:45.400 [4242] postgres@shop LOG:  statement: ALTER SYSTEM SET log_line_prefix = 'x'
2024-01-10 20:30:45.500 [4242] app@shop LOG:  statement: SELECT * FROM orders";
        let events = parse(chunk);

        assert_eq!(events.len(), 1);
        assert!(events[0].sql.contains("orders"));
    }

    #[test]
    fn test_malformed_line_skipped() {
        let chunk = "2024-01-10 20:30:45.123 [4242] app@shop LOG:  statement: SELECT a\n\
                     \u{fffd}\u{fffd}garbage bytes here\n\
                     \tFROM t";
        let events = parse(chunk);

        // Corrupted middle line is skipped; the continuation still lands.
        assert_eq!(events.len(), 1);
        assert!(events[0].sql.ends_with("FROM t"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let events = parse("\n\n   \n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_continuation_without_open_entry_is_ignored() {
        let events = parse("   dangling continuation line");
        assert!(events.is_empty());
    }

    #[test]
    fn test_two_statements_flush_first() {
        let chunk = "2024-01-10 20:30:45.123 [4242] app@shop first\n\
                     2024-01-10 20:30:46.456 [4243] app@shop second";
        let events = parse(chunk);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sql, "first");
        assert_eq!(events[1].sql, "second");
    }

    #[test]
    fn test_entry_finalized_at_end_of_input() {
        let mut parser = LogParser::new(WATCHER_PID);
        let events =
            parser.parse_chunk("2024-01-10 20:30:45.123 [4242] app@shop LOG:  statement: SELECT 1");
        assert_eq!(events.len(), 1);

        // Nothing carried over once the chunk is flushed.
        assert!(parser.parse_chunk("").is_empty());
    }
}
