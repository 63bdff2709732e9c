//! User-facing notices.
//!
//! Some situations are worth telling the user about without being errors, e.g. a
//! restored state that does not account for every entry. Such notices go through a
//! [`NoticeSink`]; the default sink writes them to the log.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Receiver of informational, non-fatal notices.
pub trait NoticeSink: Send + Sync + Debug {
    /// Show an informational message.
    fn information(&self, title: &str, text: &str);
}

/// Sink forwarding notices to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn information(&self, title: &str, text: &str) {
        warn!(title, "{text}");
    }
}

/// Sink keeping every notice in memory, for frontends that poll.
#[derive(Debug, Default, Clone)]
pub struct RecordedNotices {
    notices: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordedNotices {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded `(title, text)` pairs.
    pub fn take(&self) -> Vec<(String, String)> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NoticeSink for RecordedNotices {
    fn information(&self, title: &str, text: &str) {
        let mut notices = match self.notices.lock() {
            Ok(notices) => notices,
            Err(poisoned) => poisoned.into_inner(),
        };
        notices.push((title.to_string(), text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_recorded_notices() {
        let sink = RecordedNotices::new();
        sink.information("Unhandled entries", "root/a");
        let clone = sink.clone();
        clone.information("Unhandled entries", "root/b");

        let notices = sink.take();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].1, "root/b");
        assert!(sink.take().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_log_notices() {
        LogNotices.information("Unhandled entries", "entries were added to displayed");
        assert!(logs_contain("entries were added to displayed"));
    }
}
