//! Sequential delivery of measurement events to a monitor.
//!
//! The measurement side only holds an `mpsc::Sender<MonitorEvent>`; the monitor is
//! driven by a single task draining the channel, so events are handled one at a time
//! and in the order they were sent.
//!
//! ```rust,ignore
//! let (tx, rx) = mpsc::channel(256);
//! let task = tokio::spawn(async move {
//!     let mut monitor = TextMonitor::default();
//!     drive(&mut monitor, rx).await;
//!     monitor
//! });
//! tx.send(MonitorEvent::Database(DatabaseNews::added("root/T", 3.0))).await?;
//! ```

use super::TextMonitor;
use crate::database::{DatabaseNews, DatabaseValue};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Event delivered to a monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Structural change of the database
    Database(DatabaseNews),
    /// New value of a monitored path
    Value {
        /// Database path
        path: String,
        /// New value
        value: DatabaseValue,
    },
}

impl From<DatabaseNews> for MonitorEvent {
    fn from(news: DatabaseNews) -> Self {
        MonitorEvent::Database(news)
    }
}

/// Handle every event of `events` until all senders are dropped.
///
/// Failures are logged and do not stop the loop. Returns the number of events handled.
pub async fn drive(monitor: &mut TextMonitor, mut events: mpsc::Receiver<MonitorEvent>) -> usize {
    let mut handled = 0;
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::Database(news) => {
                let path = news.path().to_string();
                if let Err(e) = monitor.handle_database_change(news) {
                    error!(path = %path, error = %e, "failed to handle database change");
                }
            }
            MonitorEvent::Value { path, value } => {
                monitor.process_news(&path, value);
            }
        }
        handled += 1;
    }
    debug!(handled, "monitor event stream closed");
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::section::Section;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_are_handled_in_order() {
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            let mut monitor = TextMonitor::default();
            let handled = drive(&mut monitor, rx).await;
            (monitor, handled)
        });

        tx.send(DatabaseNews::added("root/a", 1).into()).await.unwrap();
        tx.send(DatabaseNews::added("root/b", 2).into()).await.unwrap();
        tx.send(MonitorEvent::Value {
            path: "root/a".to_string(),
            value: json!(10),
        })
        .await
        .unwrap();
        tx.send(DatabaseNews::removed("root/b").into()).await.unwrap();
        tx.send(DatabaseNews::added("root/b", 3).into()).await.unwrap();
        drop(tx);

        let (monitor, handled) = task.await.unwrap();
        assert_eq!(handled, 5);
        assert_eq!(monitor.displayed_values(), vec![("a", "10"), ("b", "3")]);
        assert_eq!(
            monitor.store().paths_in(Section::Displayed),
            vec!["root/a", "root/b"]
        );
    }
}
