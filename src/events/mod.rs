//! Process-wide log/notification channel.
//!
//! Every worker emits [`LogEvent`]s through a cloned [`EventBus`]; zero or
//! more observers subscribe and receive their own copy of each event. Built
//! on `tokio::sync::broadcast`, which gives FIFO delivery per emitter and
//! lets subscription happen concurrently with emission. Emissions are also
//! mirrored to `tracing` so structured logs exist even with no subscriber.

use chrono::{DateTime, Local};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default capacity of the broadcast channel. Slow observers that fall more
/// than this many events behind see a `Lagged` error, not blocked emitters.
const DEFAULT_CAPACITY: usize = 256;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    /// A completed operation worth surfacing (e.g. memory freed).
    Success,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Success => write!(f, "SUCCESS"),
        }
    }
}

/// One immutable log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Local>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Multi-producer/multi-consumer event channel.
///
/// Cheap to clone; all clones feed the same set of subscribers. Dropping
/// every receiver does not fail emission — events are simply discarded,
/// matching the "zero or more observers" contract.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LogEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        let event = LogEvent::new(level, message);
        match event.level {
            LogLevel::Info | LogLevel::Success => info!("{}", event.message),
            LogLevel::Warning => warn!("{}", event.message),
            LogLevel::Error => error!("{}", event.message),
        }
        // send() only errors when there are no receivers; that is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(LogLevel::Info, "first");
        bus.emit(LogLevel::Error, "second");
        bus.emit(LogLevel::Success, "third");

        assert_eq!(rx.recv().await.unwrap().message, "first");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.message, "second");
        assert_eq!(second.level, LogLevel::Error);
        assert_eq!(rx.recv().await.unwrap().message, "third");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_get_a_copy() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(LogLevel::Info, "fan-out");

        assert_eq!(rx1.recv().await.unwrap().message, "fan-out");
        assert_eq!(rx2.recv().await.unwrap().message, "fan-out");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(LogLevel::Warning, "nobody listening");
    }

    #[tokio::test]
    async fn test_cloned_bus_feeds_same_subscribers() {
        let bus = EventBus::new();
        let worker_bus = bus.clone();
        let mut rx = bus.subscribe();

        worker_bus.emit(LogLevel::Info, "from worker");
        assert_eq!(rx.recv().await.unwrap().message, "from worker");
    }

    #[test]
    fn test_event_display_format() {
        let event = LogEvent::new(LogLevel::Success, "freed 512 MB");
        let rendered = event.to_string();
        assert!(rendered.contains("[SUCCESS]"));
        assert!(rendered.ends_with("freed 512 MB"));
    }
}
