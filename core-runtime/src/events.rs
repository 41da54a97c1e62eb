//! # Event Bus System
//!
//! Provides an event-driven architecture for the artwork core using `tokio::sync::broadcast`.
//! Components publish typed events; hosts subscribe instead of registering callbacks
//! on a global signal registry.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐
//! │ ArtworkStore ├────────────>│           │
//! └──────────────┘             │ EventBus  │    subscribe   ┌────────────┐
//! ┌──────────────┐    emit     │ (broadcast├───────────────>│ Subscriber │
//! │  Composite   ├────────────>│  channel) │                └────────────┘
//! └──────────────┘             │           │
//! ┌──────────────┐    emit     │           │    subscribe   ┌────────────┐
//! │   Sweeper    ├────────────>│           ├───────────────>│ Subscriber │
//! └──────────────┘             └───────────┘                └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Artwork(ArtworkEvent::Changed {
//!         name: "Kind of Blue".to_string(),
//!         category: "ALBUM".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Artwork changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Artwork content changes
    Artwork(ArtworkEvent),
    /// Housekeeping passes
    Maintenance(MaintenanceEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Artwork(e) => e.description(),
            CoreEvent::Maintenance(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Artwork(ArtworkEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Maintenance(MaintenanceEvent::SweepCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Artwork(ArtworkEvent::Changed { .. })
            | CoreEvent::Artwork(ArtworkEvent::Cleared { .. }) => EventSeverity::Info,
            CoreEvent::Maintenance(MaintenanceEvent::SweepCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Artwork Events
// ============================================================================

/// Events describing changes to stored artwork.
///
/// `category` is the identity prefix (`ALBUM`, `ARTIST`, `WEB`, `ROUNDED`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ArtworkEvent {
    /// Canonical artwork was stored or replaced (possibly with a known-absent marker).
    Changed { name: String, category: String },
    /// Canonical artwork and its renditions were removed.
    Cleared { name: String, category: String },
    /// A composite mosaic was rendered and persisted.
    CompositeStored {
        name: String,
        /// Device pixels
        width: u32,
        height: u32,
    },
    /// A remote lookup failed before any candidate could be evaluated.
    DownloadFailed {
        name: String,
        category: String,
        message: String,
    },
}

impl ArtworkEvent {
    fn description(&self) -> &str {
        match self {
            ArtworkEvent::Changed { .. } => "Artwork changed",
            ArtworkEvent::Cleared { .. } => "Artwork cleared",
            ArtworkEvent::CompositeStored { .. } => "Composite artwork stored",
            ArtworkEvent::DownloadFailed { .. } => "Artwork download failed",
        }
    }

    /// Identity name the event refers to.
    pub fn name(&self) -> &str {
        match self {
            ArtworkEvent::Changed { name, .. }
            | ArtworkEvent::Cleared { name, .. }
            | ArtworkEvent::CompositeStored { name, .. }
            | ArtworkEvent::DownloadFailed { name, .. } => name,
        }
    }
}

// ============================================================================
// Maintenance Events
// ============================================================================

/// Events emitted by housekeeping passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MaintenanceEvent {
    /// One retention sweep over a directory finished.
    SweepCompleted {
        directory: String,
        scanned: u64,
        removed: u64,
        failed: u64,
    },
}

impl MaintenanceEvent {
    fn description(&self) -> &str {
        match self {
            MaintenanceEvent::SweepCompleted { .. } => "Retention sweep completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it will
    /// receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let artwork_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Artwork(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(name: &str) -> CoreEvent {
        CoreEvent::Artwork(ArtworkEvent::Changed {
            name: name.to_string(),
            category: "ALBUM".to_string(),
        })
    }

    fn sweep(failed: u64) -> CoreEvent {
        CoreEvent::Maintenance(MaintenanceEvent::SweepCompleted {
            directory: "/cache/artwork".to_string(),
            scanned: 10,
            removed: 3,
            failed,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(changed("a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Artwork(ArtworkEvent::Cleared {
            name: "Nina Simone".to_string(),
            category: "ARTIST".to_string(),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Artwork(_)));

        bus.emit(sweep(0)).ok();
        let artwork_event = changed("Blue Train");
        bus.emit(artwork_event.clone()).ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, artwork_event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(changed(&format!("album-{}", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Artwork(ArtworkEvent::DownloadFailed {
            name: "x".to_string(),
            category: "ALBUM".to_string(),
            message: "offline".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(sweep(2).severity(), EventSeverity::Warning);
        assert_eq!(sweep(0).severity(), EventSeverity::Info);
        assert_eq!(changed("x").severity(), EventSeverity::Info);

        let composite = CoreEvent::Artwork(ArtworkEvent::CompositeStored {
            name: "Jazz".to_string(),
            width: 200,
            height: 200,
        });
        assert_eq!(composite.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description_and_name() {
        assert_eq!(changed("x").description(), "Artwork changed");
        assert_eq!(sweep(0).description(), "Retention sweep completed");

        let event = ArtworkEvent::Cleared {
            name: "Kind of Blue".to_string(),
            category: "ALBUM".to_string(),
        };
        assert_eq!(event.name(), "Kind of Blue");
    }

    #[test]
    fn test_event_serialization() {
        let event = changed("Giant Steps");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Giant Steps"));
        assert!(json.contains("\"type\":\"Artwork\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(changed("a")).ok();
        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, changed("a"));
    }
}
