//! Status bus implementation.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::data::{PrintEngineState, PrinterStatus, StateChange};

/// Subscription handle for unsubscribing from status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only some status snapshots
#[derive(Debug, Clone, Default)]
pub enum StatusFilter {
    /// Receive every snapshot.
    #[default]
    All,
    /// Only snapshots that mark entering a state.
    EnteringOnly,
    /// Only snapshots for these states.
    States(Vec<PrintEngineState>),
}

impl StatusFilter {
    /// Check if a snapshot matches this filter
    pub fn matches(&self, status: &PrinterStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::EnteringOnly => status.change == StateChange::Entering,
            StatusFilter::States(states) => states.contains(&status.state),
        }
    }
}

type StatusHandler = Arc<dyn Fn(PrinterStatus) + Send + Sync>;

/// Configuration for the status bus
#[derive(Debug, Clone)]
pub struct StatusBusConfig {
    /// Channel capacity for broadcast.
    pub channel_capacity: usize,
    /// Whether to keep a history of snapshots.
    pub enable_history: bool,
    /// Maximum number of snapshots to retain in history.
    pub max_history_size: usize,
    /// How long to retain snapshots in history.
    pub history_retention: Duration,
}

impl Default for StatusBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            enable_history: false,
            max_history_size: 500,
            history_retention: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
struct TimestampedStatus {
    status: PrinterStatus,
    timestamp: Instant,
}

/// Fan-out of printer status snapshots
pub struct StatusBus {
    sender: broadcast::Sender<PrinterStatus>,
    /// Handlers in subscription order
    handlers: Arc<RwLock<Vec<(SubscriptionId, StatusFilter, StatusHandler)>>>,
    history: Arc<RwLock<VecDeque<TimestampedStatus>>>,
    config: StatusBusConfig,
}

impl StatusBus {
    /// Create a new status bus with default configuration
    pub fn new() -> Self {
        Self::with_config(StatusBusConfig::default())
    }

    /// Create a new status bus with custom configuration
    pub fn with_config(config: StatusBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            handlers: Arc::new(RwLock::new(Vec::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            config,
        }
    }

    /// Publish a snapshot to all subscribers
    ///
    /// Returns the number of handlers and receivers that got a copy.
    pub fn publish(&self, status: &PrinterStatus) -> usize {
        if self.config.enable_history {
            self.add_to_history(status);
        }

        // Handlers run outside the lock so they may subscribe or unsubscribe
        let matching: Vec<StatusHandler> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, filter, _)| filter.matches(status))
            .map(|(_, _, handler)| handler.clone())
            .collect();
        let delivered = matching.len();
        for handler in matching {
            handler(status.clone());
        }

        // No async receivers is not an error
        delivered + self.sender.send(status.clone()).unwrap_or(0)
    }

    /// Subscribe with a synchronous handler
    ///
    /// The handler runs on the publishing thread and must return quickly.
    pub fn subscribe<F>(&self, filter: StatusFilter, handler: F) -> SubscriptionId
    where
        F: Fn(PrinterStatus) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().push((id, filter, Arc::new(handler)));
        tracing::debug!("Status subscription {} added", id);
        id
    }

    /// Get a receiver for async polling
    pub fn receiver(&self) -> broadcast::Receiver<PrinterStatus> {
        self.sender.subscribe()
    }

    /// Unsubscribe a handler
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub, _, _)| *sub != id);
        let removed = handlers.len() != before;
        if removed {
            tracing::debug!("Status subscription {} removed", id);
        }
        removed
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Recent snapshots (if history is enabled)
    pub fn history(&self, since: Option<Instant>) -> Vec<PrinterStatus> {
        if !self.config.enable_history {
            return Vec::new();
        }

        let history = self.history.read();
        match since {
            Some(since) => history
                .iter()
                .filter(|e| e.timestamp >= since)
                .map(|e| e.status.clone())
                .collect(),
            None => history.iter().map(|e| e.status.clone()).collect(),
        }
    }

    /// Clear snapshot history
    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    fn add_to_history(&self, status: &PrinterStatus) {
        let mut history = self.history.write();
        let now = Instant::now();

        history.push_back(TimestampedStatus {
            status: status.clone(),
            timestamp: now,
        });

        let retention = self.config.history_retention;
        while history
            .front()
            .is_some_and(|e| now.duration_since(e.timestamp) > retention)
        {
            history.pop_front();
        }

        while history.len() > self.config.max_history_size {
            history.pop_front();
        }
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status_in(state: PrintEngineState, change: StateChange) -> PrinterStatus {
        PrinterStatus {
            state,
            change,
            ..PrinterStatus::new()
        }
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = StatusBus::new();

        let id = bus.subscribe(StatusFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_each_subscriber_gets_a_copy() {
        let bus = StatusBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            bus.subscribe(StatusFilter::All, move |mut status| {
                // Mutating our copy must not affect other subscribers
                assert_eq!(status.current_layer, 7);
                status.current_layer = 0;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        let mut status = PrinterStatus::new();
        status.current_layer = 7;
        assert_eq!(bus.publish(&status), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_may_subscribe_and_unsubscribe() {
        let bus = Arc::new(StatusBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let inner = bus.clone();
        let s = seen.clone();
        let id = bus.subscribe(StatusFilter::All, move |_| {
            s.fetch_add(inner.subscriber_count(), Ordering::SeqCst);
            inner.subscribe(StatusFilter::All, |_| {});
        });

        assert_eq!(bus.publish(&PrinterStatus::new()), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 2);

        let inner = bus.clone();
        bus.subscribe(StatusFilter::All, move |_| {
            inner.unsubscribe(id);
        });
        assert_eq!(bus.publish(&PrinterStatus::new()), 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[test]
    fn test_filtering() {
        let bus = StatusBus::new();
        let entering = Arc::new(AtomicUsize::new(0));
        let homes = Arc::new(AtomicUsize::new(0));

        let e = entering.clone();
        bus.subscribe(StatusFilter::EnteringOnly, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });
        let h = homes.clone();
        bus.subscribe(
            StatusFilter::States(vec![PrintEngineState::Home]),
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(&status_in(PrintEngineState::Homing, StateChange::Leaving));
        bus.publish(&status_in(PrintEngineState::Home, StateChange::Entering));

        assert_eq!(entering.load(Ordering::SeqCst), 1);
        assert_eq!(homes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_history_max_size() {
        let bus = StatusBus::with_config(StatusBusConfig {
            enable_history: true,
            max_history_size: 5,
            ..Default::default()
        });

        for layer in 0..10 {
            let mut status = PrinterStatus::new();
            status.current_layer = layer;
            bus.publish(&status);
        }

        let history = bus.history(None);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].current_layer, 5);

        bus.clear_history();
        assert!(bus.history(None).is_empty());
    }

    #[test]
    fn test_async_receiver() {
        let bus = StatusBus::new();
        let mut receiver = bus.receiver();

        bus.publish(&status_in(PrintEngineState::Exposing, StateChange::Entering));

        let received = receiver.try_recv().expect("snapshot should be queued");
        assert_eq!(received.state, PrintEngineState::Exposing);
    }
}
