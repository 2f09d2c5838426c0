//! Process event bus for cross-cutting notifications.
//!
//! The [`EventBus`] is a subscribable notification channel: every listener
//! receives every event published after it subscribed, in publish order.
//! Nothing is replayed to late subscribers.
//!
//! # Lifecycle
//!
//! ```text
//! initialise ──► staged() ──► modules subscribe during init ──► adopt(staged)
//!      ▲                                                             │
//!      └──────────────────────── reload ◄────────────────────────────┘
//! ```
//!
//! Every initialization cycle stages a fresh bus for its modules and swaps
//! it in with [`EventBus::adopt`] only when the cycle commits. Handlers
//! registered by a previous cycle never accumulate, and a cycle that fails
//! leaves the live listeners in place.
//!
//! # Example
//!
//! ```
//! use trellis_core::event_bus::{EventBus, SystemEvent};
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new();
//! let mut listener = bus.subscribe();
//!
//! bus.publish(SystemEvent::ThemeActivated { name: "classic".into() });
//!
//! let event = listener.recv().await.expect("event delivered");
//! assert_eq!(event, SystemEvent::ThemeActivated { name: "classic".into() });
//! # });
//! ```

use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Default number of events buffered per listener.
const DEFAULT_CAPACITY: usize = 64;

/// Notifications emitted by the initialization pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// The configuration store was re-read from its persisted source
    ConfigReloaded,

    /// The storage backend connected
    StorageConnected {
        /// Backend identifier reported by the storage handle
        backend: String,
    },

    /// Theme discovery finished
    ThemesDiscovered {
        /// Number of themes registered
        count: usize,
    },

    /// A theme was loaded and became the active theme candidate
    ThemeActivated {
        /// Theme name
        name: String,
    },

    /// A requested theme was unavailable and the default was used instead
    ThemeFallback {
        /// Requested theme
        from: String,
        /// Theme attempted instead
        to: String,
    },

    /// A module's init hook completed
    ModuleInitialised {
        /// Module name
        name: String,
    },

    /// A module's init hook failed; the module is excluded from routing
    ModuleFailed {
        /// Module name
        name: String,
        /// Failure description
        error: String,
    },

    /// An initialization cycle completed and its state was published
    Initialised {
        /// Generation number of the published state
        generation: u64,
    },
}

/// Receiving half handed to listeners.
pub type EventReceiver = broadcast::Receiver<SystemEvent>;

/// Process-wide notification channel.
///
/// Owned by the application context; cloned handles are not provided on
/// purpose, share it behind an `Arc`.
#[derive(Debug)]
pub struct EventBus {
    sender: RwLock<broadcast::Sender<SystemEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the default per-listener buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events per listener.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(sender),
            capacity,
        }
    }

    /// Register a listener.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe()
    }

    /// Publish an event to every current listener.
    ///
    /// Returns the number of listeners the event was delivered to. Publishing
    /// with no listeners is not an error.
    pub fn publish(&self, event: SystemEvent) -> usize {
        tracing::trace!(?event, "Publishing system event");
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event)
            .unwrap_or(0)
    }

    /// An empty bus with the same capacity, for a cycle to fill before it
    /// goes live.
    #[must_use]
    pub fn staged(&self) -> Self {
        Self::with_capacity(self.capacity)
    }

    /// Take over `staged`'s channel, dropping every current listener.
    ///
    /// Listeners of `staged` receive everything published here afterwards.
    pub fn adopt(&self, staged: &Self) {
        let sender = staged
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let previous = std::mem::replace(
            &mut *self.sender.write().unwrap_or_else(PoisonError::into_inner),
            sender,
        );
        tracing::debug!(
            dropped = previous.receiver_count(),
            adopted = staged.listener_count(),
            "Adopted staged event bus"
        );
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
