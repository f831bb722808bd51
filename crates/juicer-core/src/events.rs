//! Watch events for push-based notification.
//!
//! The watcher broadcasts a [`WatchEvent`] for every binding, discovery,
//! status change and dispatch. Consumers call
//! [`Watcher::subscribe()`](crate::watcher::Watcher::subscribe) to receive
//! them; if a receiver falls behind, older events are dropped (lagged).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::page::ElementId;

/// Default broadcast channel capacity
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observation surface an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// The single status field of a detail view
    Detail,
    /// Per-row status controls of a list view
    Rows,
}

impl Surface {
    pub fn label(&self) -> &'static str {
        match self {
            Surface::Detail => "detail",
            Surface::Rows => "rows",
        }
    }
}

/// Why an effect was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireTrigger {
    /// A qualifying status edge on the given surface
    Transition(Surface),
    /// The manual smoke-test key chord
    Manual,
}

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// A surface found its elements and started observing
    SurfaceBound { surface: Surface, entities: usize },

    /// An element started being tracked
    EntityDiscovered {
        surface: Surface,
        element: ElementId,
        status: String,
    },

    /// A tracked element's normalized status changed
    StatusChanged {
        surface: Surface,
        element: ElementId,
        previous: String,
        current: String,
    },

    /// The detail element was replaced by a new node
    DetailReplaced {
        previous: ElementId,
        current: ElementId,
    },

    /// Tracked rows disappeared from discovery
    EntitiesEvicted { surface: Surface, count: usize },

    /// An effect ran
    EffectFired {
        trigger: FireTrigger,
        element: ElementId,
        effect_id: String,
        at: DateTime<Utc>,
    },

    /// An effect was picked but failed
    EffectFailed {
        trigger: FireTrigger,
        element: ElementId,
        effect_id: String,
        error: String,
    },

    /// The location path changed
    RouteChanged { from: String, to: String },

    /// All bindings were torn down
    TornDown { generation: u64 },
}

/// Sender half shared by every component that reports events
pub type EventSender = broadcast::Sender<WatchEvent>;

/// Create the event channel; the initial receiver is dropped
pub fn channel() -> EventSender {
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}

/// Send an event, ignoring the no-subscriber case
pub(crate) fn emit(tx: &EventSender, event: WatchEvent) {
    let _ = tx.send(event);
}
