//! Best-effort push notifications
//!
//! Every notification carries a deterministic `eventId`. The [`Notifier`]
//! drops a repeat of the same `(target, eventId)` seen inside its window, so
//! a retried webhook or a double-clicked button produces one push. Delivery
//! failures are logged and swallowed; callers never see them.

pub mod transport;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

pub use transport::{HttpPushTransport, LogTransport, MemoryTransport, PushTransport, TransportError};

/// Topic every HQ device subscribes to
pub const HQ_TOPIC: &str = "hq";

/// Default dedup window
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(600);

pub fn branch_topic(branch_id: &str) -> String {
    format!("branch_{branch_id}")
}

/// Where a notification goes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Topic(String),
    Device(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Topic(t) => write!(f, "topic:{t}"),
            Target::Device(d) => write!(f, "device:{d}"),
        }
    }
}

/// `{title, body, data: {type, eventId, ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(
        kind: &str,
        event_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), kind.to_string());
        data.insert("eventId".to_string(), event_id.into());
        Self {
            title: title.into(),
            body: body.into(),
            data,
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn event_id(&self) -> &str {
        self.data.get("eventId").map(String::as_str).unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.data.get("type").map(String::as_str).unwrap_or("")
    }
}

/// Deduplicating front of a [`PushTransport`]
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn PushTransport>,
    recent: Arc<DashMap<String, Instant>>,
    window: Duration,
}

impl Notifier {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self::with_window(transport, DEFAULT_DEDUP_WINDOW)
    }

    pub fn with_window(transport: Arc<dyn PushTransport>, window: Duration) -> Self {
        Self {
            transport,
            recent: Arc::new(DashMap::new()),
            window,
        }
    }

    /// Send unless the same event already went to this target recently
    pub async fn dispatch(&self, target: Target, notification: Notification) {
        let now = Instant::now();
        self.recent
            .retain(|_, seen| now.duration_since(*seen) < self.window);

        let key = format!("{target}|{}", notification.event_id());
        // entry() holds the shard lock, so two racing callers can't both claim the key
        let claimed = match self.recent.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        };
        if !claimed {
            tracing::debug!(%target, event_id = notification.event_id(), "Duplicate notification suppressed");
            return;
        }

        match self.transport.send(&target, &notification).await {
            Ok(()) => {
                tracing::debug!(%target, event_id = notification.event_id(), "Notification sent");
            }
            Err(e) => {
                // release the key so a later retry of the same event can go out
                self.recent.remove(&key);
                tracing::warn!(%target, event_id = notification.event_id(), error = %e, "Notification failed");
            }
        }
    }

    /// Fan out to several device tokens
    pub async fn dispatch_devices(&self, tokens: &[String], notification: Notification) {
        for token in tokens {
            self.dispatch(Target::Device(token.clone()), notification.clone())
                .await;
        }
    }
}
