//! Push delivery transports

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::{Notification, Target};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push endpoint returned HTTP {0}")]
    Status(u16),

    #[error("push transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, target: &Target, notification: &Notification) -> Result<(), TransportError>;
}

/// Legacy FCM-style HTTP endpoint (`to` = `/topics/<t>` or a device token)
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl HttpPushTransport {
    pub fn new(endpoint: String, server_key: String) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            server_key,
        })
    }
}

fn recipient(target: &Target) -> String {
    match target {
        Target::Topic(topic) => format!("/topics/{topic}"),
        Target::Device(token) => token.clone(),
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, target: &Target, notification: &Notification) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "to": recipient(target),
            "notification": {
                "title": notification.title,
                "body": notification.body,
            },
            "data": notification.data,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Writes notifications to the log; used when no push endpoint is configured
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(&self, target: &Target, notification: &Notification) -> Result<(), TransportError> {
        tracing::info!(
            %target,
            kind = notification.kind(),
            event_id = notification.event_id(),
            title = %notification.title,
            "Push notification"
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<(Target, Notification)>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl MemoryTransport {
    /// A transport whose every send fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(Target, Notification)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Notifications whose `eventId` equals `event_id`
    pub fn count_event(&self, event_id: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(_, n)| n.event_id() == event_id)
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    async fn send(&self, target: &Target, notification: &Notification) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TransportError::Unavailable("configured to fail".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((target.clone(), notification.clone()));
        }
        Ok(())
    }
}
