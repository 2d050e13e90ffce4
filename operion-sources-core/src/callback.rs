//! The single external event callback.
//!
//! There is exactly one subscriber (the workflow engine), so the core
//! stores one callback value rather than a `TypeId`-keyed handler
//! registry or a full pub/sub event bus.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::ProviderId;

/// A single inbound event, built by a provider before invoking the
/// callback. `event_type` is one of
/// `"message_received"` (kafka), `"WebhookReceived"` (webhook) or
/// `"schedule_due"` (scheduler).
#[derive(Debug, Clone, Serialize)]
pub struct SourceEvent {
    pub provider: ProviderId,
    pub source_id: String,
    pub external_id: Uuid,
    pub event_type: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Returned when the callback itself failed.
#[derive(Debug)]
pub struct CallbackError {
    pub message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback error: {}", self.message)
    }
}

impl std::error::Error for CallbackError {}

type CallbackFuture = Pin<Box<dyn Future<Output = Result<(), CallbackError>> + Send>>;

/// Boxed async callback invoked once per [`SourceEvent`]. Cheap to clone
/// (an `Arc` underneath), so it can be handed to every provider
/// orchestrator at `Start` without lifetime gymnastics.
#[derive(Clone)]
pub struct SourceEventCallback {
    inner: Arc<dyn Fn(SourceEvent) -> CallbackFuture + Send + Sync>,
}

impl SourceEventCallback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(SourceEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |event| Box::pin(f(event))),
        }
    }

    pub async fn invoke(&self, event: SourceEvent) -> Result<(), CallbackError> {
        (self.inner)(event).await
    }
}

impl fmt::Debug for SourceEventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEventCallback").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn callback_invokes_and_counts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let callback = SourceEventCallback::new(move |_event| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let event = SourceEvent {
            provider: ProviderId::Webhook,
            source_id: "s1".into(),
            external_id: Uuid::new_v4(),
            event_type: "WebhookReceived",
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };

        callback.invoke(event.clone()).await.unwrap();
        callback.invoke(event).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn callback_propagates_error() {
        let callback = SourceEventCallback::new(|_event| async { Err(CallbackError::new("boom")) });
        let event = SourceEvent {
            provider: ProviderId::Kafka,
            source_id: "s1".into(),
            external_id: Uuid::new_v4(),
            event_type: "message_received",
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };
        let err = callback.invoke(event).await.unwrap_err();
        assert_eq!(err.message, "boom");
    }
}
