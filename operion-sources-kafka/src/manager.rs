//! `ConsumerManager`: one shared consumer per unique connection
//! fingerprint, multiplexing every record to every `BrokerSource` sharing
//! that fingerprint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use operion_sources_core::callback::{SourceEvent, SourceEventCallback};
use operion_sources_core::model::{BrokerSource, ConnectionDetails, ProviderId};
use operion_sources_core::validation::SchemaValidator;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::message::{Headers, Message};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::{LoggingConsumer, LoggingContext};
use crate::error::KafkaManagerError;

/// The per-manager state machine. Terminal once `Stopped`;
/// restarting means creating a new manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

const SESSION_TIMEOUT_MS: &str = "10000";
const HEARTBEAT_INTERVAL_MS: &str = "3000";
const RETRY_DELAY: Duration = Duration::from_secs(5);
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Owns one `rdkafka` consumer shared by every `BrokerSource` whose
/// `connection_fingerprint` matches. `sources` is replaced wholesale by
/// the registry's reconcile pass; the consume loop snapshots it at the
/// start of each claimed record.
pub struct ConsumerManager {
    fingerprint: String,
    connection_details: ConnectionDetails,
    consumer_group: String,
    sources: RwLock<Vec<BrokerSource>>,
    state: RwLock<ManagerState>,
    cancel: CancellationToken,
    validator: Arc<SchemaValidator>,
    callback: SourceEventCallback,
    task: RwLock<Option<JoinHandle<()>>>,
}

impl ConsumerManager {
    pub fn new(
        fingerprint: String,
        connection_details: ConnectionDetails,
        consumer_group: String,
        sources: Vec<BrokerSource>,
        validator: Arc<SchemaValidator>,
        callback: SourceEventCallback,
    ) -> Self {
        Self {
            fingerprint,
            connection_details,
            consumer_group,
            sources: RwLock::new(sources),
            state: RwLock::new(ManagerState::Created),
            cancel: CancellationToken::new(),
            validator,
            callback,
            task: RwLock::new(None),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub async fn state(&self) -> ManagerState {
        *self.state.read().await
    }

    /// Replace the manager's source set atomically (`updateConsumerManagers`
    /// step 3's "replace" branch).
    pub async fn replace_sources(&self, sources: Vec<BrokerSource>) {
        *self.sources.write().await = sources;
    }

    fn build_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.connection_details.brokers)
            .set("group.id", &self.consumer_group)
            .set("session.timeout.ms", SESSION_TIMEOUT_MS)
            .set("heartbeat.interval.ms", HEARTBEAT_INTERVAL_MS)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        if let Some(extra) = self.connection_details.extra_config.as_object() {
            for (key, value) in extra {
                if let Some(value) = value.as_str() {
                    config.set(key, value);
                }
            }
        }
        config
    }

    /// Opens the consumer-group client and spawns the consume loop.
    /// The error monitor is the `LoggingContext` hook, not a second task
    /// — see `crate::context` for why that's the idiomatic equivalent
    /// here. Idempotent: a second call while already running is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), KafkaManagerError> {
        if *self.state.read().await != ManagerState::Created {
            return Ok(());
        }

        let context = LoggingContext {
            fingerprint: self.fingerprint.clone(),
        };
        let consumer: LoggingConsumer = self
            .build_client_config()
            .create_with_context(context)
            .map_err(KafkaManagerError::ConsumerCreation)?;
        consumer
            .subscribe(&[self.connection_details.topic.as_str()])
            .map_err(KafkaManagerError::Subscription)?;

        *self.state.write().await = ManagerState::Running;

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move { manager.consume_loop(consumer).await });
        *self.task.write().await = Some(handle);
        Ok(())
    }

    /// The consume loop: repeatedly streams records until cancelled,
    /// retrying after a fixed 5 s delay on any stream error — transient
    /// rebalance errors are expected, not escalated.
    async fn consume_loop(self: Arc<Self>, consumer: LoggingConsumer) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut stream = consumer.stream();
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    next = stream.next() => {
                        match next {
                            Some(Ok(message)) => {
                                self.handle_record(&consumer, &message).await;
                            }
                            Some(Err(err)) => {
                                tracing::error!(
                                    fingerprint = %self.fingerprint,
                                    %err,
                                    "kafka consume error, retrying"
                                );
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(RETRY_DELAY) => {}
            }
        }
        *self.state.write().await = ManagerState::Stopped;
    }

    /// `ConsumeClaim`: fan the record out to every source in the current
    /// snapshot, then commit the offset once regardless of per-source
    /// outcome.
    async fn handle_record(&self, consumer: &LoggingConsumer, message: &rdkafka::message::BorrowedMessage<'_>) {
        let decoded = message
            .payload()
            .map(decode_payload)
            .unwrap_or(serde_json::Value::Null);
        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default();
        let headers = extract_headers(message);
        let timestamp = Utc::now().to_rfc3339();

        let sources = self.sources.read().await.clone();
        for source in &sources {
            if let Some(schema) = source.schema.as_ref() {
                if let Err(err) = self.validator.validate(&source.id, Some(schema), &decoded) {
                    tracing::warn!(source_id = %source.id, %err, "kafka record failed schema validation, skipping source");
                    continue;
                }
            }

            let event_payload = serde_json::json!({
                "topic": message.topic(),
                "partition": message.partition(),
                "offset": message.offset(),
                "timestamp": timestamp,
                "key": key,
                "message": decoded,
                "headers": headers,
            });

            let event = SourceEvent {
                provider: ProviderId::Kafka,
                source_id: source.id.clone(),
                external_id: source.external_id,
                event_type: "message_received",
                occurred_at: Utc::now(),
                payload: event_payload,
            };
            if let Err(err) = self.callback.invoke(event).await {
                tracing::error!(source_id = %source.id, %err, "kafka callback failed");
            }
        }

        if let Err(err) = consumer.commit_message(message, CommitMode::Async) {
            tracing::error!(fingerprint = %self.fingerprint, %err, "failed to commit kafka offset");
        }
    }

    /// Cancels the consume loop and waits up to 5 s for it to finish.
    /// Idempotent.
    pub async fn stop(&self) {
        if *self.state.read().await == ManagerState::Stopped {
            return;
        }
        *self.state.write().await = ManagerState::Stopping;
        self.cancel.cancel();

        let handle = self.task.write().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                tracing::warn!(fingerprint = %self.fingerprint, "consumer manager did not stop within grace period");
            }
        }
        *self.state.write().await = ManagerState::Stopped;
    }
}

fn decode_payload(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| {
        serde_json::json!({ "raw_message": String::from_utf8_lossy(bytes).into_owned() })
    })
}

fn extract_headers(message: &rdkafka::message::BorrowedMessage<'_>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(headers) = message.headers() {
        for idx in 0..headers.count() {
            let header = headers.get(idx);
            let value = header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            map.insert(header.key.to_string(), serde_json::Value::String(value));
        }
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_payload_falls_back_to_raw_wrapper_on_invalid_json() {
        let value = decode_payload(b"not json");
        assert_eq!(value, serde_json::json!({"raw_message": "not json"}));
    }

    #[test]
    fn decode_payload_parses_valid_json() {
        let value = decode_payload(br#"{"a":1}"#);
        assert_eq!(value, serde_json::json!({"a": 1}));
    }
}
