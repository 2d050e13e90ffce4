//! Custom `rdkafka` client context standing in for a dedicated error
//! monitor task. `librdkafka` has no user-facing error channel to drain
//! from a second task; it instead invokes [`ClientContext::error`] on its
//! own background thread whenever the client hits an asynchronous error
//! (broker down, auth failure, …). Logging from that hook at error
//! level, without terminating the consumer, is the idiomatic `rdkafka`
//! equivalent of a dedicated error-draining task.

use rdkafka::client::ClientContext;
use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::error::KafkaError;
use rdkafka::topic_partition_list::TopicPartitionList;

#[derive(Clone, Default)]
pub struct LoggingContext {
    pub fingerprint: String,
}

impl ClientContext for LoggingContext {
    fn error(&self, error: KafkaError, reason: &str) {
        tracing::error!(fingerprint = %self.fingerprint, %error, %reason, "kafka client error");
    }
}

impl ConsumerContext for LoggingContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        tracing::debug!(fingerprint = %self.fingerprint, ?rebalance, "kafka pre-rebalance");
    }

    fn post_rebalance(&self, rebalance: &Rebalance) {
        tracing::debug!(fingerprint = %self.fingerprint, ?rebalance, "kafka post-rebalance");
    }

    fn commit_callback(&self, result: rdkafka::error::KafkaResult<()>, _offsets: &TopicPartitionList) {
        if let Err(err) = result {
            tracing::error!(fingerprint = %self.fingerprint, %err, "kafka offset commit failed");
        }
    }
}

pub type LoggingConsumer = rdkafka::consumer::StreamConsumer<LoggingContext>;
