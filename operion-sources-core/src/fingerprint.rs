//! Connection fingerprinting for broker sources.
//!
//! Sources sharing a fingerprint share one consumer; the
//! fingerprint is also the fallback consumer-group suffix
//! (`"operion-kafka-" + fingerprint`) used when a trigger doesn't specify
//! its own `consumer_group`. Because that fallback is keyed off the
//! fingerprint, the fingerprint itself is computed from the *raw*,
//! pre-fallback `consumer_group` field (empty string when unset) rather
//! than the resolved group — otherwise the two would be circular.

use sha2::{Digest, Sha256};

use crate::model::ConnectionDetails;

/// 16-byte (32 hex char) SHA-256 prefix of the `|`-separated
/// `topic|brokers|consumerGroup|json(schema)|json(extraConfig)` string.
pub fn connection_fingerprint(details: &ConnectionDetails, schema: Option<&serde_json::Value>) -> String {
    let consumer_group = details.consumer_group.as_deref().unwrap_or("");
    let schema_json = schema.map(|s| s.to_string()).unwrap_or_default();
    let extra_config_json = if details.extra_config.is_null() {
        String::new()
    } else {
        details.extra_config.to_string()
    };
    let input = format!(
        "{}|{}|{}|{}|{}",
        details.topic, details.brokers, consumer_group, schema_json, extra_config_json
    );
    let digest = Sha256::digest(input.as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(topic: &str, brokers: &str) -> ConnectionDetails {
        ConnectionDetails {
            topic: topic.to_string(),
            brokers: brokers.to_string(),
            consumer_group: None,
            extra_config: serde_json::Value::Null,
        }
    }

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = connection_fingerprint(&details("t", "b:9092"), None);
        let b = connection_fingerprint(&details("t", "b:9092"), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_topics_produce_different_fingerprints() {
        let a = connection_fingerprint(&details("t1", "b:9092"), None);
        let b = connection_fingerprint(&details("t2", "b:9092"), None);
        assert_ne!(a, b);
    }

    #[test]
    fn schema_changes_fingerprint() {
        let a = connection_fingerprint(&details("t", "b:9092"), Some(&json!({"type": "object"})));
        let b = connection_fingerprint(&details("t", "b:9092"), Some(&json!({"type": "string"})));
        assert_ne!(a, b);
    }

    #[test]
    fn consumer_group_affects_fingerprint() {
        let mut with_group = details("t", "b:9092");
        with_group.consumer_group = Some("g1".into());
        let a = connection_fingerprint(&details("t", "b:9092"), None);
        let b = connection_fingerprint(&with_group, None);
        assert_ne!(a, b);
    }

    #[test]
    fn extra_config_affects_fingerprint() {
        let mut with_extra = details("t", "b:9092");
        with_extra.extra_config = json!({"security.protocol": "SSL"});
        let a = connection_fingerprint(&details("t", "b:9092"), None);
        let b = connection_fingerprint(&with_extra, None);
        assert_ne!(a, b);
    }

    #[test]
    fn equal_inputs_including_consumer_group_and_extra_config_produce_equal_fingerprints() {
        let mut a = details("t", "b:9092");
        a.consumer_group = Some("g1".into());
        a.extra_config = json!({"k": "v"});
        let mut b = details("t", "b:9092");
        b.consumer_group = Some("g1".into());
        b.extra_config = json!({"k": "v"});
        assert_eq!(
            connection_fingerprint(&a, Some(&json!({"type": "object"}))),
            connection_fingerprint(&b, Some(&json!({"type": "object"})))
        );
    }
}
