//! Per-provider logical source entities.
//!
//! One generic "LogicalSource" shape shared by every provider, with
//! broker-specific additions and a standalone `Schedule` entity. We model
//! the shared shape as the [`Source`] trait and give each provider its
//! own concrete struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;
use crate::fingerprint::connection_fingerprint;

/// Identifies which runtime owns a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Kafka,
    Webhook,
    Scheduler,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Kafka => "kafka",
            ProviderId::Webhook => "webhook",
            ProviderId::Scheduler => "scheduler",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common accessors shared by every provider's logical source.
///
/// Implemented by [`WebhookSource`], [`BrokerSource`] and [`Schedule`].
pub trait Source: Send + Sync + Clone + 'static {
    fn id(&self) -> &str;
    fn external_id(&self) -> Uuid;
    fn configuration(&self) -> &serde_json::Value;
    fn schema(&self) -> Option<&serde_json::Value>;
    fn active(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// A webhook-provider logical source. No mandatory configuration keys
/// beyond `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSource {
    pub id: String,
    pub external_id: Uuid,
    pub configuration: serde_json::Value,
    pub schema: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookSource {
    pub fn new(id: impl Into<String>, configuration: serde_json::Value) -> Result<Self, ModelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelError::EmptyId);
        }
        let now = Utc::now();
        let schema = extract_schema(&configuration);
        Ok(Self {
            id,
            external_id: Uuid::new_v4(),
            configuration,
            schema,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace configuration/schema atomically, bumping `updated_at`.
    /// `external_id` is never regenerated.
    pub fn update_configuration(&mut self, configuration: serde_json::Value) {
        self.schema = extract_schema(&configuration);
        self.configuration = configuration;
        self.updated_at = Utc::now();
    }
}

impl Source for WebhookSource {
    fn id(&self) -> &str {
        &self.id
    }
    fn external_id(&self) -> Uuid {
        self.external_id
    }
    fn configuration(&self) -> &serde_json::Value {
        &self.configuration
    }
    fn schema(&self) -> Option<&serde_json::Value> {
        self.schema.as_ref()
    }
    fn active(&self) -> bool {
        self.active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Connection details for a broker (Kafka) source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub topic: String,
    /// Comma-separated broker list, stored verbatim.
    pub brokers: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_group: Option<String>,
    #[serde(default)]
    pub extra_config: serde_json::Value,
}

/// A broker (Kafka) logical source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSource {
    pub id: String,
    pub external_id: Uuid,
    pub configuration: serde_json::Value,
    pub schema: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub connection_details: ConnectionDetails,
    pub connection_fingerprint: String,
}

impl BrokerSource {
    pub fn new(id: impl Into<String>, configuration: serde_json::Value) -> Result<Self, ModelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelError::EmptyId);
        }
        let connection_details = parse_connection_details(&configuration)?;
        let schema = extract_schema(&configuration);
        let fingerprint = connection_fingerprint(&connection_details, schema.as_ref());
        let now = Utc::now();
        Ok(Self {
            id,
            external_id: Uuid::new_v4(),
            configuration,
            schema,
            active: true,
            created_at: now,
            updated_at: now,
            connection_details,
            connection_fingerprint: fingerprint,
        })
    }

    pub fn update_configuration(&mut self, configuration: serde_json::Value) -> Result<(), ModelError> {
        let connection_details = parse_connection_details(&configuration)?;
        let schema = extract_schema(&configuration);
        self.connection_fingerprint = connection_fingerprint(&connection_details, schema.as_ref());
        self.connection_details = connection_details;
        self.schema = schema;
        self.configuration = configuration;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The consumer group id, falling back to `"operion-kafka-" + fingerprint`
    /// when the trigger didn't specify one.
    pub fn consumer_group(&self) -> String {
        match &self.connection_details.consumer_group {
            Some(g) if !g.is_empty() => g.clone(),
            _ => format!("operion-kafka-{}", self.connection_fingerprint),
        }
    }
}

impl Source for BrokerSource {
    fn id(&self) -> &str {
        &self.id
    }
    fn external_id(&self) -> Uuid {
        self.external_id
    }
    fn configuration(&self) -> &serde_json::Value {
        &self.configuration
    }
    fn schema(&self) -> Option<&serde_json::Value> {
        self.schema.as_ref()
    }
    fn active(&self) -> bool {
        self.active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A scheduler-provider logical source, merged with its due-time tracking
/// state into one entity rather than a separate source-plus-schedule pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub external_id: Uuid,
    pub configuration: serde_json::Value,
    pub schema: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cron_expression: String,
    pub next_due_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(id: impl Into<String>, configuration: serde_json::Value) -> Result<Self, ModelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelError::EmptyId);
        }
        let cron_expression = parse_cron_expression(&configuration)?;
        crate::cron::parse(&cron_expression).map_err(|_| ModelError::InvalidCron(cron_expression.clone()))?;
        let schema = extract_schema(&configuration);
        let now = Utc::now();
        let next_due_at = crate::cron::next_after(&cron_expression, now)
            .ok_or_else(|| ModelError::InvalidCron(cron_expression.clone()))?;
        Ok(Self {
            id,
            external_id: Uuid::new_v4(),
            configuration,
            schema,
            active: true,
            created_at: now,
            updated_at: now,
            cron_expression,
            next_due_at,
        })
    }

    pub fn update_configuration(&mut self, configuration: serde_json::Value) -> Result<(), ModelError> {
        let cron_expression = parse_cron_expression(&configuration)?;
        crate::cron::parse(&cron_expression).map_err(|_| ModelError::InvalidCron(cron_expression.clone()))?;
        self.schema = extract_schema(&configuration);
        self.cron_expression = cron_expression;
        self.configuration = configuration;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Alias used when emitting source events, whose payload calls this field `sourceId`.
    pub fn source_id(&self) -> &str {
        &self.id
    }

    /// Recompute `next_due_at` strictly after `now`.
    pub fn update_next_due_at(&mut self, now: DateTime<Utc>) -> Result<(), ModelError> {
        let next = crate::cron::next_after(&self.cron_expression, now)
            .ok_or_else(|| ModelError::InvalidCron(self.cron_expression.clone()))?;
        self.next_due_at = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Source for Schedule {
    fn id(&self) -> &str {
        &self.id
    }
    fn external_id(&self) -> Uuid {
        self.external_id
    }
    fn configuration(&self) -> &serde_json::Value {
        &self.configuration
    }
    fn schema(&self) -> Option<&serde_json::Value> {
        self.schema.as_ref()
    }
    fn active(&self) -> bool {
        self.active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn extract_schema(configuration: &serde_json::Value) -> Option<serde_json::Value> {
    configuration.get("json_schema").cloned().filter(|v| !v.is_null())
}

fn parse_connection_details(configuration: &serde_json::Value) -> Result<ConnectionDetails, ModelError> {
    let topic = configuration
        .get("topic")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(ModelError::MissingField("topic"))?
        .to_string();
    let brokers = configuration
        .get("brokers")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or(ModelError::MissingField("brokers"))?
        .to_string();
    let consumer_group = configuration
        .get("consumer_group")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let extra_config = configuration
        .get("kafka_config")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    Ok(ConnectionDetails {
        topic,
        brokers,
        consumer_group,
        extra_config,
    })
}

fn parse_cron_expression(configuration: &serde_json::Value) -> Result<String, ModelError> {
    configuration
        .get("cron_expression")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(ModelError::MissingField("cron_expression"))
}
