//! JSON Schema validation with per-source compiled-validator caching.

use std::collections::HashMap;
use std::sync::RwLock;

use jsonschema::Validator;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Validates a payload against a source's optional `schema`. Sources with
/// no schema accept any payload.
pub struct SchemaValidator {
    cache: RwLock<HashMap<String, CachedValidator>>,
}

struct CachedValidator {
    schema_hash: String,
    validator: Validator,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `payload` against `source_id`'s `schema`, compiling and
    /// caching the validator on first use or whenever the schema document
    /// changes (detected by hash, so `UpdateConfiguration` invalidates it).
    pub fn validate(
        &self,
        source_id: &str,
        schema: Option<&serde_json::Value>,
        payload: &serde_json::Value,
    ) -> Result<(), ValidationError> {
        let Some(schema) = schema else {
            return Ok(());
        };
        let schema_hash = hash_schema(schema);

        {
            let cache = self.cache.read().expect("schema validator cache poisoned");
            if let Some(entry) = cache.get(source_id) {
                if entry.schema_hash == schema_hash {
                    return run_validation(&entry.validator, payload);
                }
            }
        }

        let validator = jsonschema::validator_for(schema)
            .map_err(|err| ValidationError::single(format!("invalid schema: {err}")))?;
        let result = run_validation(&validator, payload);

        let mut cache = self.cache.write().expect("schema validator cache poisoned");
        cache.insert(
            source_id.to_string(),
            CachedValidator {
                schema_hash,
                validator,
            },
        );
        result
    }

    /// Drop any cached validator for `source_id`, e.g. on source deletion.
    pub fn invalidate(&self, source_id: &str) {
        self.cache
            .write()
            .expect("schema validator cache poisoned")
            .remove(source_id);
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn run_validation(validator: &Validator, payload: &serde_json::Value) -> Result<(), ValidationError> {
    let messages: Vec<String> = validator
        .iter_errors(payload)
        .map(|err| format!("{}: {}", err.instance_path, err))
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(messages))
    }
}

fn hash_schema(schema: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
