//! Service call type for invoking entity services

use crate::Context;
use serde::{Deserialize, Serialize};

/// A call to an entity service.
///
/// Services are namespaced by domain; the coordinator derives the domain
/// from the responder's entity ID and maps control codes onto service names
/// such as `turn_on` and `turn_off`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (e.g., "light", "switch")
    pub domain: String,

    /// The service name (e.g., "turn_on", "turn_off")
    pub service: String,

    /// Data passed to the service (entity_id, brightness, ...)
    pub service_data: serde_json::Value,

    /// Context tracking what initiated this call
    pub context: Context,
}

impl ServiceCall {
    /// Create a new service call
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
        context: Context,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
            context,
        }
    }

    /// Get the full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Get a value from service_data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get entity_id(s) from service data
    ///
    /// Handles both single string and array formats.
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }
}
