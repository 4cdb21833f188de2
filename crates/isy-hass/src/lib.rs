//! Host runtime surface for the ISY994 button coordinator
//!
//! The coordinator does not talk to a live Home Assistant instance; it is
//! written against this in-process capability surface instead: an event bus
//! for control and state-change notifications, a state machine holding
//! entity states, and a service registry routing service calls. Tests
//! substitute recording service handlers through the same surface.

mod event_bus;
mod service_registry;
mod state_machine;

pub use event_bus::{EventBus, TypedEventReceiver};
pub use service_registry::{ServiceError, ServiceFuture, ServiceRegistry, ServiceResult};
pub use state_machine::StateMachine;

use std::sync::Arc;

use isy_core::Context;
use tracing::warn;

/// The bundled host runtime handle.
///
/// Everything the coordinator needs from its host: subscriptions come from
/// `bus`, point-in-time attribute reads from `states`, and service calls go
/// through `services`.
pub struct Hass {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    /// Service registry for service calls
    pub services: Arc<ServiceRegistry>,
}

impl Hass {
    /// Create a new host runtime instance
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new(bus.clone()));

        Self {
            bus,
            states,
            services,
        }
    }

    /// Call a service, fire and forget.
    ///
    /// The dispatch is awaited so ordering stays deterministic, but the
    /// outcome is not surfaced to the caller: downstream failures are the
    /// host's concern and are only logged here.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
    ) {
        if let Err(err) = self
            .services
            .call(domain, service, service_data, context)
            .await
        {
            warn!(domain, service, error = %err, "Service call failed");
        }
    }

    /// Read an attribute of an entity's current state
    pub fn get_attribute<T: serde::de::DeserializeOwned>(
        &self,
        entity_id: &str,
        attribute: &str,
    ) -> Option<T> {
        self.states
            .get(entity_id)
            .and_then(|state| state.attribute(attribute))
    }
}

impl Default for Hass {
    fn default() -> Self {
        Self::new()
    }
}
