//! Service registry with async handlers
//!
//! Services are keyed by `domain.service`. Every dispatch also fires a
//! CALL_SERVICE event on the bus so observers (and tests) can watch the
//! call stream without hooking every handler.

use dashmap::DashMap;
use isy_core::events::CallServiceData;
use isy_core::{Context, ServiceCall};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::EventBus;

/// Result type for service calls
pub type ServiceResult = Result<(), ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

/// Errors that can occur when working with services
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("service call failed: {0}")]
    CallFailed(String),
}

/// The service registry manages all registered services
pub struct ServiceRegistry {
    /// Services indexed by "domain.service" key
    services: DashMap<String, ServiceHandler>,
    /// Event bus for firing CALL_SERVICE events
    event_bus: Arc<EventBus>,
}

impl ServiceRegistry {
    /// Create a new empty service registry
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            services: DashMap::new(),
            event_bus,
        }
    }

    /// Register a new service handler under `domain.service`
    pub fn register<F, Fut>(&self, domain: impl Into<String>, service: impl Into<String>, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let domain = domain.into();
        let service = service.into();
        let key = format!("{}.{}", domain, service);

        debug!(domain = %domain, service = %service, "Registering service");

        let handler: ServiceHandler =
            Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);
        self.services.insert(key, handler);
    }

    /// Call a service
    ///
    /// Routes to the registered handler and fires a CALL_SERVICE event.
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
    ) -> ServiceResult {
        let key = format!("{}.{}", domain, service);

        let handler = self
            .services
            .get(&key)
            .map(|h| h.clone())
            .ok_or_else(|| {
                warn!(domain = %domain, service = %service, "Service not found");
                ServiceError::NotFound {
                    domain: domain.to_string(),
                    service: service.to_string(),
                }
            })?;

        debug!(domain = %domain, service = %service, "Calling service");

        self.event_bus.fire_typed(
            CallServiceData {
                domain: domain.to_string(),
                service: service.to_string(),
                service_data: service_data.clone(),
            },
            context.clone(),
        );

        let call = ServiceCall::new(domain, service, service_data, context);
        handler(call).await
    }

    /// Check whether a service is registered
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&format!("{}.{}", domain, service))
    }
}
