//! Core types for the ISY994 button coordinator
//!
//! This crate provides the fundamental types shared by the host-runtime
//! surface and the coordinator: EntityId, State, Event, Context, and
//! ServiceCall.

mod context;
mod entity_id;
mod event;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventOrigin, EventType};
pub use service_call::ServiceCall;
pub use state::State;

/// State value for an entity that is on
pub const STATE_ON: &str = "on";

/// State value for an entity that is off
pub const STATE_OFF: &str = "off";

/// State value for an entity whose state is not known
pub const STATE_UNKNOWN: &str = "unknown";

/// State value for an entity that is unreachable
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Domain whose entities support brightness stepping
pub const DOMAIN_LIGHT: &str = "light";

/// Service name for turning an entity on
pub const SERVICE_TURN_ON: &str = "turn_on";

/// Service name for turning an entity off
pub const SERVICE_TURN_OFF: &str = "turn_off";

/// Standard event types used on the event bus
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type for service calls
    pub const CALL_SERVICE: &str = "call_service";

    /// Event type fired by the ISY994 integration for every button press
    pub const ISY994_CONTROL: &str = "isy994_control";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// Data for CALL_SERVICE events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct CallServiceData {
        pub domain: String,
        pub service: String,
        pub service_data: serde_json::Value,
    }

    impl EventData for CallServiceData {
        fn event_type() -> &'static str {
            CALL_SERVICE
        }
    }

    /// Data for ISY994_CONTROL events
    ///
    /// `control` is the raw wire code (e.g. "DON", "FDUP"). It is kept as a
    /// string here so unrecognized codes still reach the coordinator, which
    /// logs them.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct IsyControlData {
        pub entity_id: EntityId,
        pub control: String,
    }

    impl EventData for IsyControlData {
        fn event_type() -> &'static str {
            ISY994_CONTROL
        }
    }
}
