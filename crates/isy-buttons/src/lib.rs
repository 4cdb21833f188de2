//! ISY994 Insteon button coordinator
//!
//! Bridges ISY994 KeypadLinc Secondary and RemoteLinc buttons to devices
//! the ISY994 cannot drive natively, and keeps one ISY-native follower
//! entity in sync with manual changes to those devices.
//!
//! # Data flow
//!
//! ```text
//! controller button → control event → dispatcher
//!     discrete code (DON/DFON/DOF/DFOF) → service call per responder
//!     fade code (FDUP/FDDOWN/FDSTOP)    → fade session (ticker + watchdog)
//! responder state change → suppressor
//!     self-caused  → flag cleared, ignored
//!     external     → mirrored to the follower entity
//! ```
//!
//! # Key types
//!
//! - [`AppConfig`] / [`ValidatedConfig`] - the configuration surface
//! - [`ControlCode`] - the seven recognized button signals
//! - [`Coordinator`] - dispatcher, fade engine, and feedback suppressor

pub mod config;
pub mod control;
pub mod coordinator;

pub use config::{AppConfig, ConfigError, ResponderConfig, ResponderSpec, ValidatedConfig};
pub use control::{ControlCode, UnknownControlCode};
pub use coordinator::{Coordinator, CoordinatorError, DIMMING_SPEED, DIMMING_TIMEOUT};
