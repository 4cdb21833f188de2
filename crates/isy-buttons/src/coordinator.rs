//! Controller-responder coordinator
//!
//! Ties the three runtime behaviors together around the responder table:
//! dispatching button control events to service calls, running the repeating
//! fade session with its watchdog, and suppressing feedback from the
//! system's own service calls while mirroring external changes to the
//! follower entity.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Interval, Sleep};
use tracing::{debug, error, info, warn};

use isy_core::events::{IsyControlData, StateChangedData};
use isy_core::{Context, EntityId, DOMAIN_LIGHT, SERVICE_TURN_OFF, SERVICE_TURN_ON, STATE_OFF, STATE_ON};
use isy_hass::Hass;

use crate::config::{ResponderSpec, ValidatedConfig};
use crate::control::ControlCode;

/// Interval between fade ticks while a fade button is held
pub const DIMMING_SPEED: Duration = Duration::from_secs(1);

/// Maximum fade session length without an explicit stop
pub const DIMMING_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator runtime errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A state change arrived for an entity that is not in the responder
    /// table. Subscription bookkeeping only ever watches table entries, so
    /// this means the table and the subscriptions are out of sync.
    #[error("state change received for untracked entity: {0}")]
    UntrackedEntity(String),
}

/// One downstream device controlled by the button box
#[derive(Debug, Clone)]
struct Responder {
    entity_id: EntityId,
    turn_on_data: Map<String, Value>,
    fast_on_data: Map<String, Value>,
    turn_off_data: Map<String, Value>,
    fast_off_data: Map<String, Value>,
    dimming_step: u8,
    dimming_data: Map<String, Value>,
    /// True exactly while this responder's last state transition was
    /// coordinator-initiated and not yet observed
    active: bool,
}

impl Responder {
    fn from_spec(spec: ResponderSpec) -> Self {
        Self {
            entity_id: spec.entity_id,
            turn_on_data: spec.turn_on_data,
            fast_on_data: spec.fast_on_data,
            turn_off_data: spec.turn_off_data,
            fast_off_data: spec.fast_off_data,
            dimming_step: spec.dimming_step,
            dimming_data: spec.dimming_data,
            active: false,
        }
    }

    /// The extra service data configured for a discrete code
    fn discrete_data(&self, code: ControlCode) -> Option<&Map<String, Value>> {
        match code {
            ControlCode::On => Some(&self.turn_on_data),
            ControlCode::FastOn => Some(&self.fast_on_data),
            ControlCode::Off => Some(&self.turn_off_data),
            ControlCode::FastOff => Some(&self.fast_off_data),
            ControlCode::FadeUp | ControlCode::FadeDown | ControlCode::FadeStop => None,
        }
    }
}

/// A running fade session: repeating ticker plus one-shot watchdog.
///
/// Dropping the session cancels both timers, so `Option::take` is the
/// idempotent cancellation path shared by FDSTOP, the watchdog, and
/// session replacement.
struct FadeSession {
    direction: i8,
    context: Context,
    ticker: Interval,
    watchdog: Pin<Box<Sleep>>,
}

impl FadeSession {
    fn new(direction: i8, context: Context) -> Self {
        // The first tick of `interval` fires immediately, matching the
        // original behavior of stepping brightness on button press.
        Self {
            direction,
            context,
            ticker: tokio::time::interval(DIMMING_SPEED),
            watchdog: Box::pin(tokio::time::sleep(DIMMING_TIMEOUT)),
        }
    }
}

enum FadeEvent {
    Tick,
    Timeout,
}

/// Wait for the next fade timer event, or forever if no session is running.
async fn next_fade_event(fade: &mut Option<FadeSession>) -> FadeEvent {
    match fade.as_mut() {
        Some(session) => {
            tokio::select! {
                // The watchdog wins a tie at the timeout boundary so no
                // tick can land at or after the 10s bound.
                biased;
                _ = &mut session.watchdog => FadeEvent::Timeout,
                _ = session.ticker.tick() => FadeEvent::Tick,
            }
        }
        None => std::future::pending().await,
    }
}

/// The controller-responder coordinator.
///
/// Owns the responder table and the fade session exclusively; all handlers
/// run one at a time on the single `run` task, so flag and session
/// mutation needs no locking.
pub struct Coordinator {
    hass: Arc<Hass>,
    responders: Vec<Responder>,
    controllers: HashSet<EntityId>,
    follower_entity: Option<EntityId>,
    fade: Option<FadeSession>,
}

impl Coordinator {
    /// Build the coordinator from a validated configuration
    pub fn new(hass: Arc<Hass>, config: ValidatedConfig) -> Self {
        let responders: Vec<Responder> = config
            .responders
            .into_iter()
            .map(Responder::from_spec)
            .collect();
        let controllers: HashSet<EntityId> = config.controllers.into_iter().collect();

        info!(
            responders = responders.len(),
            controllers = controllers.len(),
            follower = config
                .follower_entity
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            "Coordinator initialized"
        );

        Self {
            hass,
            responders,
            controllers,
            follower_entity: config.follower_entity,
            fade: None,
        }
    }

    /// Run the coordinator until the event bus closes or an invariant is
    /// violated.
    ///
    /// Subscribes to ISY control events and state changes, then processes
    /// callbacks strictly one at a time.
    pub async fn run(mut self) -> Result<(), CoordinatorError> {
        let mut control_rx = self.hass.bus.subscribe_typed::<IsyControlData>();
        let mut state_rx = self.hass.bus.subscribe_typed::<StateChangedData>();

        info!("Coordinator running");

        loop {
            tokio::select! {
                event = control_rx.recv() => match event {
                    Ok(event) => {
                        if self.controllers.contains(&event.data.entity_id) {
                            self.handle_control(&event.data, &event.context).await;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Control event subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = state_rx.recv() => match event {
                    Ok(event) => {
                        // The bus delivers every entity's changes; only
                        // responder entities are ours to inspect.
                        if self.is_watched(&event.data.entity_id) {
                            if let Err(err) =
                                self.handle_state_changed(&event.data, &event.context).await
                            {
                                error!(error = %err, "Responder table inconsistent, stopping");
                                return Err(err);
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "State change subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                fade_event = next_fade_event(&mut self.fade) => match fade_event {
                    FadeEvent::Tick => self.fade_tick().await,
                    FadeEvent::Timeout => self.fade_watchdog(),
                },
            }
        }

        info!("Coordinator stopped");
        Ok(())
    }

    fn is_watched(&self, entity_id: &EntityId) -> bool {
        self.responders.iter().any(|r| r.entity_id == *entity_id)
    }

    /// Handle an ISY994 control event from a controller.
    async fn handle_control(&mut self, data: &IsyControlData, context: &Context) {
        debug!(
            controller = %data.entity_id,
            control = %data.control,
            "Control event received"
        );

        match data.control.parse::<ControlCode>() {
            Ok(code) => {
                if let Some(service) = code.discrete_service() {
                    self.dispatch_discrete(code, service, context).await;
                } else {
                    self.fade_control(code, context);
                }
            }
            Err(_) => {
                info!(
                    control = %data.control,
                    controller = %data.entity_id,
                    "No action assigned for control code"
                );
            }
        }
    }

    /// Issue the mapped service call on every responder.
    ///
    /// Any controller's event hits all responders; there is no
    /// per-controller routing.
    async fn dispatch_discrete(&mut self, code: ControlCode, service: &str, context: &Context) {
        for responder in &mut self.responders {
            responder.active = true;

            let mut service_data = responder.discrete_data(code).cloned().unwrap_or_default();
            service_data.insert(
                "entity_id".to_string(),
                Value::String(responder.entity_id.to_string()),
            );

            self.hass
                .call_service(
                    responder.entity_id.domain(),
                    service,
                    Value::Object(service_data),
                    context.child(),
                )
                .await;
        }
    }

    /// Start, restart, or stop the fade session.
    ///
    /// Cancel-then-start: the previous session (ticker and watchdog) is
    /// always dropped first, so a stale tick can never fire after a new
    /// session begins. Cancelling with no session running is a no-op.
    fn fade_control(&mut self, code: ControlCode, context: &Context) {
        if self.fade.take().is_some() {
            debug!("Cancelled running fade session");
        }

        match code {
            ControlCode::FadeUp => {
                debug!("Starting fade session (up)");
                self.fade = Some(FadeSession::new(1, context.clone()));
            }
            ControlCode::FadeDown => {
                debug!("Starting fade session (down)");
                self.fade = Some(FadeSession::new(-1, context.clone()));
            }
            // FDSTOP and discrete codes leave the session idle
            _ => {}
        }
    }

    /// One fade tick: step brightness on every dimmable responder.
    async fn fade_tick(&mut self) {
        let (direction, context) = match &self.fade {
            Some(session) => (session.direction, session.context.child()),
            None => return,
        };

        for responder in &mut self.responders {
            if responder.entity_id.domain() != DOMAIN_LIGHT {
                continue;
            }
            responder.active = true;

            let mut service_data = responder.dimming_data.clone();
            service_data.insert(
                "entity_id".to_string(),
                Value::String(responder.entity_id.to_string()),
            );
            service_data.insert(
                "brightness_step".to_string(),
                json!(responder.dimming_step as i64 * direction as i64),
            );

            self.hass
                .call_service(
                    DOMAIN_LIGHT,
                    SERVICE_TURN_ON,
                    Value::Object(service_data),
                    context.clone(),
                )
                .await;
        }
    }

    /// The fade watchdog fired: a stop signal was missed (e.g. a dropped
    /// bus event). Clear the session through the same path as FDSTOP.
    fn fade_watchdog(&mut self) {
        warn!(
            timeout_secs = DIMMING_TIMEOUT.as_secs(),
            "Fade session hit the watchdog timeout without a stop"
        );
        self.fade.take();
    }

    /// Handle a state change on a watched responder entity.
    ///
    /// A change marked `active` was caused by this coordinator's own
    /// service call: clear the mark and suppress it. Anything else is an
    /// external change and is mirrored to the follower entity.
    async fn handle_state_changed(
        &mut self,
        data: &StateChangedData,
        context: &Context,
    ) -> Result<(), CoordinatorError> {
        let responder = self
            .responders
            .iter_mut()
            .find(|r| r.entity_id == data.entity_id)
            .ok_or_else(|| CoordinatorError::UntrackedEntity(data.entity_id.to_string()))?;

        if responder.active {
            responder.active = false;
            return Ok(());
        }

        let new_state = match &data.new_state {
            Some(state) => state.state.clone(),
            None => return Ok(()),
        };

        debug!(
            entity_id = %data.entity_id,
            state = %new_state,
            "Externally caused state change"
        );

        let follower = match &self.follower_entity {
            Some(follower) => follower.clone(),
            None => return Ok(()),
        };

        // Only the two binary states are mirrored; unavailable/unknown and
        // anything else produce no follower action.
        let service = match new_state.as_str() {
            STATE_ON => SERVICE_TURN_ON,
            STATE_OFF => SERVICE_TURN_OFF,
            _ => return Ok(()),
        };

        let mut service_data = Map::new();
        service_data.insert(
            "entity_id".to_string(),
            Value::String(follower.to_string()),
        );

        if follower.domain() == DOMAIN_LIGHT {
            let brightness = self
                .hass
                .get_attribute::<u8>(&data.entity_id.to_string(), "brightness")
                .filter(|b| *b > 0);
            if let Some(brightness) = brightness {
                service_data.insert("brightness".to_string(), json!(brightness));
            }
        }

        self.hass
            .call_service(
                follower.domain(),
                service,
                Value::Object(service_data),
                context.child(),
            )
            .await;

        Ok(())
    }
}
