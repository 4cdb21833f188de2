//! Loop-level tests driving the coordinator through the event bus with a
//! paused clock, covering the timing behavior of the fade session and the
//! end-to-end suppression flow.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use isy_buttons::{AppConfig, Coordinator};
use isy_core::events::IsyControlData;
use isy_core::{Context, ServiceCall};
use isy_hass::Hass;

const CONFIG: &str = r#"
module: isy994_buttons
class: ISY994Buttons
responders:
  - entity_id: light.office
    dimming_step: 25
  - entity_id: switch.office_fan
controllers: sensor.keypad_button_a
follower_entity: light.office_keypad
"#;

type CallLog = Arc<Mutex<Vec<ServiceCall>>>;

/// Register recording handlers for light/switch turn_on/turn_off.
///
/// When `simulate_devices` is set, each handler also writes the entity's
/// state into the state machine, the way a device integration would.
fn register_services(hass: &Arc<Hass>, simulate_devices: bool) -> CallLog {
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));

    for domain in ["light", "switch"] {
        for (service, value) in [("turn_on", "on"), ("turn_off", "off")] {
            let log = calls.clone();
            let states = hass.states.clone();
            hass.services.register(domain, service, move |call: ServiceCall| {
                let log = log.clone();
                let states = states.clone();
                let value = value.to_string();
                async move {
                    if simulate_devices {
                        for entity_id in call.entity_ids() {
                            if let Ok(entity_id) = entity_id.parse() {
                                states.set(
                                    entity_id,
                                    value.clone(),
                                    Default::default(),
                                    call.context.clone(),
                                );
                            }
                        }
                    }
                    log.lock().unwrap().push(call);
                    Ok(())
                }
            });
        }
    }

    calls
}

fn start_coordinator(hass: &Arc<Hass>) {
    let config: AppConfig = serde_yaml::from_str(CONFIG).unwrap();
    let coordinator = Coordinator::new(hass.clone(), config.validate().unwrap());
    tokio::spawn(coordinator.run());
}

fn fire_control(hass: &Arc<Hass>, code: &str) {
    hass.bus.fire_typed(
        IsyControlData {
            entity_id: "sensor.keypad_button_a".parse().unwrap(),
            control: code.to_string(),
        },
        Context::new(),
    );
}

/// Let the coordinator task drain its queues without moving the clock.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

fn count_steps(calls: &CallLog, pred: impl Fn(i64) -> bool) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| c.get::<i64>("brightness_step"))
        .filter(|step| pred(*step))
        .count()
}

#[tokio::test(start_paused = true)]
async fn watchdog_bounds_fade_session_to_ten_seconds() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, false);
    start_coordinator(&hass);
    settle().await;

    fire_control(&hass, "FDUP");
    settle().await;
    // First tick fires immediately
    assert_eq!(calls.lock().unwrap().len(), 1);

    for _ in 0..30 {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }

    // Ticks at 0s..=9s, then the watchdog cancels the session: no tick at
    // or after the 10s bound even though no stop code ever arrived.
    assert_eq!(calls.lock().unwrap().len(), 10);

    // A stop after the watchdog is a harmless no-op
    fire_control(&hass, "FDSTOP");
    settle().await;
    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(calls.lock().unwrap().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn new_fade_session_replaces_the_old_one() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, false);
    start_coordinator(&hass);
    settle().await;

    fire_control(&hass, "FDUP");
    settle().await;
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(count_steps(&calls, |s| s > 0), 4);

    // Switching direction cancels the old ticker and watchdog atomically
    fire_control(&hass, "FDDOWN");
    settle().await;
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(count_steps(&calls, |s| s > 0), 4);
    assert_eq!(count_steps(&calls, |s| s < 0), 4);

    // The replacement session gets a fresh 10s watchdog
    for _ in 0..20 {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(count_steps(&calls, |s| s > 0), 4);
    assert_eq!(count_steps(&calls, |s| s < 0), 10);
}

#[tokio::test(start_paused = true)]
async fn fade_stop_ends_the_session() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, false);
    start_coordinator(&hass);
    settle().await;

    fire_control(&hass, "FDUP");
    settle().await;
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    let ticks = calls.lock().unwrap().len();
    assert_eq!(ticks, 3);

    fire_control(&hass, "FDSTOP");
    settle().await;
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
    assert_eq!(calls.lock().unwrap().len(), ticks);
}

#[tokio::test(start_paused = true)]
async fn self_caused_changes_are_suppressed_and_external_ones_mirrored() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, true);
    start_coordinator(&hass);
    settle().await;

    // Button press: one call per responder; the resulting state changes
    // are self-caused and must not reach the follower.
    fire_control(&hass, "DON");
    settle().await;
    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|c| c.entity_ids() != vec!["light.office_keypad".to_string()]));
    }

    // Manual change at the device: mirrored to the follower exactly once
    hass.states.set(
        "light.office".parse().unwrap(),
        "off",
        Default::default(),
        Context::new(),
    );
    settle().await;
    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let follower = calls.last().unwrap();
        assert_eq!(follower.service_id(), "light.turn_off");
        assert_eq!(
            follower.entity_ids(),
            vec!["light.office_keypad".to_string()]
        );
    }

    // The follower's own state change is not watched, so no loop forms
    settle().await;
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn external_on_carries_brightness_to_a_light_follower() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, false);
    start_coordinator(&hass);
    settle().await;

    hass.states.set(
        "light.office".parse().unwrap(),
        "on",
        [("brightness".to_string(), json!(128))].into_iter().collect(),
        Context::new(),
    );
    settle().await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].service_id(), "light.turn_on");
    assert_eq!(calls[0].get::<u8>("brightness"), Some(128));
    assert_eq!(
        calls[0].entity_ids(),
        vec!["light.office_keypad".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_codes_and_foreign_controllers_are_ignored() {
    let hass = Arc::new(Hass::new());
    let calls = register_services(&hass, false);
    start_coordinator(&hass);
    settle().await;

    // A code outside the recognized seven
    fire_control(&hass, "ST");
    settle().await;

    // A recognized code from an entity that is not a configured controller
    hass.bus.fire_typed(
        IsyControlData {
            entity_id: "sensor.other_keypad".parse().unwrap(),
            control: "DON".to_string(),
        },
        Context::new(),
    );
    settle().await;

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert!(calls.lock().unwrap().is_empty());
}
