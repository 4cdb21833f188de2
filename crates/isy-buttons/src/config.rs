//! App configuration surface
//!
//! Mirrors the AppDaemon-style YAML config: a list of responders with
//! per-action service data, a list of controllers (string or list form),
//! and an optional follower entity. Validation happens after parsing;
//! nothing is subscribed until the whole config checks out.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use isy_core::{EntityId, EntityIdError};

/// Default brightness delta per fade tick
pub const DEFAULT_DIMMING_STEP: u32 = 50;

/// Errors produced by configuration validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("responders list must not be empty")]
    EmptyResponders,

    #[error("controllers list must not be empty")]
    EmptyControllers,

    #[error("dimming_step must be in 1..=255, got {0}")]
    DimmingStepOutOfRange(u32),

    #[error("invalid entity ID: {0}")]
    InvalidEntityId(#[from] EntityIdError),
}

/// One responder entry as it appears in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    pub entity_id: String,

    #[serde(default)]
    pub turn_on_data: Map<String, Value>,

    #[serde(default)]
    pub fast_on_data: Map<String, Value>,

    #[serde(default)]
    pub turn_off_data: Map<String, Value>,

    #[serde(default)]
    pub fast_off_data: Map<String, Value>,

    #[serde(default = "default_dimming_step")]
    pub dimming_step: u32,

    #[serde(default)]
    pub dimming_data: Map<String, Value>,
}

fn default_dimming_step() -> u32 {
    DEFAULT_DIMMING_STEP
}

/// Controllers accept either a single (possibly comma-separated) string or
/// a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ControllerList {
    One(String),
    Many(Vec<String>),
}

/// The raw app configuration as parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Host-loading metadata, not used by the coordinator
    pub module: String,

    /// Host-loading metadata, not used by the coordinator
    #[serde(rename = "class")]
    pub class_name: String,

    pub responders: Vec<ResponderConfig>,

    pub controllers: ControllerList,

    #[serde(default)]
    pub follower_entity: Option<String>,
}

/// A responder after validation, with parsed entity ID and checked step
#[derive(Debug, Clone)]
pub struct ResponderSpec {
    pub entity_id: EntityId,
    pub turn_on_data: Map<String, Value>,
    pub fast_on_data: Map<String, Value>,
    pub turn_off_data: Map<String, Value>,
    pub fast_off_data: Map<String, Value>,
    pub dimming_step: u8,
    pub dimming_data: Map<String, Value>,
}

/// The configuration after validation
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub responders: Vec<ResponderSpec>,
    pub controllers: Vec<EntityId>,
    pub follower_entity: Option<EntityId>,
}

impl AppConfig {
    /// Validate the parsed configuration.
    ///
    /// Checks list non-emptiness, the dimming step range, and every entity
    /// identifier. Any failure aborts initialization as a whole.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        if self.responders.is_empty() {
            return Err(ConfigError::EmptyResponders);
        }

        let mut responders = Vec::with_capacity(self.responders.len());
        for responder in &self.responders {
            if !(1..=255).contains(&responder.dimming_step) {
                return Err(ConfigError::DimmingStepOutOfRange(responder.dimming_step));
            }
            responders.push(ResponderSpec {
                entity_id: responder.entity_id.parse()?,
                turn_on_data: responder.turn_on_data.clone(),
                fast_on_data: responder.fast_on_data.clone(),
                turn_off_data: responder.turn_off_data.clone(),
                fast_off_data: responder.fast_off_data.clone(),
                dimming_step: responder.dimming_step as u8,
                dimming_data: responder.dimming_data.clone(),
            });
        }

        let controllers = self.controller_tokens()?;
        if controllers.is_empty() {
            return Err(ConfigError::EmptyControllers);
        }

        let follower_entity = self
            .follower_entity
            .as_deref()
            .map(str::parse)
            .transpose()?;

        Ok(ValidatedConfig {
            responders,
            controllers,
            follower_entity,
        })
    }

    /// Split and parse the controllers field.
    ///
    /// The single-string form is split on commas and trimmed; every token
    /// must be a valid entity ID.
    fn controller_tokens(&self) -> Result<Vec<EntityId>, ConfigError> {
        let tokens: Vec<String> = match &self.controllers {
            ControllerList::One(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
            ControllerList::Many(list) => list.iter().map(|t| t.trim().to_string()).collect(),
        };

        tokens
            .iter()
            .map(|t| t.parse().map_err(ConfigError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> AppConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn base_yaml() -> &'static str {
        r#"
module: isy994_buttons
class: ISY994Buttons
responders:
  - entity_id: light.office
    turn_on_data:
      brightness: 255
    dimming_step: 25
  - entity_id: switch.office_fan
controllers: sensor.keypad_button_a
follower_entity: light.office_keypad
"#
    }

    #[test]
    fn test_parse_and_validate() {
        let config = parse(base_yaml());
        assert_eq!(config.module, "isy994_buttons");
        assert_eq!(config.class_name, "ISY994Buttons");

        let validated = config.validate().unwrap();
        assert_eq!(validated.responders.len(), 2);
        assert_eq!(validated.responders[0].dimming_step, 25);
        assert_eq!(
            validated.responders[0].turn_on_data["brightness"],
            serde_json::json!(255)
        );
        assert_eq!(validated.controllers.len(), 1);
        assert_eq!(
            validated.follower_entity.as_ref().unwrap().to_string(),
            "light.office_keypad"
        );
    }

    #[test]
    fn test_dimming_step_defaults_to_50() {
        let config = parse(base_yaml());
        let validated = config.validate().unwrap();
        assert_eq!(validated.responders[1].dimming_step, 50);
        assert!(validated.responders[1].turn_on_data.is_empty());
    }

    #[test]
    fn test_controllers_comma_string() {
        let yaml = r#"
module: m
class: C
responders:
  - entity_id: light.a
controllers: "sensor.button_a, sensor.button_b ,sensor.button_c"
"#;
        let validated = parse(yaml).validate().unwrap();
        let ids: Vec<String> = validated
            .controllers
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            ids,
            vec!["sensor.button_a", "sensor.button_b", "sensor.button_c"]
        );
    }

    #[test]
    fn test_controllers_list_form() {
        let yaml = r#"
module: m
class: C
responders:
  - entity_id: light.a
controllers:
  - sensor.button_a
  - sensor.button_b
"#;
        let validated = parse(yaml).validate().unwrap();
        assert_eq!(validated.controllers.len(), 2);
    }

    #[test]
    fn test_empty_responders_rejected() {
        let yaml = r#"
module: m
class: C
responders: []
controllers: sensor.button_a
"#;
        assert!(matches!(
            parse(yaml).validate().unwrap_err(),
            ConfigError::EmptyResponders
        ));
    }

    #[test]
    fn test_dimming_step_out_of_range() {
        for step in [0, 256] {
            let yaml = format!(
                r#"
module: m
class: C
responders:
  - entity_id: light.a
    dimming_step: {step}
controllers: sensor.button_a
"#
            );
            assert!(matches!(
                parse(&yaml).validate().unwrap_err(),
                ConfigError::DimmingStepOutOfRange(s) if s == step
            ));
        }
    }

    #[test]
    fn test_malformed_entity_id_rejected() {
        let yaml = r#"
module: m
class: C
responders:
  - entity_id: not_an_entity
controllers: sensor.button_a
"#;
        assert!(matches!(
            parse(yaml).validate().unwrap_err(),
            ConfigError::InvalidEntityId(_)
        ));

        let yaml = r#"
module: m
class: C
responders:
  - entity_id: light.a
controllers: "sensor.button_a, bogus"
"#;
        assert!(matches!(
            parse(yaml).validate().unwrap_err(),
            ConfigError::InvalidEntityId(_)
        ));
    }

    #[test]
    fn test_missing_required_field_fails_parse() {
        let yaml = r#"
module: m
class: C
controllers: sensor.button_a
"#;
        assert!(serde_yaml::from_str::<AppConfig>(yaml).is_err());
    }

    #[test]
    fn test_follower_optional() {
        let yaml = r#"
module: m
class: C
responders:
  - entity_id: light.a
controllers: sensor.button_a
"#;
        let validated = parse(yaml).validate().unwrap();
        assert!(validated.follower_entity.is_none());
    }
}
