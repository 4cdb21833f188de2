//! ISY994 control codes
//!
//! The seven button signals the ISY994 integration puts on the bus. The
//! discrete codes map directly to a turn_on/turn_off service; the fade codes
//! drive the dimming session.

use std::fmt;
use std::str::FromStr;

use isy_core::{SERVICE_TURN_OFF, SERVICE_TURN_ON};
use thiserror::Error;

/// A control code outside the seven recognized values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized control code: {0}")]
pub struct UnknownControlCode(pub String);

/// A recognized ISY994 button control code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    /// DON - on button pressed
    On,
    /// DFON - on button double-tapped (fast on)
    FastOn,
    /// DOF - off button pressed
    Off,
    /// DFOF - off button double-tapped (fast off)
    FastOff,
    /// FDUP - fade-up button held
    FadeUp,
    /// FDDOWN - fade-down button held
    FadeDown,
    /// FDSTOP - fade button released
    FadeStop,
}

impl ControlCode {
    /// The wire string for this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCode::On => "DON",
            ControlCode::FastOn => "DFON",
            ControlCode::Off => "DOF",
            ControlCode::FastOff => "DFOF",
            ControlCode::FadeUp => "FDUP",
            ControlCode::FadeDown => "FDDOWN",
            ControlCode::FadeStop => "FDSTOP",
        }
    }

    /// The service a discrete code maps to, or None for fade codes
    pub fn discrete_service(&self) -> Option<&'static str> {
        match self {
            ControlCode::On | ControlCode::FastOn => Some(SERVICE_TURN_ON),
            ControlCode::Off | ControlCode::FastOff => Some(SERVICE_TURN_OFF),
            ControlCode::FadeUp | ControlCode::FadeDown | ControlCode::FadeStop => None,
        }
    }

    /// Whether this is one of the fade codes
    pub fn is_fade(&self) -> bool {
        self.discrete_service().is_none()
    }
}

impl FromStr for ControlCode {
    type Err = UnknownControlCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DON" => Ok(ControlCode::On),
            "DFON" => Ok(ControlCode::FastOn),
            "DOF" => Ok(ControlCode::Off),
            "DFOF" => Ok(ControlCode::FastOff),
            "FDUP" => Ok(ControlCode::FadeUp),
            "FDDOWN" => Ok(ControlCode::FadeDown),
            "FDSTOP" => Ok(ControlCode::FadeStop),
            other => Err(UnknownControlCode(other.to_string())),
        }
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_codes() {
        assert_eq!("DON".parse::<ControlCode>().unwrap(), ControlCode::On);
        assert_eq!("DFON".parse::<ControlCode>().unwrap(), ControlCode::FastOn);
        assert_eq!("DOF".parse::<ControlCode>().unwrap(), ControlCode::Off);
        assert_eq!("DFOF".parse::<ControlCode>().unwrap(), ControlCode::FastOff);
        assert_eq!("FDUP".parse::<ControlCode>().unwrap(), ControlCode::FadeUp);
        assert_eq!(
            "FDDOWN".parse::<ControlCode>().unwrap(),
            ControlCode::FadeDown
        );
        assert_eq!(
            "FDSTOP".parse::<ControlCode>().unwrap(),
            ControlCode::FadeStop
        );
    }

    #[test]
    fn test_unknown_code() {
        let err = "ST".parse::<ControlCode>().unwrap_err();
        assert_eq!(err, UnknownControlCode("ST".to_string()));
        // Codes are case sensitive on the wire
        assert!("don".parse::<ControlCode>().is_err());
    }

    #[test]
    fn test_discrete_service_mapping() {
        assert_eq!(ControlCode::On.discrete_service(), Some("turn_on"));
        assert_eq!(ControlCode::FastOn.discrete_service(), Some("turn_on"));
        assert_eq!(ControlCode::Off.discrete_service(), Some("turn_off"));
        assert_eq!(ControlCode::FastOff.discrete_service(), Some("turn_off"));
        assert!(ControlCode::FadeUp.is_fade());
        assert!(ControlCode::FadeDown.is_fade());
        assert!(ControlCode::FadeStop.is_fade());
    }

    #[test]
    fn test_roundtrip() {
        for code in [
            ControlCode::On,
            ControlCode::FastOn,
            ControlCode::Off,
            ControlCode::FastOff,
            ControlCode::FadeUp,
            ControlCode::FadeDown,
            ControlCode::FadeStop,
        ] {
            assert_eq!(code.as_str().parse::<ControlCode>().unwrap(), code);
        }
    }
}
