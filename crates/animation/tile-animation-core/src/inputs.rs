//! Commands from an external time controller.
//!
//! A controller may drive several animations at once (a shared time
//! slider, play/pause buttons). Adapters deserialize its events into
//! [`ControllerCommand`] and pass them to `FrameAnimation::apply_command`.

use serde::{Deserialize, Serialize};

use crate::time::TimeInput;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControllerCommand {
    /// Replace the time window and reload when a render target is bound.
    /// Absent fields keep their current value.
    SetPeriod {
        #[serde(default)]
        begin: Option<TimeInput>,
        #[serde(default)]
        end: Option<TimeInput>,
        #[serde(default)]
        resolution: Option<f64>,
    },
    Reload,
    ShowTime {
        time: TimeInput,
    },
    Start,
    Pause,
    Stop,
    Previous,
    Next,
    SetFrameRate {
        value: f64,
    },
}

impl ControllerCommand {
    pub fn from_json(text: &str) -> Result<Self, crate::AnimationError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unit_and_struct_commands() {
        assert_eq!(
            ControllerCommand::from_json("\"Start\"").unwrap(),
            ControllerCommand::Start
        );
        let cmd = ControllerCommand::from_json(
            r#"{"SetPeriod":{"begin":0,"end":"1970-01-01T00:00:03Z","resolution":1000}}"#,
        )
        .unwrap();
        let ControllerCommand::SetPeriod { begin, end, resolution } = cmd else {
            panic!("expected SetPeriod");
        };
        assert_eq!(begin, Some(TimeInput::Epoch(0.0)));
        assert_eq!(end.and_then(|e| e.to_timestamp()).map(|t| t.as_millis()), Some(3000));
        assert_eq!(resolution, Some(1000.0));
        assert!(ControllerCommand::from_json("\"Rewind\"").is_err());
    }
}
