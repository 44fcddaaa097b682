//! Protocol definition for display updates.
//!
//! The presenter never builds markup. It emits a sequence of [`SurfaceMsg`] updates which a
//! surface renders however it likes, e.g. the browser page served by `diagnosis_server`.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Styling of a section of the diagnosis text.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStyle {
    /// Bold, large.
    Headline,
    Analysis,
    /// Accent color.
    Treatment,
}

/// A run of text rendered in one style.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Segment {
    pub style: SegmentStyle,
    pub text: String,
}

impl Segment {
    pub fn new(style: SegmentStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// States of one diagnosis cycle.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenterState {
    #[default]
    Idle,
    Thinking,
    Typing,
    Alerting,
}

impl fmt::Display for PresenterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Typing => "typing",
            Self::Alerting => "alerting",
        };
        write!(f, "{name}")
    }
}

/// Definition of display updates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SurfaceMsg {
    /// Replace the rolling status label.
    Status(String),
    /// Clear the diagnosis output.
    ClearResponse,
    /// Open a styled section in the diagnosis output.
    SegmentStart(SegmentStyle),
    /// Append one visible unit to the open section.
    Char(char),
    /// Close the open section.
    SegmentEnd,
    /// Show or hide the alert overlay.
    Alert(bool),
    /// Play the alert sound.
    PlayCue,
    /// Presenter changed state.
    State(PresenterState),
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::Error;

    #[test]
    fn test_json_shape_for_browser() -> Result<(), Error> {
        let start = serde_json::to_string(&SurfaceMsg::SegmentStart(SegmentStyle::Treatment))?;
        assert_eq!(start, r#"{"type":"segment_start","value":"treatment"}"#);

        let unit = serde_json::to_string(&SurfaceMsg::Char('é'))?;
        assert_eq!(unit, r#"{"type":"char","value":"é"}"#);

        let clear = serde_json::to_string(&SurfaceMsg::ClearResponse)?;
        assert_eq!(clear, r#"{"type":"clear_response"}"#);

        let parsed: SurfaceMsg = serde_json::from_str(r#"{"type":"alert","value":true}"#)?;
        assert_eq!(parsed, SurfaceMsg::Alert(true));

        Ok(())
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PresenterState::default().to_string(), "idle");
        assert_eq!(PresenterState::Alerting.to_string(), "alerting");
    }
}
