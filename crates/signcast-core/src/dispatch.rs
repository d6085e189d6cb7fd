//! Dispatch planning for one delivery attempt
//!
//! Turns a message into the ordered effects that carry it to the hardware:
//! an optional light cue, the activity launch, and for text messages a speech
//! pre-synthesis request. Planning is pure; the engine owns the timing (the
//! light leads the launch by a configured delay) and the channel sends.

use crate::channel::{ActivityKind, Effect};
use crate::errors::DispatchError;
use crate::message::{Modality, SignMessage};

// ----------------------------------------------------------------------------
// Dispatch Plan
// ----------------------------------------------------------------------------

/// Ordered side effects for one delivery attempt
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    /// Light cue to fire ahead of the launch, when the message carries one
    pub light: Option<Effect>,
    /// The activity launch itself
    pub launch: Effect,
    /// Speech pre-synthesis for text messages
    pub speech: Option<Effect>,
}

// ----------------------------------------------------------------------------
// Planning
// ----------------------------------------------------------------------------

/// Map a modality to its delivery activity
pub fn activity_for(modality: Modality) -> Option<ActivityKind> {
    match modality {
        Modality::Text => Some(ActivityKind::ScrollingText),
        Modality::WebPage => Some(ActivityKind::WebPage),
        _ => None,
    }
}

/// Build the dispatch plan for one delivery attempt
///
/// Modalities without a delivery path fail here; the caller abandons the
/// attempt and the message stays in rotation untouched.
pub fn plan_delivery(
    message: &SignMessage,
    skip_write: bool,
) -> Result<DispatchPlan, DispatchError> {
    let kind = activity_for(message.modality).ok_or(DispatchError::UnhandledModality {
        modality: message.modality,
    })?;

    let light = message.light_code.code().map(|code| Effect::StartLight {
        code,
        duration: message.light_duration,
    });

    let launch = Effect::LaunchActivity {
        kind,
        message_id: message.id,
        content: message.content.clone(),
        skip_write,
    };

    let speech = match message.modality {
        Modality::Text => Some(Effect::PrepareSpeech {
            message_id: message.id,
            text: message.content.clone(),
        }),
        _ => None,
    };

    Ok(DispatchPlan {
        light,
        launch,
        speech,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LightCode;
    use crate::types::Priority;
    use std::time::Duration;

    #[test]
    fn test_text_plan() {
        let message = SignMessage::new(Priority::new(5), Modality::Text, "fire drill at noon")
            .with_light(LightCode::Code(2), Duration::from_secs(45));

        let plan = plan_delivery(&message, false).unwrap();

        match plan.light {
            Some(Effect::StartLight { code, duration }) => {
                assert_eq!(code, 2);
                assert_eq!(duration, Duration::from_secs(45));
            }
            other => panic!("Expected light cue, got {:?}", other),
        }
        match plan.launch {
            Effect::LaunchActivity {
                kind, skip_write, ..
            } => {
                assert_eq!(kind, ActivityKind::ScrollingText);
                assert!(!skip_write);
            }
            other => panic!("Expected launch, got {:?}", other),
        }
        assert!(matches!(plan.speech, Some(Effect::PrepareSpeech { .. })));
    }

    #[test]
    fn test_web_page_plan_has_no_speech() {
        let message = SignMessage::new(
            Priority::NORMAL,
            Modality::WebPage,
            "https://intranet/cafeteria-menu",
        );

        let plan = plan_delivery(&message, true).unwrap();

        assert!(plan.light.is_none());
        assert!(plan.speech.is_none());
        match plan.launch {
            Effect::LaunchActivity {
                kind,
                skip_write,
                content,
                ..
            } => {
                assert_eq!(kind, ActivityKind::WebPage);
                assert!(skip_write);
                assert_eq!(content, "https://intranet/cafeteria-menu");
            }
            other => panic!("Expected launch, got {:?}", other),
        }
    }

    #[test]
    fn test_unactionable_light_codes_suppress_cue() {
        let none = SignMessage::new(Priority::NORMAL, Modality::Text, "x");
        assert!(plan_delivery(&none, false).unwrap().light.is_none());

        let unknown = SignMessage::new(Priority::NORMAL, Modality::Text, "x")
            .with_light(LightCode::Unknown, Duration::from_secs(10));
        assert!(plan_delivery(&unknown, false).unwrap().light.is_none());
    }

    #[test]
    fn test_unhandled_modalities_fail_planning() {
        for modality in [
            Modality::Image,
            Modality::AudioFile,
            Modality::AudioStream,
            Modality::VideoFile,
            Modality::VideoStream,
            Modality::LocationMap,
            Modality::Unknown,
        ] {
            let message = SignMessage::new(Priority::NORMAL, modality, "payload");
            assert!(matches!(
                plan_delivery(&message, false),
                Err(DispatchError::UnhandledModality { .. })
            ));
        }
    }
}
