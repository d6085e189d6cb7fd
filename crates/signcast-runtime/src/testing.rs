//! Test Doubles
//!
//! Device task stand-ins for tests and demos. `RecordingDevice` subscribes to
//! the effect bus like a real device, records everything it sees, and can
//! play the renderer's part by confirming launches back to the engine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use signcast_core::channel::{EffectReceiver, EventSender};
use signcast_core::{
    DeviceError, DeviceKind, DeviceTask, Effect, Event, SigncastError, SigncastResult,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// Shared log of effects a recording device has seen
pub type RecordedEffects = Arc<Mutex<Vec<Effect>>>;

// ----------------------------------------------------------------------------
// Recording Device
// ----------------------------------------------------------------------------

/// A device task that records effects instead of driving hardware
pub struct RecordingDevice {
    kind: DeviceKind,
    /// Answer every launch with started and completed events
    auto_confirm: bool,
    recorded: RecordedEffects,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl RecordingDevice {
    /// Create a recording device of the given kind
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            auto_confirm: false,
            recorded: Arc::new(Mutex::new(Vec::new())),
            event_sender: None,
            effect_receiver: None,
        }
    }

    /// Create a recording renderer that confirms every launch
    pub fn with_auto_confirm(kind: DeviceKind) -> Self {
        Self {
            auto_confirm: true,
            ..Self::new(kind)
        }
    }

    /// Handle to the recorded effect log
    pub fn recorded(&self) -> RecordedEffects {
        Arc::clone(&self.recorded)
    }
}

#[async_trait]
impl DeviceTask for RecordingDevice {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<()> {
        if self.event_sender.is_some() {
            return Err(SigncastError::config_error(format!(
                "{} device channels already attached",
                self.kind
            )));
        }
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> SigncastResult<()> {
        let event_sender = self.event_sender.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind.to_string(),
            })
        })?;
        let mut effect_receiver = self.effect_receiver.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind.to_string(),
            })
        })?;

        loop {
            match effect_receiver.recv().await {
                Ok(effect) => {
                    let confirm = match (&effect, self.auto_confirm) {
                        (
                            Effect::LaunchActivity {
                                message_id,
                                skip_write,
                                ..
                            },
                            true,
                        ) => Some((*message_id, *skip_write)),
                        _ => None,
                    };

                    if let Ok(mut recorded) = self.recorded.lock() {
                        recorded.push(effect);
                    }

                    if let Some((message_id, skip_write)) = confirm {
                        let started = Event::DeliveryStarted { message_id };
                        if event_sender.send(started).await.is_err() {
                            return Ok(());
                        }
                        let completed = Event::DeliveryCompleted {
                            message_id,
                            skip_write,
                        };
                        if event_sender.send(completed).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("{} device lagged; {} effects missed", self.kind, missed);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    fn kind(&self) -> DeviceKind {
        self.kind
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use signcast_core::channel::{create_effect_channel, create_event_channel};
    use signcast_core::ChannelConfig;

    #[tokio::test]
    async fn test_recording_device_records_effects() {
        let config = ChannelConfig::testing();
        let (event_sender, _event_receiver) = create_event_channel(&config);
        let (effect_sender, effect_receiver) = create_effect_channel(&config);

        let mut device = RecordingDevice::new(DeviceKind::Lights);
        let recorded = device.recorded();
        device.attach_channels(event_sender, effect_receiver).unwrap();

        let handle = tokio::spawn(async move { device.run().await });

        effect_sender.send(Effect::LightsStandby).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(effect_sender);

        handle.await.unwrap().unwrap();
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(recorded[0], Effect::LightsStandby));
    }

    #[tokio::test]
    async fn test_auto_confirm_answers_launches() {
        let config = ChannelConfig::testing();
        let (event_sender, mut event_receiver) = create_event_channel(&config);
        let (effect_sender, effect_receiver) = create_effect_channel(&config);

        let mut device = RecordingDevice::with_auto_confirm(DeviceKind::Renderer);
        device.attach_channels(event_sender, effect_receiver).unwrap();
        let handle = tokio::spawn(async move { device.run().await });

        let message_id = signcast_core::MessageId::random();
        effect_sender
            .send(Effect::LaunchActivity {
                kind: signcast_core::ActivityKind::ScrollingText,
                message_id,
                content: "hello".to_string(),
                skip_write: true,
            })
            .unwrap();

        match event_receiver.recv().await {
            Some(Event::DeliveryStarted { message_id: started }) => {
                assert_eq!(started, message_id)
            }
            other => panic!("Expected DeliveryStarted, got {:?}", other),
        }
        match event_receiver.recv().await {
            Some(Event::DeliveryCompleted {
                message_id: completed,
                skip_write,
            }) => {
                assert_eq!(completed, message_id);
                assert!(skip_write);
            }
            other => panic!("Expected DeliveryCompleted, got {:?}", other),
        }

        drop(effect_sender);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_without_channels_fails() {
        let mut device = RecordingDevice::new(DeviceKind::Audio);
        let err = device.run().await.unwrap_err();
        assert!(err.to_string().contains("without channels attached"));
    }
}
