//! Console device tasks for the appliance binary
//!
//! These stand in for the signage hardware behind the `DeviceTask` seam: a
//! renderer that prints launches to the terminal and acknowledges them after
//! a hold period, plus logging stubs for the light bar and the tone player.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use signcast_core::channel::{EffectReceiver, EventSender};
use signcast_core::{
    DeviceError, DeviceKind, DeviceTask, Effect, Event, MessageId, SigncastError, SigncastResult,
    Tone,
};

// ----------------------------------------------------------------------------
// Console Renderer
// ----------------------------------------------------------------------------

/// Shows launches on the terminal and confirms them the way a display would
pub struct ConsoleRenderer {
    display_hold: Duration,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl ConsoleRenderer {
    pub fn new(display_hold: Duration) -> Self {
        Self {
            display_hold,
            event_sender: None,
            effect_receiver: None,
        }
    }
}

#[async_trait]
impl DeviceTask for ConsoleRenderer {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> SigncastResult<()> {
        let event_sender = self.event_sender.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind().to_string(),
            })
        })?;
        let mut effects = self.effect_receiver.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind().to_string(),
            })
        })?;

        let mut showing: Option<(MessageId, bool)> = None;
        let mut hold_until = tokio::time::Instant::now();

        loop {
            tokio::select! {
                effect = effects.recv() => match effect {
                    Ok(Effect::LaunchActivity { kind, message_id, content, skip_write }) => {
                        info!("Showing [{}] {}", kind, content);
                        if event_sender
                            .send(Event::DeliveryStarted { message_id })
                            .await
                            .is_err()
                        {
                            return Ok(());
                        }
                        showing = Some((message_id, skip_write));
                        hold_until = tokio::time::Instant::now() + self.display_hold;
                    }
                    Ok(Effect::FinishActivity { .. }) | Ok(Effect::FinishAllActivities) => {
                        if showing.take().is_some() {
                            info!("Display cleared");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Renderer lagged behind {} effect(s)", missed);
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
                _ = tokio::time::sleep_until(hold_until), if showing.is_some() => {
                    if let Some((message_id, skip_write)) = showing.take() {
                        if event_sender
                            .send(Event::DeliveryCompleted { message_id, skip_write })
                            .await
                            .is_err()
                        {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Renderer
    }
}

// ----------------------------------------------------------------------------
// Light Bar Stub
// ----------------------------------------------------------------------------

/// Logs light bar commands instead of driving hardware
#[derive(Default)]
pub struct LoggingLights {
    effect_receiver: Option<EffectReceiver>,
}

impl LoggingLights {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTask for LoggingLights {
    fn attach_channels(
        &mut self,
        _event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<()> {
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> SigncastResult<()> {
        let mut effects = self.effect_receiver.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind().to_string(),
            })
        })?;

        loop {
            match effects.recv().await {
                Ok(Effect::StartLight { code, duration }) => {
                    info!("Light bar on: code {} for {:?}", code, duration);
                }
                Ok(Effect::LightsStandby) => {
                    info!("Light bar standing by");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Light bar lagged behind {} effect(s)", missed);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Lights
    }
}

// ----------------------------------------------------------------------------
// Tone Player Stub
// ----------------------------------------------------------------------------

/// Logs feedback tones instead of playing audio
#[derive(Default)]
pub struct ConsoleAudio {
    effect_receiver: Option<EffectReceiver>,
}

impl ConsoleAudio {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTask for ConsoleAudio {
    fn attach_channels(
        &mut self,
        _event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<()> {
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> SigncastResult<()> {
        let mut effects = self.effect_receiver.take().ok_or_else(|| {
            SigncastError::from(DeviceError::ChannelsNotAttached {
                device: self.kind().to_string(),
            })
        })?;

        loop {
            match effects.recv().await {
                Ok(Effect::PlayTone { tone }) => match tone {
                    Tone::Success => info!("Chime: success"),
                    Tone::Failure => info!("Chime: failure"),
                },
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Tone player lagged behind {} effect(s)", missed);
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Audio
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
