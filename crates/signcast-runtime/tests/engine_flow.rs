//! Engine Flow Integration Tests
//!
//! Drives the engine task through its channels with hand-fed timer ticks, so
//! rotation order, injection, preemption, and stall handling can be asserted
//! deterministically. The last test runs the whole runtime with real timers.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;

use signcast_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel, create_event_channel,
    AppEventReceiver, CommandSender, EffectReceiver, EventSender,
};
use signcast_core::{
    AppEvent, Command, DeviceKind, Effect, Event, LightCode, MessageBoard, MessageId, Modality,
    Priority, SigncastConfig, SigncastResult, SignMessage,
};
use signcast_runtime::{
    create_test_runtime, create_tick_channel, EngineState, EngineTask, RecordingDevice, TickSender,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Engine Harness
// ----------------------------------------------------------------------------

/// An engine task wired up with manual tick senders
struct EngineHarness {
    board: MessageBoard,
    command_sender: CommandSender,
    event_sender: EventSender,
    rotate_ticks: TickSender,
    #[allow(dead_code)]
    sync_ticks: TickSender,
    effects: EffectReceiver,
    app_events: AppEventReceiver,
    engine: JoinHandle<SigncastResult<()>>,
}

impl EngineHarness {
    fn start() -> Self {
        let config = SigncastConfig::testing();
        let board = MessageBoard::new();

        let (command_sender, command_receiver) = create_command_channel(&config.channels);
        let (event_sender, event_receiver) = create_event_channel(&config.channels);
        let (effect_sender, effects) = create_effect_channel(&config.channels);
        let (app_event_sender, app_events) = create_app_event_channel(&config.channels);
        let (sync_ticks, sync_tick_receiver) = create_tick_channel();
        let (rotate_ticks, rotate_tick_receiver) = create_tick_channel();

        let mut engine = EngineTask::new(
            EngineState::new(board.clone()),
            config.engine,
            config.notify,
            command_receiver,
            event_receiver,
            sync_tick_receiver,
            rotate_tick_receiver,
            effect_sender,
            app_event_sender,
        );
        let engine = tokio::spawn(async move { engine.run().await });

        Self {
            board,
            command_sender,
            event_sender,
            rotate_ticks,
            sync_ticks,
            effects,
            app_events,
            engine,
        }
    }

    /// Post a message and wait for the board count to acknowledge it
    async fn post(&mut self, message: SignMessage) -> MessageId {
        let id = message.id;
        let want = self.board.len() + 1;
        self.command_sender
            .send(Command::PostMessage { message })
            .await
            .expect("command channel closed");
        self.await_app_event(|event| {
            matches!(event, AppEvent::DeliverableCountChanged { count } if *count == want)
        })
        .await;
        id
    }

    async fn tick(&self) {
        self.rotate_ticks.send(()).await.expect("tick channel closed");
    }

    /// Confirm a launch the way the renderer would, then wait for the
    /// delivery slot to clear so the next tick cannot race the completion
    async fn confirm(&mut self, message_id: MessageId, skip_write: bool) {
        self.event_sender
            .send(Event::DeliveryStarted { message_id })
            .await
            .expect("event channel closed");
        self.event_sender
            .send(Event::DeliveryCompleted {
                message_id,
                skip_write,
            })
            .await
            .expect("event channel closed");
        self.await_app_event(|event| {
            matches!(
                event,
                AppEvent::DeliveryStateChanged {
                    loading: None,
                    current: None,
                    ..
                }
            )
        })
        .await;
    }

    async fn next_effect(&mut self) -> Effect {
        timeout(TEST_TIMEOUT, self.effects.recv())
            .await
            .expect("timed out waiting for an effect")
            .expect("effect channel closed")
    }

    /// Next launch effect, skipping lights and speech on the way
    async fn next_launch(&mut self) -> (MessageId, String, bool) {
        let deadline = Instant::now() + TEST_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .expect("timed out waiting for a launch effect");
            match timeout(remaining, self.effects.recv()).await {
                Ok(Ok(Effect::LaunchActivity {
                    message_id,
                    content,
                    skip_write,
                    ..
                })) => return (message_id, content, skip_write),
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => panic!("effect channel error: {}", e),
                Err(_) => panic!("timed out waiting for a launch effect"),
            }
        }
    }

    /// Tick, take the launch, and confirm it with its own skip flag
    async fn rotate_once(&mut self) -> (MessageId, bool) {
        self.tick().await;
        let (id, _, skip_write) = self.next_launch().await;
        self.confirm(id, skip_write).await;
        (id, skip_write)
    }

    /// Assert that no launch reaches the devices inside the window
    async fn assert_no_launch_within(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        loop {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return,
            };
            match timeout(remaining, self.effects.recv()).await {
                Ok(Ok(Effect::LaunchActivity { message_id, .. })) => {
                    panic!("unexpected launch of {}", message_id)
                }
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => return,
                Err(_) => return,
            }
        }
    }

    /// Assert that the effect stream stays silent for the window
    async fn assert_quiet(&mut self, window: Duration) {
        match timeout(window, self.effects.recv()).await {
            Ok(Ok(effect)) => panic!("unexpected effect: {:?}", effect),
            Ok(Err(_)) | Err(_) => {}
        }
    }

    async fn await_app_event<F>(&mut self, pred: F) -> AppEvent
    where
        F: Fn(&AppEvent) -> bool,
    {
        let deadline = Instant::now() + TEST_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .expect("timed out waiting for an app event");
            match timeout(remaining, self.app_events.recv()).await {
                Ok(Some(event)) if pred(&event) => return event,
                Ok(Some(_)) => continue,
                Ok(None) => panic!("app event channel closed"),
                Err(_) => panic!("timed out waiting for an app event"),
            }
        }
    }

    async fn shutdown(self) {
        self.command_sender
            .send(Command::Shutdown)
            .await
            .expect("command channel closed");
        let result = self.engine.await.expect("engine task panicked");
        assert_ok!(result);
    }
}

fn text(priority: i32, body: &str) -> SignMessage {
    SignMessage::new(Priority::new(priority), Modality::Text, body)
}

// ----------------------------------------------------------------------------
// Rotation Flow Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_post_seeds_rotation_and_first_tick_delivers() {
    let mut harness = EngineHarness::start();

    let id = harness.post(text(5, "door code is 4711")).await;
    harness.tick().await;

    let (launched, content, skip_write) = harness.next_launch().await;
    assert_eq!(launched, id);
    assert_eq!(content, "door code is 4711");
    assert!(!skip_write);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_arrivals_rotate_round_robin_with_injections_first() {
    let mut harness = EngineHarness::start();

    // A seeds the rotation; B lands in the injection queue
    let a = harness.post(text(5, "alpha")).await;
    let b = harness.post(text(5, "bravo")).await;

    // B goes out first as an injection and leaves the anchor alone
    let (first, skip) = harness.rotate_once().await;
    assert_eq!(first, b);
    assert!(skip);

    // The round-robin then starts at the head
    let (second, skip) = harness.rotate_once().await;
    assert_eq!(second, a);
    assert!(!skip);

    // C arrives mid-rotation and jumps the queue
    let c = harness.post(text(5, "charlie")).await;
    let (third, skip) = harness.rotate_once().await;
    assert_eq!(third, c);
    assert!(skip);

    // The anchor is still A, so the rotation resumes at B, reaches C in
    // its rotation slot, and wraps back to A
    let (fourth, _) = harness.rotate_once().await;
    assert_eq!(fourth, b);
    let (fifth, _) = harness.rotate_once().await;
    assert_eq!(fifth, c);
    let (sixth, _) = harness.rotate_once().await;
    assert_eq!(sixth, a);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_higher_priority_preempts_rotation() {
    let mut harness = EngineHarness::start();

    let a = harness.post(text(5, "routine")).await;
    let (launched, _) = harness.rotate_once().await;
    assert_eq!(launched, a);

    // A higher class takes over the whole rotation
    let urgent = harness.post(text(9, "evacuate west wing")).await;
    let (launched, skip) = harness.rotate_once().await;
    assert_eq!(launched, urgent);
    assert!(!skip);

    // With the urgent message gone, the lower class is reseeded
    harness
        .command_sender
        .send(Command::RemoveMessage { id: urgent })
        .await
        .expect("command channel closed");
    harness
        .await_app_event(|event| {
            matches!(event, AppEvent::DeliverableCountChanged { count: 1 })
        })
        .await;

    let (launched, _) = harness.rotate_once().await;
    assert_eq!(launched, a);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_clear_all_stops_delivery_and_stands_lights_down() {
    let mut harness = EngineHarness::start();

    let message =
        text(5, "with light").with_light(LightCode::Code(3), Duration::from_secs(10));
    harness.post(message).await;

    harness.tick().await;
    assert!(matches!(
        harness.next_effect().await,
        Effect::StartLight { code: 3, .. }
    ));
    // Drain up to the launch so the delayed send is behind us
    let _ = harness.next_launch().await;

    harness
        .command_sender
        .send(Command::ClearAllMessages)
        .await
        .expect("command channel closed");

    assert!(matches!(
        harness.next_effect().await,
        Effect::FinishAllActivities
    ));
    assert!(matches!(harness.next_effect().await, Effect::LightsStandby));
    harness
        .await_app_event(|event| {
            matches!(event, AppEvent::DeliverableCountChanged { count: 0 })
        })
        .await;

    // Nothing left to rotate
    harness.tick().await;
    harness.assert_no_launch_within(Duration::from_millis(50)).await;

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unhandled_modality_never_launches() {
    let mut harness = EngineHarness::start();

    let image = SignMessage::new(Priority::new(5), Modality::Image, "poster.png");
    let image_id = image.id;
    harness.post(image).await;

    // The image seeds the rotation but has no delivery path
    harness.tick().await;
    harness.assert_no_launch_within(Duration::from_millis(50)).await;
    assert!(harness.board.contains(&image_id));

    // A deliverable arrival still gets through as an injection
    let note = harness.post(text(5, "works fine")).await;
    let (launched, _) = harness.rotate_once().await;
    assert_eq!(launched, note);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_stalled_delivery_is_forced_forward() {
    let mut harness = EngineHarness::start();

    let id = harness.post(text(5, "goes quiet")).await;
    harness.tick().await;
    let (launched, _, _) = harness.next_launch().await;
    assert_eq!(launched, id);

    // No completion arrives; wait out the stall limit
    tokio::time::sleep(Duration::from_millis(550)).await;
    harness.tick().await;

    let stalled = harness
        .await_app_event(|event| matches!(event, AppEvent::RotationStalled { .. }))
        .await;
    match stalled {
        AppEvent::RotationStalled {
            message_id,
            stalled_for,
        } => {
            assert_eq!(message_id, id);
            assert!(stalled_for >= Duration::from_millis(500));
        }
        other => panic!("expected RotationStalled, got {:?}", other),
    }

    // The same tick moves the rotation forward again
    let (relaunched, _, _) = harness.next_launch().await;
    assert_eq!(relaunched, id);

    harness.shutdown().await;
}

// ----------------------------------------------------------------------------
// Button Flow Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_button_press_lockout_and_tone() {
    let mut harness = EngineHarness::start();
    let addr = "01:02:03:04:05:06".parse().expect("valid address");

    let press = Event::ButtonPressed {
        device_type: "wireless-button".to_string(),
        addr,
        button: 1,
    };
    harness
        .event_sender
        .send(press.clone())
        .await
        .expect("event channel closed");
    harness
        .event_sender
        .send(press)
        .await
        .expect("event channel closed");

    // Two rapid presses collapse into one report
    assert!(matches!(
        harness.next_effect().await,
        Effect::PostButtonReport { button: 1, .. }
    ));
    harness.assert_quiet(Duration::from_millis(30)).await;

    // The notifier settling the report triggers a feedback tone
    harness
        .event_sender
        .send(Event::ButtonReportFinished {
            addr,
            button: 1,
            delivered: true,
        })
        .await
        .expect("event channel closed");
    assert!(matches!(
        harness.next_effect().await,
        Effect::PlayTone {
            tone: signcast_core::Tone::Success
        }
    ));

    harness.shutdown().await;
}

// ----------------------------------------------------------------------------
// Full Runtime Test
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_full_runtime_delivers_with_real_timers() {
    let renderer = RecordingDevice::with_auto_confirm(DeviceKind::Renderer);
    let recorded = renderer.recorded();

    let mut handle = signcast_runtime::RuntimeBuilder::new()
        .with_config(SigncastConfig::testing())
        .with_supervisor(signcast_runtime::SupervisorConfig::testing())
        .add_device(Box::new(renderer))
        .build_and_start()
        .await
        .expect("runtime failed to start");

    let (first, second) = futures::future::join(
        handle.send_command(Command::PostMessage {
            message: text(5, "first notice"),
        }),
        handle.send_command(Command::PostMessage {
            message: text(5, "second notice"),
        }),
    )
    .await;
    assert_ok!(first);
    assert_ok!(second);

    // Testing cadence rotates every 40ms; give it a few turns
    tokio::time::sleep(Duration::from_millis(400)).await;

    let launched: Vec<String> = recorded
        .lock()
        .unwrap()
        .iter()
        .filter_map(|effect| match effect {
            Effect::LaunchActivity { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect();
    assert!(launched.iter().any(|c| c == "first notice"));
    assert!(launched.iter().any(|c| c == "second notice"));
    assert!(launched.len() >= 3, "rotation should keep cycling");

    handle.shutdown().await.expect("shutdown failed");
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_create_test_runtime_round_trip() {
    let mut handle = create_test_runtime().await.expect("runtime failed to start");
    assert!(handle.is_running());

    assert_ok!(handle.send_command(Command::SyncNow).await);
    handle.shutdown().await.expect("shutdown failed");
}
