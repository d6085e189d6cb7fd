//! Button Notifier Task
//!
//! Forwards button presses to the configured HTTP backend. The notifier is a
//! worker on the effect bus: it picks up `PostButtonReport` effects, posts
//! them with bounded retries, and reports the settled outcome back to the
//! engine as a `ButtonReportFinished` event. Reports are posted one at a
//! time; a press arriving mid-post waits on the effect channel.

use signcast_core::channel::{EffectReceiver, EventSender};
use signcast_core::{
    DeviceAddr, Effect, Event, NotifyConfig, NotifyError, SigncastError, SigncastResult, Timestamp,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Button Notifier
// ----------------------------------------------------------------------------

/// Posts button reports to the backend and reports back to the engine
#[derive(Debug)]
pub struct ButtonNotifier {
    config: NotifyConfig,
    client: reqwest::Client,
    /// None leaves the notifier running but every report settles as failed
    endpoint: Option<reqwest::Url>,
    event_sender: EventSender,
    effect_receiver: EffectReceiver,
}

impl ButtonNotifier {
    /// Create a notifier, validating the endpoint up front
    pub fn new(
        config: NotifyConfig,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> SigncastResult<Self> {
        let endpoint = match &config.endpoint {
            Some(raw) => Some(reqwest::Url::parse(raw).map_err(|e| NotifyError::InvalidEndpoint {
                endpoint: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("signcast/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SigncastError::config_error(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            endpoint,
            event_sender,
            effect_receiver,
        })
    }

    /// Run the notifier loop until the effect channel closes
    pub async fn run(mut self) -> SigncastResult<()> {
        info!(
            "Button notifier starting (endpoint: {})",
            self.endpoint
                .as_ref()
                .map(|url| url.as_str())
                .unwrap_or("none")
        );

        loop {
            match self.effect_receiver.recv().await {
                Ok(Effect::PostButtonReport {
                    device_type,
                    addr,
                    button,
                    pressed_at,
                }) => {
                    let delivered = self
                        .post_report(&device_type, addr, button, pressed_at)
                        .await;
                    let finished = Event::ButtonReportFinished {
                        addr,
                        button,
                        delivered,
                    };
                    if self.event_sender.send(finished).await.is_err() {
                        info!("Engine event channel closed; button notifier stopping");
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Button notifier lagged; {} effects missed", missed);
                }
                Err(RecvError::Closed) => {
                    info!("Effect channel closed; button notifier stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Post one report, retrying up to the configured attempt count
    ///
    /// Returns whether the backend accepted the report.
    async fn post_report(
        &self,
        device_type: &str,
        addr: DeviceAddr,
        button: u8,
        pressed_at: Timestamp,
    ) -> bool {
        let url = match &self.endpoint {
            Some(url) => url.clone(),
            None => {
                debug!("No report endpoint configured; button press not forwarded");
                return false;
            }
        };

        let body = serde_json::json!({
            "device_type": device_type,
            "address": addr.to_string(),
            "button": button,
            "pressed_at": pressed_at.as_millis(),
        });

        for attempt in 1..=self.config.max_retries {
            match self.post_once(url.clone(), &body).await {
                Ok(()) => {
                    info!(
                        "Button report for {} button {} accepted on attempt {}",
                        addr, button, attempt
                    );
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Button report attempt {}/{} failed: {}",
                        attempt, self.config.max_retries, e
                    );
                }
            }
            if attempt < self.config.max_retries {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        warn!(
            "{}",
            NotifyError::AttemptsExhausted {
                attempts: self.config.max_retries,
            }
        );
        false
    }

    /// One POST to the backend
    async fn post_once(
        &self,
        url: reqwest::Url,
        body: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::RejectedStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
