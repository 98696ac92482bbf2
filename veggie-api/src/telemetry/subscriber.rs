//! MQTT telemetry subscriber
//!
//! # State Progression
//! DISCONNECTED → CONNECTING → SUBSCRIBED → (CONNECTING on connection loss)
//!
//! # Startup policy
//! [`TelemetrySubscriber::start`] waits for the broker to acknowledge the
//! first connection. If that fails or times out, `start` returns an error
//! and the service does not come up. Once started, connection losses are
//! retried in the background with exponential backoff; messages published
//! during the gap are lost.
//!
//! # Concurrency
//! The background task exclusively owns the MQTT event loop. Its only
//! effect on the rest of the service is [`TelemetryIngest::ingest`], which
//! writes the ambient cache.

use chrono::Utc;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use veggie_common::config::BrokerConfig;
use veggie_common::events::{EventBus, SubscriberState, VeggieEvent};

use super::ingest::{IngestOutcome, TelemetryIngest};

/// Request channel capacity between client handle and event loop
const CLIENT_CHANNEL_CAPACITY: usize = 10;

/// How long `stop` waits for a clean DISCONNECT before cancelling
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Subscriber errors (startup only; runtime failures are retried)
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("Failed to connect to MQTT broker {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("MQTT broker {addr} did not acknowledge connection within {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Failed to subscribe to topic '{topic}': {reason}")]
    Subscribe { topic: String, reason: String },
}

/// Publishes state transitions to watchers and the event bus
struct StateTracker {
    tx: watch::Sender<SubscriberState>,
    event_bus: EventBus,
}

impl StateTracker {
    fn transition(&self, new_state: SubscriberState) {
        let old_state = *self.tx.borrow();
        if old_state == new_state {
            return;
        }
        self.tx.send_replace(new_state);
        info!(from = old_state.as_str(), to = new_state.as_str(), "Telemetry subscriber state changed");
        self.event_bus.emit_lossy(VeggieEvent::SubscriberStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }
}

/// Exponential backoff step, capped at `max`
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Handle to the running telemetry subscription
pub struct TelemetrySubscriber {
    client: AsyncClient,
    state_rx: watch::Receiver<SubscriberState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetrySubscriber {
    /// Connect, subscribe and spawn the background ingestion task
    ///
    /// Returns an error (process-fatal) if the broker does not accept the
    /// initial connection within `config.connect_timeout`.
    pub async fn start(
        config: BrokerConfig,
        ingest: TelemetryIngest,
        event_bus: EventBus,
    ) -> Result<Self, SubscriberError> {
        let (state_tx, state_rx) = watch::channel(SubscriberState::Disconnected);
        let tracker = StateTracker {
            tx: state_tx,
            event_bus,
        };

        let addr = format!("{}:{}", config.host, config.port);
        info!(broker = %addr, topic = %config.topic, client_id = %config.client_id, "Connecting to MQTT broker");
        tracker.transition(SubscriberState::Connecting);

        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);

        match tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => info!(broker = %addr, "Connected to MQTT broker"),
            Ok(Err(e)) => {
                tracker.transition(SubscriberState::Disconnected);
                return Err(SubscriberError::Connect {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                tracker.transition(SubscriberState::Disconnected);
                return Err(SubscriberError::ConnectTimeout {
                    addr,
                    timeout: config.connect_timeout,
                });
            }
        }

        client
            .subscribe(config.topic.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|e| SubscriberError::Subscribe {
                topic: config.topic.clone(),
                reason: e.to_string(),
            })?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            config,
            ingest,
            tracker,
            cancel.clone(),
        ));

        Ok(Self {
            client,
            state_rx,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Current connection state
    pub fn state(&self) -> SubscriberState {
        *self.state_rx.borrow()
    }

    /// Receiver that tracks connection state changes
    pub fn state_watch(&self) -> watch::Receiver<SubscriberState> {
        self.state_rx.clone()
    }

    /// Disconnect and wait for the background task to finish
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let Some(mut task) = self.task.lock().await.take() else {
            return;
        };

        info!("Stopping telemetry subscriber");
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "Could not queue MQTT DISCONNECT");
        }

        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            debug!("Subscriber did not disconnect in time, cancelling");
            self.cancel.cancel();
            if let Err(e) = task.await {
                error!(error = %e, "Telemetry subscriber task failed");
            }
        }
    }
}

/// Poll until the broker acknowledges the connection
async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    config: BrokerConfig,
    ingest: TelemetryIngest,
    tracker: StateTracker,
    cancel: CancellationToken,
) {
    let mut backoff = config.reconnect_min;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Reconnected to MQTT broker, resubscribing");
                backoff = config.reconnect_min;
                // Clean sessions drop subscriptions, so resubscribe every time
                if let Err(e) = client.try_subscribe(config.topic.clone(), QoS::AtLeastOnce) {
                    warn!(error = %e, topic = %config.topic, "Failed to queue resubscribe");
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                tracker.transition(SubscriberState::Subscribed);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(topic = %publish.topic, bytes = publish.payload.len(), "Telemetry message received");
                if let IngestOutcome::Rejected(e) = ingest.ingest(&publish.payload) {
                    debug!(error = %e, "Telemetry message dropped");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("Disconnected from MQTT broker");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "MQTT connection lost");
                tracker.transition(SubscriberState::Connecting);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff, config.reconnect_max);
            }
        }
    }

    tracker.transition(SubscriberState::Disconnected);
}
