//! WebSocket event source.
//!
//! Consumes the backend's push channel and feeds the tracker's event intake.
//! Reconnection follows the bounded [`ReconnectPolicy`]; when the budget is
//! exhausted the tracker is told so the user sees a connectivity error
//! instead of a stuck spinner. An optional poll interval drives the same
//! status-refresh operation the reconnect path uses, so polling is a
//! fallback, not a second code path.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::domain::TxStatus;
use crate::recovery::ReconnectPolicy;
use crate::tracker::Tracker;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push messages on the wire, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    AuthResult {
        success: bool,
        #[serde(default)]
        context: Option<String>,
    },
    TransactionCreated {
        id: String,
        amount: i64,
        status: TxStatus,
    },
    TransactionTransition {
        id: String,
        status: TxStatus,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Timeout {
        id: String,
        message: String,
    },
    Error {
        message: String,
    },
}

enum Flow {
    Continue,
    Closed(String),
}

pub struct EventSourceClient {
    url: String,
    policy: ReconnectPolicy,
    poll_interval: Option<Duration>,
}

impl EventSourceClient {
    pub fn new(url: String, policy: ReconnectPolicy, poll_interval: Option<Duration>) -> Self {
        Self {
            url,
            policy,
            poll_interval,
        }
    }

    /// Runs until the reconnect budget is exhausted. Each established
    /// connection triggers `on_connect` (and with it reconciliation) before
    /// any pushed event is trusted.
    pub async fn run(&self, tracker: &mut Tracker) {
        let mut failed_attempts: u32 = 0;

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((mut stream, _)) => {
                    failed_attempts = 0;
                    info!(url = %self.url, "connected to event source");
                    tracker.on_connect().await;

                    let reason = self.read_frames(&mut stream, tracker).await;
                    tracker.on_disconnect(&reason);
                }
                Err(err) => {
                    warn!(url = %self.url, "event source connect failed: {}", err);
                }
            }

            failed_attempts += 1;
            match self.policy.delay_for(failed_attempts) {
                Some(delay) => {
                    debug!(attempt = failed_attempts, ?delay, "scheduling reconnect");
                    sleep(delay).await;
                }
                None => {
                    tracker.on_reconnect_exhausted("unable to reach the event source");
                    return;
                }
            }
        }
    }

    async fn read_frames(&self, stream: &mut WsStream, tracker: &mut Tracker) -> String {
        let mut poll = self
            .poll_interval
            .map(|every| interval_at(Instant::now() + every, every));

        loop {
            let flow = match poll.as_mut() {
                Some(ticker) => {
                    tokio::select! {
                        _ = ticker.tick() => {
                            tracker.refresh_status().await;
                            Flow::Continue
                        }
                        frame = stream.next() => dispatch_frame(tracker, frame),
                    }
                }
                None => dispatch_frame(tracker, stream.next().await),
            };

            if let Flow::Closed(reason) = flow {
                return reason;
            }
        }
    }
}

fn dispatch_frame(
    tracker: &mut Tracker,
    frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> Flow {
    match frame {
        Some(Ok(Message::Text(text))) => {
            dispatch_event(tracker, &text);
            Flow::Continue
        }
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
            trace!("heartbeat frame");
            Flow::Continue
        }
        Some(Ok(Message::Close(_))) => Flow::Closed("server closed the connection".to_string()),
        Some(Ok(_)) => Flow::Continue,
        Some(Err(err)) => Flow::Closed(err.to_string()),
        None => Flow::Closed("stream ended".to_string()),
    }
}

fn dispatch_event(tracker: &mut Tracker, text: &str) {
    match serde_json::from_str::<WireEvent>(text) {
        Ok(WireEvent::AuthResult { success, context }) => {
            tracker.on_auth_result(success, context.as_deref().unwrap_or(""));
        }
        Ok(WireEvent::TransactionCreated { id, amount, status }) => {
            tracker.on_transaction_created(&id, amount, status);
        }
        Ok(WireEvent::TransactionTransition {
            id,
            status,
            payload,
        }) => {
            tracker.on_transaction_transition(&id, status, payload);
        }
        Ok(WireEvent::Timeout { id, message }) => {
            tracker.on_timeout(&id, &message);
        }
        Ok(WireEvent::Error { message }) => {
            tracker.on_error(&message);
        }
        Err(err) => {
            // Malformed frames are a protocol anomaly: logged, never fatal.
            warn!("skipping malformed event frame: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_transition_event() {
        let frame = r#"{"type":"transaction_transition","id":"T1","status":"in_progress","payload":{"cashier":"agent-2"}}"#;
        let event: WireEvent = serde_json::from_str(frame).expect("valid frame");

        match event {
            WireEvent::TransactionTransition {
                id,
                status,
                payload,
            } => {
                assert_eq!(id, "T1");
                assert_eq!(status, TxStatus::InProgress);
                assert_eq!(payload["cashier"], "agent-2");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decodes_created_event_without_payload() {
        let frame = r#"{"type":"transaction_created","id":"T1","amount":5000,"status":"pending"}"#;
        let event: WireEvent = serde_json::from_str(frame).expect("valid frame");

        assert!(matches!(
            event,
            WireEvent::TransactionCreated { ref id, amount: 5000, status: TxStatus::Pending } if id == "T1"
        ));
    }

    #[test]
    fn decodes_timeout_and_error_events() {
        let timeout: WireEvent = serde_json::from_str(
            r#"{"type":"timeout","id":"T1","message":"no activity for 15 minutes"}"#,
        )
        .expect("valid frame");
        assert!(matches!(timeout, WireEvent::Timeout { .. }));

        let error: WireEvent =
            serde_json::from_str(r#"{"type":"error","message":"shutting down"}"#)
                .expect("valid frame");
        assert!(matches!(error, WireEvent::Error { .. }));
    }

    #[test]
    fn rejects_unknown_event_types() {
        let frame = r#"{"type":"balance_update","amount":100}"#;
        assert!(serde_json::from_str::<WireEvent>(frame).is_err());
    }
}
