use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use intranet_chat::AuthSession;
use intranet_types::events::{GatewayCommand, PushEvent};

use crate::rest::with_trailing_slash;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no access token")]
    Unauthenticated,

    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("encoding command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Default gateway address for an API base URL: same host, `ws`/`wss`
/// scheme, `/gateway` path.
pub fn gateway_url(api: &Url) -> Result<Url, url::ParseError> {
    let mut url = with_trailing_slash(api.clone()).join("gateway")?;
    let scheme = if api.scheme() == "https" { "wss" } else { "ws" };
    // http(s) -> ws(s) stays within the special schemes, which `set_scheme` allows.
    let _ = url.set_scheme(scheme);
    Ok(url)
}

/// Realtime listener. Identifies with the session token, subscribes to a
/// set of channels and forwards every [`PushEvent`] into an mpsc channel,
/// reconnecting with exponential backoff until the receiver is dropped.
pub struct PushGateway {
    url: Url,
    auth: Arc<dyn AuthSession>,
    channel_ids: Vec<Uuid>,
}

enum SessionEnd {
    Closed,
    ReceiverGone,
}

impl PushGateway {
    pub fn new(url: Url, auth: Arc<dyn AuthSession>, channel_ids: Vec<Uuid>) -> Self {
        Self {
            url,
            auth,
            channel_ids,
        }
    }

    /// Run on its own task and hand back the event receiver.
    pub fn spawn(self, buffer: usize) -> mpsc::Receiver<PushEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(self.run(tx));
        rx
    }

    pub async fn run(self, events: mpsc::Sender<PushEvent>) {
        let mut backoff = Backoff::default();
        loop {
            match self.session(&events, &mut backoff).await {
                Ok(SessionEnd::ReceiverGone) => return,
                Ok(SessionEnd::Closed) => info!("Gateway connection closed"),
                Err(GatewayError::Unauthenticated) => {
                    warn!("No access token, push gateway stopped");
                    return;
                }
                Err(e) => warn!("Gateway connection failed: {}", e),
            }
            if events.is_closed() {
                return;
            }
            let delay = backoff.next_delay();
            debug!(?delay, "Reconnecting to gateway");
            tokio::time::sleep(delay).await;
        }
    }

    async fn session(
        &self,
        events: &mpsc::Sender<PushEvent>,
        backoff: &mut Backoff,
    ) -> Result<SessionEnd, GatewayError> {
        let token = self.auth.access_token().ok_or(GatewayError::Unauthenticated)?;
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut tx, mut rx) = ws.split();

        send_command(&mut tx, &GatewayCommand::Identify { token }).await?;
        send_command(
            &mut tx,
            &GatewayCommand::Subscribe {
                channel_ids: self.channel_ids.clone(),
            },
        )
        .await?;
        debug!(url = %self.url, channels = self.channel_ids.len(), "Gateway connected");

        while let Some(frame) = rx.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(reason) => {
                    debug!(?reason, "Gateway sent close");
                    return Ok(SessionEnd::Closed);
                }
                _ => continue,
            };
            let Some(event) = decode_event(text.as_str()) else {
                continue;
            };
            if matches!(event, PushEvent::Ready { .. }) {
                backoff.reset();
            }
            if events.send(event).await.is_err() {
                return Ok(SessionEnd::ReceiverGone);
            }
        }
        Ok(SessionEnd::Closed)
    }
}

async fn send_command(tx: &mut WsSink, command: &GatewayCommand) -> Result<(), GatewayError> {
    let json = serde_json::to_string(command)?;
    tx.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Frames that are not a known event are skipped.
fn decode_event(text: &str) -> Option<PushEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Ignoring gateway frame: {}", e);
            None
        }
    }
}

/// Reconnect delays: 1 s doubling up to 30 s, back to 1 s after a
/// successful identify.
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            next: INITIAL_BACKOFF,
        }
    }
}

impl Backoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.next = INITIAL_BACKOFF;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::default();
        let secs: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn gateway_url_follows_api_scheme() {
        let api: Url = "http://127.0.0.1:3000".parse().unwrap();
        assert_eq!(gateway_url(&api).unwrap().as_str(), "ws://127.0.0.1:3000/gateway");

        let api: Url = "https://chat.corp.example/api".parse().unwrap();
        assert_eq!(
            gateway_url(&api).unwrap().as_str(),
            "wss://chat.corp.example/api/gateway"
        );
    }

    #[test]
    fn decodes_known_events_only() {
        let channel_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        let frame = format!(
            r#"{{"type":"MessageDelete","data":{{"channel_id":"{channel_id}","message_id":"{message_id}"}}}}"#
        );
        match decode_event(&frame) {
            Some(PushEvent::MessageDelete {
                channel_id: c,
                message_id: m,
            }) => {
                assert_eq!(c, channel_id);
                assert_eq!(m, message_id);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(decode_event(r#"{"type":"PresenceUpdate","data":{}}"#).is_none());
        assert!(decode_event("not json").is_none());
    }
}
