// LCU websocket event stream -> ClientEvent

use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use native_tls::TlsConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;

use super::backend::LcuBackend;
use super::client::LcuClient;
use crate::error::{Result, ScoutError};
use crate::gameflow::{CancellationScope, ClientEvent, GamePhase, RetryPolicy, SessionSnapshot};

const PHASE_URI: &str = "/lol-gameflow/v1/gameflow-phase";
const SESSION_URI: &str = "/lol-champ-select/v1/session";
const LOCKFILE_CHECK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct LcuEvent {
  pub uri: String,
  pub event_type: String,
  pub data: serde_json::Value,
}

/// Parses a WAMP frame such as `[8, "OnJsonApiEvent", { uri, eventType, data }]`.
pub fn parse_lcu_ws_event(text: &str) -> Option<LcuEvent> {
  let value: serde_json::Value = serde_json::from_str(text).ok()?;
  let frame = value.as_array()?;
  if frame.len() < 3 {
    return None;
  }
  let payload = frame[2].as_object()?;
  Some(LcuEvent {
    uri: payload.get("uri")?.as_str()?.to_string(),
    event_type: payload
      .get("eventType")
      .and_then(|v| v.as_str())
      .unwrap_or("Update")
      .to_string(),
    data: payload.get("data").cloned().unwrap_or(serde_json::Value::Null),
  })
}

/// Maps the two endpoints the orchestrator listens to; everything else is dropped.
pub fn to_client_event(event: &LcuEvent) -> Option<ClientEvent> {
  match event.uri.as_str() {
    PHASE_URI => {
      let phase = event.data.as_str().map(GamePhase::parse).unwrap_or_default();
      Some(ClientEvent::Phase(phase))
    }
    SESSION_URI if event.event_type == "Delete" => Some(ClientEvent::Session(None)),
    SESSION_URI => match SessionSnapshot::from_value(&event.data) {
      Ok(session) => Some(ClientEvent::Session(Some(Arc::new(session)))),
      Err(err) => {
        tracing::warn!(target: "lcu::events", error = %err, "unreadable champ select session");
        None
      }
    },
    _ => None,
  }
}

enum StreamEnd {
  Stopped,
  Disconnected,
  LockfileGone,
}

/// Forwards LCU events to `sender` until `scope` is cancelled or the client
/// goes away (its lockfile disappears). Dropped connections are retried with
/// the policy's back-off.
pub async fn run_event_stream(
  client: Arc<LcuClient>,
  sender: mpsc::Sender<ClientEvent>,
  policy: RetryPolicy,
  scope: CancellationScope,
) -> Result<()> {
  let mut attempt: u32 = 0;
  loop {
    if scope.is_cancelled() {
      return Ok(());
    }

    match connect_and_forward(&client, &sender, &scope).await {
      Ok(StreamEnd::Stopped) => return Ok(()),
      Ok(StreamEnd::LockfileGone) => {
        tracing::info!(target: "lcu::events", "lockfile removed, client closed");
        return Err(ScoutError::LockfileNotFound(
          client.connection().lockfile.display().to_string(),
        ));
      }
      Ok(StreamEnd::Disconnected) => {
        tracing::info!(target: "lcu::events", "websocket closed");
        attempt = 0;
      }
      Err(err) => {
        tracing::warn!(target: "lcu::events", attempt, error = %err, "websocket error");
      }
    }

    if !client.connection().is_alive() {
      return Err(ScoutError::LockfileNotFound(
        client.connection().lockfile.display().to_string(),
      ));
    }
    let delay = policy.delay_for_attempt(attempt);
    attempt = attempt.saturating_add(1);
    tracing::debug!(target: "lcu::events", delay_ms = delay.as_millis() as u64, "reconnecting");
    if !scope.sleep(delay).await {
      return Ok(());
    }
  }
}

async fn connect_and_forward(
  client: &LcuClient,
  sender: &mpsc::Sender<ClientEvent>,
  scope: &CancellationScope,
) -> Result<StreamEnd> {
  let connection = client.connection();
  let ws_url = format!("wss://127.0.0.1:{}/", connection.port);

  let mut request = ws_url.as_str().into_client_request()?;
  let auth = HeaderValue::from_str(&connection.auth_header())
    .map_err(|e| ScoutError::Config(format!("invalid auth header: {}", e)))?;
  request.headers_mut().insert("Authorization", auth);
  request
    .headers_mut()
    .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("wamp"));

  let tls = TlsConnector::builder()
    .danger_accept_invalid_certs(true)
    .build()
    .map_err(|e| ScoutError::Backend(format!("TLS setup failed: {}", e)))?;

  tracing::info!(target: "lcu::events", url = %ws_url, "connecting to LCU websocket");
  let (mut socket, _response) =
    tokio_tungstenite::connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls)))
      .await?;
  socket
    .send(Message::Text("[5,\"OnJsonApiEvent\"]".into()))
    .await?;
  tracing::info!(target: "lcu::events", "subscribed to LCU events");

  // Events only fire on change, so seed the current phase and session.
  for event in bootstrap(client).await {
    if sender.send(event).await.is_err() {
      return Ok(StreamEnd::Stopped);
    }
  }

  let mut lockfile_check = tokio::time::interval(LOCKFILE_CHECK);
  loop {
    tokio::select! {
      _ = scope.cancelled() => {
        let _ = socket.close(None).await;
        return Ok(StreamEnd::Stopped);
      }
      _ = lockfile_check.tick() => {
        if !connection.is_alive() {
          return Ok(StreamEnd::LockfileGone);
        }
      }
      frame = socket.next() => {
        let text = match frame {
          None | Some(Ok(Message::Close(_))) => return Ok(StreamEnd::Disconnected),
          Some(Err(err)) => return Err(err.into()),
          Some(Ok(Message::Text(text))) => text,
          Some(Ok(_)) => continue,
        };
        let Some(event) = parse_lcu_ws_event(&text).as_ref().and_then(to_client_event) else {
          continue;
        };
        if sender.send(event).await.is_err() {
          return Ok(StreamEnd::Stopped);
        }
      }
    }
  }
}

async fn bootstrap(client: &LcuClient) -> Vec<ClientEvent> {
  let mut events = Vec::new();
  match client.gameflow_phase().await {
    Ok(phase) => {
      tracing::info!(target: "lcu::events", %phase, "initial phase");
      let in_champ_select = phase == GamePhase::ChampSelect;
      // The phase goes first so the session lands while champ select is pending.
      events.push(ClientEvent::Phase(phase));
      if in_champ_select {
        match client.champ_select_session().await {
          Ok(session) => events.push(ClientEvent::Session(session.map(Arc::new))),
          Err(err) => {
            tracing::debug!(target: "lcu::events", error = %err, "no initial session");
          }
        }
      }
    }
    Err(err) => tracing::warn!(target: "lcu::events", error = %err, "could not read initial phase"),
  }
  events
}
