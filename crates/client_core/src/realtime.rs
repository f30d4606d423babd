use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use shared::{
    domain::UserId,
    error::ApiError,
    protocol::{ClientRequest, LoginRequest, LoginResponse, PointsSnapshot, ServerEvent},
};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

use crate::{ClientEvent, PointCommands};

const EVENT_BUFFER: usize = 64;

pub struct RealtimeClient {
    http: Client,
    server_url: String,
    inner: Mutex<RealtimeClientState>,
    events: broadcast::Sender<ClientEvent>,
}

#[derive(Default)]
struct RealtimeClientState {
    user_id: Option<UserId>,
    outbound: Option<mpsc::UnboundedSender<ClientRequest>>,
}

impl RealtimeClient {
    pub fn new(server_url: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Arc::new(Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            inner: Mutex::new(RealtimeClientState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn login(&self, username: &str) -> Result<UserId> {
        let response = self
            .http
            .post(format!("{}/login", self.server_url))
            .json(&LoginRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.server_url))?;
        let body: LoginResponse = api_json(response).await?;
        let user_id = UserId(body.user_id);
        self.inner.lock().await.user_id = Some(user_id);
        info!(user_id = user_id.0, "logged in");
        Ok(user_id)
    }

    pub async fn user_id(&self) -> Result<UserId> {
        self.inner
            .lock()
            .await
            .user_id
            .ok_or_else(|| anyhow!("not logged in"))
    }

    pub async fn fetch_snapshot(&self) -> Result<PointsSnapshot> {
        let user_id = self.user_id().await?;
        let response = self
            .http
            .get(format!("{}/points", self.server_url))
            .query(&[("user_id", user_id.0)])
            .send()
            .await?;
        api_json(response).await
    }

    /// Opens the websocket and starts forwarding events to subscribers.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let user_id = self.user_id().await?;
        let ws_url = ws_url(&self.server_url, user_id)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientRequest>();
        self.inner.lock().await.outbound = Some(outbound);

        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(request) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    let _ = client
                        .events
                        .send(ClientEvent::Error(format!("websocket send failed: {err}")));
                    break;
                }
            }
        });

        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = client.events.send(ClientEvent::Server(event));
                        }
                        Err(err) => {
                            let _ = client
                                .events
                                .send(ClientEvent::Error(format!("invalid server event: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = client.events.send(ClientEvent::Error(format!(
                            "websocket receive failed: {err}"
                        )));
                        break;
                    }
                }
            }
            client.inner.lock().await.outbound = None;
            warn!("websocket closed");
            let _ = client.events.send(ClientEvent::Disconnected);
        });

        info!(user_id = user_id.0, "websocket connected");
        Ok(())
    }
}

#[async_trait]
impl PointCommands for RealtimeClient {
    async fn send_request(&self, request: ClientRequest) -> Result<()> {
        let guard = self.inner.lock().await;
        let outbound = guard
            .outbound
            .as_ref()
            .ok_or_else(|| anyhow!("websocket is not connected"))?;
        outbound
            .send(request)
            .map_err(|_| anyhow!("websocket is not connected"))
    }
}

pub(crate) fn ws_url(server_url: &str, user_id: UserId) -> Result<Url> {
    let mut url = Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(anyhow!("server_url must start with http:// or https://")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive websocket url from {server_url}"))?;
    url.set_path("/ws");
    url.query_pairs_mut()
        .clear()
        .append_pair("user_id", &user_id.0.to_string());
    Ok(url)
}

async fn api_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    match response.json::<ApiError>().await {
        Ok(err) => Err(anyhow!("{status}: {:?}: {}", err.code, err.message)),
        Err(_) => Err(anyhow!("request failed with status {status}")),
    }
}
