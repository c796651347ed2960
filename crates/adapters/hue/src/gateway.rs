//! [`DeviceGateway`] over the Hue bridge.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use reqwest::Response;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;

use circadia_app::ports::{DeviceGateway, EventStream};
use circadia_domain::error::CircadiaError;
use circadia_domain::id::{LightId, SceneId};
use circadia_domain::light::{Light, LightState, Scene};
use circadia_domain::schedule::Schedule;

use crate::client::HueClient;
use crate::config::HueConfig;
use crate::discovery::{Inventory, map_lights, map_scenes};
use crate::error::HueError;
use crate::resources::{LightUpdate, SceneResource, SceneUpdate};
use crate::sse::SseDecoder;

const EVENT_BUFFER: usize = 64;

/// Bridge-backed device gateway.
pub struct HueGateway {
    client: Arc<HueClient>,
    scene_prefix: String,
    reconnect_delay: Duration,
}

impl HueGateway {
    /// # Errors
    ///
    /// Returns [`HueError`] when the HTTP client cannot be built.
    pub fn new(config: &HueConfig) -> Result<Self, HueError> {
        Ok(Self {
            client: Arc::new(HueClient::new(config)?),
            scene_prefix: config.scene_prefix.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        })
    }

    async fn inventory(&self) -> Result<Inventory, HueError> {
        Ok(Inventory {
            rooms: self.client.get("/clip/v2/resource/room").await?,
            zones: self.client.get("/clip/v2/resource/zone").await?,
            devices: self.client.get("/clip/v2/resource/device").await?,
            lights: self.client.get("/clip/v2/resource/light").await?,
        })
    }
}

impl DeviceGateway for HueGateway {
    async fn discover_lights(&self, schedules: &[Schedule]) -> Result<Vec<Light>, CircadiaError> {
        let inventory = self.inventory().await?;
        Ok(map_lights(&inventory, schedules))
    }

    async fn discover_scenes(&self, schedules: &[Schedule]) -> Result<Vec<Scene>, CircadiaError> {
        let scenes: Vec<SceneResource> = self.client.get("/clip/v2/resource/scene").await?;
        Ok(map_scenes(&scenes, schedules, &self.scene_prefix))
    }

    async fn update_light_state(&self, id: &LightId, state: LightState) -> Result<(), CircadiaError> {
        let path = format!("/clip/v2/resource/light/{id}");
        match self.client.put(&path, &LightUpdate::from(state)).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_unreachable() => Err(CircadiaError::Unreachable(id.to_string())),
            Err(err) => Err(err.into_domain()),
        }
    }

    async fn update_scene_state(&self, id: &SceneId, state: LightState) -> Result<(), CircadiaError> {
        let path = format!("/clip/v2/resource/scene/{id}");
        let mut scene: SceneResource = self.client.get_one("scene", &path).await?;
        scene.apply(state);
        self.client
            .put(
                &path,
                &SceneUpdate {
                    actions: &scene.actions,
                },
            )
            .await?;
        Ok(())
    }

    fn subscribe_to_events(&self) -> impl Future<Output = Result<EventStream, CircadiaError>> + Send {
        let client = Arc::clone(&self.client);
        let reconnect_delay = self.reconnect_delay;
        async move {
            let response = client.open_event_stream().await?;
            tracing::info!("listening to bridge events");
            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let task = tokio::spawn(pump(client, response, tx, reconnect_delay));
            let stream: EventStream = Box::pin(Subscription {
                inner: ReceiverStream::new(rx),
                task,
            });
            Ok(stream)
        }
    }
}

/// Forward decoded events to `tx`, reconnecting after `delay` whenever the
/// stream drops. Stops once the receiver is gone.
async fn pump(
    client: Arc<HueClient>,
    response: Response,
    tx: mpsc::Sender<String>,
    delay: Duration,
) {
    let mut next = Some(response);
    loop {
        let mut response = match next.take() {
            Some(response) => response,
            None => match client.open_event_stream().await {
                Ok(response) => {
                    tracing::info!("event stream reconnected");
                    response
                }
                Err(err) => {
                    tracing::warn!(%err, "event stream reconnect failed");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            },
        };

        let mut decoder = SseDecoder::default();
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    for payload in decoder.push(&bytes) {
                        if tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => {
                    tracing::warn!("event stream closed by bridge");
                    break;
                }
                Err(err) => {
                    tracing::warn!(%err, "event stream failed");
                    break;
                }
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

/// Event stream that stops the background reader when dropped.
struct Subscription {
    inner: ReceiverStream<String>,
    task: JoinHandle<()>,
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!("unsubscribing from bridge events");
        self.task.abort();
    }
}
