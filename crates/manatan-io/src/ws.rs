//! WebSocket link to the script injected into the reader page.
//!
//! One host page is served at a time. Render messages produced while no page
//! is connected are dropped; the page gets a full frame after it connects.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use kanal::{AsyncReceiver, AsyncSender};
use manatan_types::{AppEvent, HostMessage, RenderMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("App channel closed")]
    ChannelClosed,
}

pub fn decode_host(text: &str) -> Result<HostMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_render(message: &RenderMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

pub struct HostBridge {
    listener: TcpListener,
}

impl HostBridge {
    pub async fn bind(addr: &str) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Host bridge listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve host pages until one of the app channels closes.
    pub async fn run(
        self,
        events: AsyncSender<AppEvent>,
        renders: AsyncReceiver<RenderMessage>,
    ) -> Result<(), BridgeError> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::info!("Host page connected from {peer}");

                    if let Err(e) = serve_page(stream, &events, &renders).await {
                        if matches!(e, BridgeError::ChannelClosed) {
                            return Err(e);
                        }
                        tracing::warn!("Host connection from {peer} failed: {e}");
                    }

                    events
                        .send(AppEvent::BridgeDisconnected)
                        .await
                        .map_err(|_| BridgeError::ChannelClosed)?;
                    tracing::info!("Host page {peer} disconnected");
                }
                render = renders.recv() => {
                    let render = render.map_err(|_| BridgeError::ChannelClosed)?;
                    tracing::trace!("No host page connected, dropping {render:?}");
                }
            }
        }
    }
}

async fn serve_page(
    stream: TcpStream,
    events: &AsyncSender<AppEvent>,
    renders: &AsyncReceiver<RenderMessage>,
) -> Result<(), BridgeError> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    events
        .send(AppEvent::BridgeConnected)
        .await
        .map_err(|_| BridgeError::ChannelClosed)?;

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => match decode_host(text.as_str()) {
                    Ok(message) => events
                        .send(AppEvent::Host(message))
                        .await
                        .map_err(|_| BridgeError::ChannelClosed)?,
                    Err(e) => tracing::warn!("Ignoring malformed host message: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            render = renders.recv() => {
                let render = render.map_err(|_| BridgeError::ChannelClosed)?;
                write.send(Message::text(encode_render(&render)?)).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use manatan_types::ElementId;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    use super::*;

    async fn next_event(rx: &AsyncReceiver<AppEvent>) -> AppEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[test]
    fn decodes_host_messages() {
        let message = decode_host(r#"{"type":"retry","image":4}"#).unwrap();
        assert_eq!(message, HostMessage::Retry { image: ElementId(4) });
        assert!(decode_host(r#"{"type":"nope"}"#).is_err());
    }

    #[tokio::test]
    async fn relays_both_directions() {
        let bridge = HostBridge::bind("127.0.0.1:0").await.unwrap();
        let addr = bridge.local_addr().unwrap();

        let (events_tx, events_rx) = kanal::unbounded_async();
        let (renders_tx, renders_rx) = kanal::unbounded_async();
        tokio::spawn(bridge.run(events_tx, renders_rx));

        let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        assert!(matches!(next_event(&events_rx).await, AppEvent::BridgeConnected));

        client
            .send(Message::text(r#"{"type":"scroll"}"#))
            .await
            .unwrap();
        client.send(Message::text("garbage")).await.unwrap();
        client
            .send(Message::text(r#"{"type":"resize"}"#))
            .await
            .unwrap();

        assert!(matches!(next_event(&events_rx).await, AppEvent::Host(HostMessage::Scroll)));
        assert!(matches!(next_event(&events_rx).await, AppEvent::Host(HostMessage::Resize)));

        renders_tx
            .send(RenderMessage::Observe { image: ElementId(9) })
            .await
            .unwrap();
        let reply = timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reply.to_text().unwrap(), r#"{"type":"observe","image":9}"#);

        client.close(None).await.unwrap();
        assert!(matches!(next_event(&events_rx).await, AppEvent::BridgeDisconnected));
    }
}
