use std::sync::Arc;

use kanal::{AsyncReceiver, AsyncSender};
use manatan_io::HostBridge;
use manatan_types::{AppEvent, RenderMessage};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::events::event_loop;
use crate::state::AppState;

/// Centralized channel management
pub struct ChannelSet {
    pub events: (AsyncSender<AppEvent>, AsyncReceiver<AppEvent>),
    /// Unbounded so the event loop never waits on a slow page
    pub renders: (AsyncSender<RenderMessage>, AsyncReceiver<RenderMessage>),
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            events: kanal::bounded_async(256), // host events and task results
            renders: kanal::unbounded_async(),
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Application controller for task spawning and lifecycle
pub struct AppController {
    channels: ChannelSet,
    state: Arc<AppState>,
    cancel_token: CancellationToken,
}

impl AppController {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            channels: ChannelSet::new(),
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn spawn_tasks(&self, bridge: HostBridge) -> JoinSet<anyhow::Result<()>> {
        let mut tasks = JoinSet::new();

        // Event loop
        tasks.spawn(event_loop(
            self.state.clone(),
            self.channels.events.1.clone(),
            self.channels.events.0.clone(),
            self.channels.renders.0.clone(),
            self.cancel_token.child_token(),
        ));

        // Host bridge
        let events_tx = self.channels.events.0.clone();
        let renders_rx = self.channels.renders.1.clone();
        let cancel = self.cancel_token.child_token();
        tasks.spawn(async move {
            tokio::select! {
                result = bridge.run(events_tx, renders_rx) => result.map_err(Into::into),
                _ = cancel.cancelled() => {
                    tracing::info!("Host bridge stopping");
                    Ok(())
                }
            }
        });

        tasks
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
