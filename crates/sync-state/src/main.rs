//! Sync client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_URL=wss://gateway.example.com/?v=9 SYNC_TOKEN=... cargo run -p sync-state
//! ```
//!
//! Connects, then logs every gateway event until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use sync_cache::EventBus;
use sync_common::{try_init_tracing_with_config, SyncConfig, TracingConfig};
use sync_core::CredentialProvider;
use sync_gateway::{GatewayConnection, GatewayEvent, WsTransport};
use sync_state::ConversationRegistry;
use tracing::{error, info};

/// Token taken from the configuration, forgotten once rejected
struct ConfiguredToken(Mutex<Option<String>>);

#[async_trait]
impl CredentialProvider for ConfiguredToken {
    async fn token(&self) -> Option<String> {
        self.0.lock().clone()
    }

    async fn discard(&self) {
        self.0.lock().take();
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Sync client stopped");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = SyncConfig::from_env().context("loading configuration")?;
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_config(&config)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        url = %config.gateway.url,
        retries = config.gateway.connect_retries,
        "Configuration loaded"
    );

    let bus = EventBus::<GatewayEvent>::new_shared();
    let registry = ConversationRegistry::new_shared();
    let (_, mut events) = bus.channel();

    let connection = GatewayConnection::new_shared(
        config.gateway.clone(),
        Arc::new(WsTransport::new()),
        Arc::new(ConfiguredToken(Mutex::new(config.token.clone()))),
        bus,
    );

    let ready = connection.connect().await.context("connecting to gateway")?;
    registry.load_ready(&ready);
    info!(
        user = %ready.user.tag(),
        session_id = %ready.session_id,
        rooms = registry.rooms().len(),
        "Connected"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    GatewayEvent::ConnectionClosed(reason) => {
                        info!(reason = %reason, reconnect = reason.should_reconnect(), "Connection closed");
                        break;
                    }
                    GatewayEvent::MessageCreated(created) => {
                        registry.observe_message(created);
                        info!(
                            conversation_id = %created.message.channel_id,
                            author = %created.message.author.display_name(),
                            mentions = registry.total_mentions(),
                            "Message"
                        );
                    }
                    other => info!(event = other.name(), "Event"),
                }
            }
        }
    }

    connection.close().await;
    Ok(())
}
