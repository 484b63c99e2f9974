use color_eyre::Result;
use crowd_schema::{decode_snapshot_json, EntityPayload};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, trace, warn};
use tungstenite::Message;

#[derive(Debug)]
pub enum SubscriptionEvent {
    Snapshot(Vec<EntityPayload>),
    Lost,
}

/// Streams snapshots until the socket closes or the console stops listening.
pub async fn run_subscription(url: String, sender: UnboundedSender<SubscriptionEvent>) -> Result<()> {
    tokio::task::spawn_blocking(move || pump_snapshots(&url, &sender)).await?
}

fn pump_snapshots(url: &str, sender: &UnboundedSender<SubscriptionEvent>) -> Result<()> {
    let (mut socket, _response) = tungstenite::connect(url)?;
    info!(url, "subscription.connected");
    loop {
        let entities = match socket.read()? {
            Message::Text(text) => decode_snapshot_json(&text),
            Message::Binary(bytes) => serde_json::from_slice::<Vec<EntityPayload>>(&bytes),
            Message::Close(_) => break,
            _ => continue,
        };
        match entities {
            Ok(entities) => {
                trace!(count = entities.len(), "snapshot.received");
                if sender.send(SubscriptionEvent::Snapshot(entities)).is_err() {
                    break;
                }
            }
            // A malformed push is skipped; the next one replaces it anyway.
            Err(err) => warn!(error = %err, "snapshot.malformed"),
        }
    }
    let _ = socket.close(None);
    Ok(())
}
