use crate::shared_data::ControllerSnapshot;
use amiquip::{Channel, Connection, Exchange, Publish, QueueDeclareOptions, Result as AmiquipResult};
use log::warn;

/// Publishes snapshots as JSON to a RabbitMQ queue for remote dashboards.
/// Blocking; run it from a blocking task.
pub struct SnapshotPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl SnapshotPublisher {
    pub fn connect(url: &str, queue: &str) -> AmiquipResult<Self> {
        let mut connection = Connection::insecure_open(url)?;
        let channel = connection.open_channel(None)?;
        channel.queue_declare(queue, QueueDeclareOptions::default())?;
        Ok(Self {
            connection,
            channel,
            queue: queue.to_string(),
        })
    }

    pub fn publish(&self, snapshot: &ControllerSnapshot) -> AmiquipResult<()> {
        let Some(payload) = snapshot_payload(snapshot) else {
            warn!("Snapshot could not be serialized, skipped");
            return Ok(());
        };
        let exchange = Exchange::direct(&self.channel);
        exchange.publish(Publish::new(payload.as_bytes(), self.queue.as_str()))
    }

    pub fn close(self) -> AmiquipResult<()> {
        self.connection.close()
    }
}

pub fn snapshot_payload(snapshot: &ControllerSnapshot) -> Option<String> {
    serde_json::to_string(snapshot).ok()
}
