//! Outbound publish capability

use log::warn;
use parking_lot::Mutex;
use shared::{GameMessage, Packet};
use tokio::sync::mpsc;

/// Fire-and-forget delivery of a game message to a channel
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: &str, message: GameMessage);
}

/// Publishes nowhere. Used by controllers that only display.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _channel: &str, _message: GameMessage) {}
}

/// Queues `Packet::Publish` datagrams for the network runtime to send
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Packet>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::UnboundedSender<Packet>) -> Self {
        Self { tx }
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, channel: &str, message: GameMessage) {
        let command = message.command();
        let packet = Packet::Publish {
            channel: channel.to_string(),
            message,
        };
        if self.tx.send(packet).is_err() {
            warn!("Dropping {}: network runtime has stopped", command);
        }
    }
}

/// Keeps every published message in order
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<(String, GameMessage)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything published so far
    pub fn take(&self) -> Vec<(String, GameMessage)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, channel: &str, message: GameMessage) {
        self.sent.lock().push((channel.to_string(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Command, Player};

    #[test]
    fn test_channel_publisher_wraps_message() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let publisher = ChannelPublisher::new(tx);

        publisher.publish(
            "Game4",
            GameMessage::GameKeepAlive {
                player: Player::new(1, "ada"),
            },
        );

        match rx.try_recv().unwrap() {
            Packet::Publish { channel, message } => {
                assert_eq!(channel, "Game4");
                assert_eq!(message.command(), Command::GameKeepAlive);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_channel_publisher_survives_closed_runtime() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelPublisher::new(tx).publish(
            "Game1",
            GameMessage::GameKeepAlive {
                player: Player::new(1, "ada"),
            },
        );
    }

    #[test]
    fn test_recording_publisher_take_drains() {
        let publisher = RecordingPublisher::new();
        let player = Player::new(2, "grace");
        publisher.publish("Game1", GameMessage::SwitchOpponent { player });

        assert_eq!(publisher.len(), 1);
        assert_eq!(publisher.take().len(), 1);
        assert!(publisher.is_empty());
    }
}
