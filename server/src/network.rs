//! Relay network layer: UDP I/O, room membership and channel fan-out

use crate::client_manager::{Client, ClientManager};
use crate::rooms::RoomRegistry;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, encode_packet, game_channel, GameMessage, Packet, Player, PlayerId, RoomId,
    MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client: Client },
    Shutdown,
}

/// Messages sent from the relay loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    /// Send to every client subscribed to `channel`, the publisher included
    ChannelBroadcast { packet: Packet, channel: String },
}

/// Relay server forwarding game messages between the members of each room
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomRegistry,
    stats_interval: Duration,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
    ) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            rooms: RoomRegistry::new(),
            stats_interval: Duration::from_secs(30),
            tasks: Vec::new(),
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// A sender that can stop `run` from another task with `ServerMessage::Shutdown`
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_packet(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            warn!("Network sender already running");
            return;
        };

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::ChannelBroadcast { packet, channel } => {
                        let recipients = {
                            let clients_guard = clients.read().await;
                            clients_guard.subscribers(&channel)
                        };

                        for (player_id, addr) in recipients {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to deliver to player {}: {}", player_id, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        }));
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), BoxError> {
        let data = encode_packet(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_to_channel(&self, channel: String, message: GameMessage) {
        let packet = Packet::Deliver {
            channel: channel.clone(),
            message,
        };
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::ChannelBroadcast { packet, channel })
        {
            error!("Failed to queue channel broadcast: {}", e);
        }
    }

    /// Sends the current roster to every member of the room
    async fn announce_room(&self, room_id: RoomId) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };

        let addrs: Vec<SocketAddr> = {
            let clients = self.clients.read().await;
            room.players
                .iter()
                .filter_map(|p| clients.get(p.id).map(|c| c.addr))
                .collect()
        };

        for addr in addrs {
            self.send_packet(Packet::RoomJoined { room: room.clone() }, addr);
        }
    }

    /// Takes a departed player out of its room and tells the remaining members
    async fn depart(&mut self, player: Player, room: Option<RoomId>) {
        let Some(room_id) = room else {
            return;
        };
        if self.rooms.leave(room_id, player.id).is_none() {
            return;
        }

        self.broadcast_to_channel(
            game_channel(room_id),
            GameMessage::LeaveGame {
                player,
                room: room_id,
            },
        );
        self.announce_room(room_id).await;
    }

    async fn handle_connect(&mut self, client_version: u32, name: String, addr: SocketAddr) {
        info!(
            "Client {} connecting from {} (version: {})",
            name, addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {}: protocol version {} (expected {})",
                addr, client_version, PROTOCOL_VERSION
            );
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing = {
            let mut clients = self.clients.write().await;
            clients
                .find_client_by_addr(addr)
                .and_then(|id| clients.remove_client(&id))
        };
        if let Some(client) = existing {
            info!("Replacing existing session of {}", client.player);
            self.depart(client.player, client.room).await;
        }

        let player = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr, &name)
        };

        let response = match player {
            Some(player) => Packet::Connected { player },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    async fn handle_join(&mut self, player_id: PlayerId, room_id: RoomId) {
        let (player, previous) = {
            let mut clients = self.clients.write().await;
            let Some(player) = clients.get(player_id).map(|c| c.player.clone()) else {
                return;
            };
            let previous = clients.set_room(player_id, Some(room_id));
            (player, previous)
        };

        if let Some(previous) = previous.filter(|r| *r != room_id) {
            self.clients
                .write()
                .await
                .unsubscribe(player_id, &game_channel(previous));
            self.depart(player.clone(), Some(previous)).await;
        }

        self.rooms.join(room_id, player);
        self.announce_room(room_id).await;
    }

    async fn handle_publish(&mut self, player_id: PlayerId, channel: String, message: GameMessage) {
        let (subscribed, player, room) = {
            let clients = self.clients.read().await;
            match clients.get(player_id) {
                Some(client) => (
                    client.is_subscribed(&channel),
                    client.player.clone(),
                    client.room,
                ),
                None => return,
            }
        };

        if !subscribed {
            warn!(
                "Dropping {} from {}: not subscribed to {}",
                message.command(),
                player,
                channel
            );
            return;
        }

        debug!("{} on {} from {}", message.command(), channel, player);

        let leaving = match &message {
            GameMessage::LeaveGame { room, .. } => Some(*room),
            _ => None,
        };
        if let Some(left) = leaving {
            if room == Some(left) {
                self.rooms.leave(left, player_id);
                let mut clients = self.clients.write().await;
                clients.set_room(player_id, None);
                clients.unsubscribe(player_id, &channel);
            }
            // The leaver is unsubscribed, so it gets no echo of its own LEAVE_GAME.
            self.broadcast_to_channel(channel, message);
            if let Some(room_id) = room {
                self.announce_room(room_id).await;
            }
            return;
        }

        self.broadcast_to_channel(channel, message);
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
        } = packet
        {
            self.handle_connect(client_version, name, addr).await;
            return;
        }

        let player_id = {
            let mut clients = self.clients.write().await;
            clients.touch_addr(addr)
        };
        let Some(player_id) = player_id else {
            debug!("Ignoring packet from unknown address {}", addr);
            return;
        };

        match packet {
            Packet::JoinRoom { room } => self.handle_join(player_id, room).await,

            Packet::Subscribe { channel } => {
                debug!("Player {} subscribed to {}", player_id, channel);
                self.clients.write().await.subscribe(player_id, &channel);
            }

            Packet::Publish { channel, message } => {
                self.handle_publish(player_id, channel, message).await
            }

            Packet::Disconnect => {
                let removed = self.clients.write().await.remove_client(&player_id);
                if let Some(client) = removed {
                    self.depart(client.player, client.room).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn log_stats(&self, clients: usize) {
        if clients > 0 {
            debug!("{} clients in {} rooms", clients, self.rooms.len());
        }
    }

    /// Main relay loop. Returns after a `ServerMessage::Shutdown`.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut stats_interval = interval(self.stats_interval);

        info!("Relay started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client }) => {
                            warn!("Player {} timed out", client.player);
                            self.depart(client.player, client.room).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Relay shutting down");
                            break;
                        }
                    }
                },

                _ = stats_interval.tick() => {
                    let clients = self.clients.read().await.len();
                    self.log_stats(clients);
                },
            }
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }
}
