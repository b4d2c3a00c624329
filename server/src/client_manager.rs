//! Connected-player registry for the relay
//!
//! This module tracks everything the relay knows about a connected client:
//! - Player identity assigned on connect
//! - Network address used for routing replies and deliveries
//! - The room the player is in and the channels it subscribed to
//! - Last activity time, for timeout-based cleanup
//!
//! Clients are keyed by player id. Capacity is enforced on connect.

use log::info;
use shared::{Player, PlayerId, RoomId};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected player and its routing state
#[derive(Debug)]
pub struct Client {
    pub player: Player,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    pub room: Option<RoomId>,
    pub channels: HashSet<String>,
}

impl Client {
    pub fn new(player: Player, addr: SocketAddr) -> Self {
        Self {
            player,
            addr,
            last_seen: Instant::now(),
            room: None,
            channels: HashSet::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if nothing has been received from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }
}

/// All connected clients, with id assignment and capacity limits
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_player_id: PlayerId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Player ids start from 1 and increment for each new connection.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_player_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new player at `addr`. Returns None if the relay is full.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<Player> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        let player = Player::new(id, name);
        info!("Player {} connected from {}", player, addr);
        self.clients.insert(id, Client::new(player.clone(), addr));

        Some(player)
    }

    pub fn remove_client(&mut self, player_id: &PlayerId) -> Option<Client> {
        let removed = self.clients.remove(player_id);
        if let Some(client) = &removed {
            info!("Player {} disconnected", client.player);
        }
        removed
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Client> {
        self.clients.get(&player_id)
    }

    /// Refreshes the activity timestamp of the client at `addr` and returns its id
    pub fn touch_addr(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        let id = self.find_client_by_addr(addr)?;
        if let Some(client) = self.clients.get_mut(&id) {
            client.touch();
        }
        Some(id)
    }

    pub fn subscribe(&mut self, player_id: PlayerId, channel: &str) -> bool {
        match self.clients.get_mut(&player_id) {
            Some(client) => {
                client.channels.insert(channel.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&mut self, player_id: PlayerId, channel: &str) {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.channels.remove(channel);
        }
    }

    /// Records the room a player is in. Returns the previous room.
    pub fn set_room(&mut self, player_id: PlayerId, room: Option<RoomId>) -> Option<RoomId> {
        self.clients
            .get_mut(&player_id)
            .and_then(|client| std::mem::replace(&mut client.room, room))
    }

    /// Ids and addresses of every client subscribed to `channel`
    pub fn subscribers(&self, channel: &str) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .iter()
            .filter(|(_, client)| client.is_subscribed(channel))
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Removes every client that has been silent longer than the timeout and
    /// returns them so their rooms can be told.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.timeout;
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
