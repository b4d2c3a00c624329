//! Client network runtime: relay handshake, room join and the session event loop

use crate::display::BoardCanvas;
use crate::game_loop::{InputCommand, LocalGameLoop, LoopState};
use crate::publisher::ChannelPublisher;
use crate::router::{LocalEffect, MessageRouter};
use crate::scoreboard::{Scoreboard, SharedScoreboard};
use crate::session::SessionContext;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use shared::{
    decode_packet, encode_packet, BlockShape, GameMessage, GameRoom, Packet, PieceSource, Player,
    RoomId, BOARD_COLS, BOARD_ROWS, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Runtime settings, normally taken from the command line
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub name: String,
    pub room: RoomId,
    /// Gravity period of the local game
    pub gravity: Duration,
    /// Replay period of opponent controllers. Shorter than gravity so
    /// queues drain.
    pub replay: Duration,
    pub keep_alive: Duration,
    pub seed: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            name: "player".to_string(),
            room: 1,
            gravity: Duration::from_millis(500),
            replay: Duration::from_millis(50),
            keep_alive: Duration::from_secs(1),
            seed: 0,
        }
    }
}

/// What the UI shows besides the boards
#[derive(Debug, Clone, Default)]
pub struct ClientStatus {
    pub player: Option<Player>,
    pub room: Option<RoomId>,
    pub state: Option<LoopState>,
    pub next_shape: Option<BlockShape>,
    pub opponent: Option<Player>,
    pub opponent_paused: bool,
    pub disconnected: Option<String>,
}

/// Everything the network thread writes and the UI thread reads
#[derive(Clone)]
pub struct ClientViews {
    pub local: Arc<Mutex<BoardCanvas>>,
    pub opponent: Arc<Mutex<BoardCanvas>>,
    pub scoreboard: SharedScoreboard,
    pub status: Arc<Mutex<ClientStatus>>,
}

impl ClientViews {
    pub fn new() -> Self {
        Self {
            local: BoardCanvas::shared(BOARD_ROWS, BOARD_COLS),
            opponent: BoardCanvas::shared(BOARD_ROWS, BOARD_COLS),
            scoreboard: Scoreboard::shared(),
            status: Arc::new(Mutex::new(ClientStatus::default())),
        }
    }
}

impl Default for ClientViews {
    fn default() -> Self {
        Self::new()
    }
}

/// One player's connection to the relay and the game session running on it
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,
    views: ClientViews,

    player: Option<Player>,
    session: Option<SessionContext>,
    game: Option<LocalGameLoop>,
    router: Option<MessageRouter>,
    last_score: u64,

    // Messages published by the game loop, waiting to be sent
    outbound_tx: mpsc::UnboundedSender<Packet>,
    outbound_rx: mpsc::UnboundedReceiver<Packet>,
}

impl Client {
    pub async fn new(config: ClientConfig, views: ClientViews) -> Result<Self, BoxError> {
        let server_addr = lookup_host(&config.server)
            .await?
            .next()
            .ok_or_else(|| format!("could not resolve {}", config.server))?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Client {
            socket,
            server_addr,
            config,
            views,
            player: None,
            session: None,
            game: None,
            router: None,
            last_score: 0,
            outbound_tx,
            outbound_rx,
        })
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn game(&self) -> Option<&LocalGameLoop> {
        self.game.as_ref()
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), BoxError> {
        let data = encode_packet(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), BoxError> {
        info!("Connecting to {} as {}...", self.server_addr, self.config.name);
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.config.name.clone(),
        };
        self.send_packet(&packet).await
    }

    /// Processes one packet from the relay. Returns false once the relay has
    /// ended the session.
    async fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { player } => {
                info!("Connected as {}", player);
                self.views.status.lock().player = Some(player.clone());
                self.player = Some(player);

                let room = self.config.room;
                let channel = shared::game_channel(room);
                for packet in [Packet::JoinRoom { room }, Packet::Subscribe { channel }] {
                    if let Err(e) = self.send_packet(&packet).await {
                        error!("Failed to join room {}: {}", room, e);
                    }
                }
            }

            Packet::RoomJoined { room } => {
                if room.id != self.config.room {
                    debug!("Ignoring roster of room {}", room.id);
                } else if self.session.is_none() {
                    self.start_session(room);
                } else {
                    if let Some(session) = self.session.as_mut() {
                        session.set_room(room.clone());
                    }
                    let effects = match self.router.as_mut() {
                        Some(router) => router.sync_room(&room),
                        None => Vec::new(),
                    };
                    self.apply_effects(effects);
                }
            }

            Packet::Deliver { channel, message } => {
                let expected = self.session.as_ref().map(|s| s.channel());
                if expected.as_deref() != Some(channel.as_str()) {
                    debug!("Ignoring {} on {}", message.command(), channel);
                } else if let GameMessage::SwitchOpponent { .. } = message {
                    // Opponent selection is local to each client.
                    debug!("Ignoring relayed {}", message.command());
                } else {
                    self.route(message);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.views.status.lock().disconnected = Some(reason);
                return false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        true
    }

    fn start_session(&mut self, room: GameRoom) {
        let Some(player) = self.player.clone() else {
            warn!("Roster for room {} arrived before the handshake", room.id);
            return;
        };

        info!("Joined room {} with {} players", room.id, room.players.len());
        let session = SessionContext::new(player.clone(), room);
        let publisher = Arc::new(ChannelPublisher::new(self.outbound_tx.clone()));

        let mut game = LocalGameLoop::new(
            &session,
            PieceSource::seven_bag(self.config.seed),
            self.views.local.clone(),
            publisher,
        );
        let mut router = MessageRouter::new(
            player,
            BOARD_ROWS,
            BOARD_COLS,
            self.views.opponent.clone(),
            self.views.scoreboard.clone(),
        )
        .with_replay_period(self.config.replay);

        let effects = router.sync_room(session.room());
        game.start();

        self.views.status.lock().room = Some(session.room_id());
        self.session = Some(session);
        self.game = Some(game);
        self.router = Some(router);
        self.apply_effects(effects);
    }

    fn route(&mut self, message: GameMessage) {
        let effects = match self.router.as_mut() {
            Some(router) => router.handle(message),
            None => return,
        };
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<LocalEffect>) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        for effect in effects {
            match effect {
                LocalEffect::AddRows(rows) => {
                    game.add_rows(rows);
                }
                LocalEffect::Retarget(target) => game.set_target(target),
            }
        }
    }

    fn handle_input(&mut self, command: InputCommand) {
        if command == InputCommand::NextOpponent {
            let switch = self.router.as_ref().and_then(|r| r.next_opponent());
            if let Some(message) = switch {
                self.route(message);
            }
            return;
        }

        if let Some(game) = self.game.as_mut() {
            game.apply_input(command);
        }
    }

    /// Copies the local score onto the scoreboard and refreshes the status panel
    fn refresh_views(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };

        let record = game.score_record().clone();
        let listed = self.views.scoreboard.read().get(record.player().id).is_some();
        if !listed || record.score() != self.last_score {
            self.last_score = record.score();
            self.views.scoreboard.write().update_and_sort(record);
        }

        let next_shape = game.next_shape();
        let mut status = self.views.status.lock();
        status.state = Some(game.state());
        status.next_shape = Some(next_shape);
        if let Some(router) = self.router.as_ref() {
            status.opponent = router.active_opponent().cloned();
            status.opponent_paused = router.active_is_paused();
        }
    }

    /// Sends everything the game loop has published so far
    async fn flush_outbound(&mut self) {
        while let Ok(packet) = self.outbound_rx.try_recv() {
            if let Err(e) = self.send_packet(&packet).await {
                error!("Failed to publish: {}", e);
            }
        }
    }

    /// Runs the session until the input channel closes or the relay ends it
    pub async fn run(
        &mut self,
        mut input_rx: mpsc::UnboundedReceiver<InputCommand>,
    ) -> Result<(), BoxError> {
        self.connect().await?;

        let mut gravity = interval(self.config.gravity);
        gravity.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keep_alive = interval(self.config.keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            match decode_packet(&buffer[..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet).await {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Dropping datagram: {}", e),
                            }
                        }
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = gravity.tick() => {
                    if let Some(game) = self.game.as_mut() {
                        game.tick();
                    }
                },

                _ = keep_alive.tick() => {
                    if let Some(game) = self.game.as_ref() {
                        game.keep_alive();
                    }
                },

                command = input_rx.recv() => {
                    match command {
                        Some(command) => self.handle_input(command),
                        None => {
                            info!("Input closed, leaving");
                            break;
                        }
                    }
                },

                Some(packet) = self.outbound_rx.recv() => {
                    if let Err(e) = self.send_packet(&packet).await {
                        error!("Failed to publish: {}", e);
                    }
                },
            }

            self.refresh_views();
        }

        if let Some(game) = self.game.as_mut() {
            game.leave();
        }
        if let Some(router) = self.router.as_mut() {
            router.shutdown();
        }
        self.flush_outbound().await;
        if self.player.is_some() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
