//! Dispatches game messages from the room channel to replay controllers,
//! the scoreboard and the local game

use crate::display::SharedDisplay;
use crate::replay::RemoteReplayController;
use crate::scoreboard::SharedScoreboard;
use log::{debug, info, warn};
use shared::{GameMessage, GameRoom, Player, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Something the local game has to do because of a received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEffect {
    /// An opponent targeting us cleared rows
    AddRows(u32),
    /// The opponent on screen changed; penalties now go to it
    Retarget(Option<Player>),
}

/// Routes room traffic for one local player.
///
/// Keeps a replay controller per remote player. Exactly one of them, the
/// active opponent, draws on the shared opponent display. Messages that
/// originate from the local player come back from the relay and are ignored
/// here.
pub struct MessageRouter {
    local: Player,
    rows: usize,
    cols: usize,
    display: SharedDisplay,
    scoreboard: SharedScoreboard,
    controllers: HashMap<PlayerId, Arc<RemoteReplayController>>,
    tickers: HashMap<PlayerId, JoinHandle<()>>,
    replay_period: Option<Duration>,
    active: Option<PlayerId>,
}

impl MessageRouter {
    /// Controllers created by this router are driven by hand until
    /// `with_replay_period` is set.
    pub fn new(
        local: Player,
        rows: usize,
        cols: usize,
        display: SharedDisplay,
        scoreboard: SharedScoreboard,
    ) -> Self {
        scoreboard.write().ensure(&local);
        Self {
            local,
            rows,
            cols,
            display,
            scoreboard,
            controllers: HashMap::new(),
            tickers: HashMap::new(),
            replay_period: None,
            active: None,
        }
    }

    /// Gives every controller its own replay ticker on the current tokio
    /// runtime, firing every `period`.
    pub fn with_replay_period(mut self, period: Duration) -> Self {
        self.replay_period = Some(period);
        self
    }

    pub fn controller(&self, player_id: PlayerId) -> Option<&Arc<RemoteReplayController>> {
        self.controllers.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn active_opponent(&self) -> Option<&Player> {
        let id = self.active?;
        self.controllers.get(&id).map(|c| c.player())
    }

    /// True if the opponent on screen last reported itself paused
    pub fn active_is_paused(&self) -> bool {
        self.active
            .and_then(|id| self.controllers.get(&id))
            .map_or(false, |c| c.is_paused())
    }

    fn add_controller(&mut self, player: &Player) {
        if self.controllers.contains_key(&player.id) {
            return;
        }

        debug!("Tracking opponent {}", player);
        let controller = Arc::new(RemoteReplayController::new(
            player.clone(),
            self.rows,
            self.cols,
            Arc::clone(&self.display),
        ));
        if let Some(period) = self.replay_period {
            self.tickers
                .insert(player.id, controller.spawn_ticker(period));
        }
        self.controllers.insert(player.id, controller);
        self.scoreboard.write().ensure(player);
    }

    fn remove_controller(&mut self, player_id: PlayerId) -> bool {
        if let Some(ticker) = self.tickers.remove(&player_id) {
            ticker.abort();
        }
        self.scoreboard.write().remove(player_id);
        let removed = self.controllers.remove(&player_id).is_some();
        if self.active == Some(player_id) {
            self.active = None;
        }
        removed
    }

    fn activate(&mut self, player_id: PlayerId) -> Option<Player> {
        let target = self.controllers.get(&player_id)?.player().clone();

        for controller in self.controllers.values() {
            if controller.is_active() {
                controller.set_active(false);
            }
        }
        if let Some(controller) = self.controllers.get(&player_id) {
            controller.set_active(true);
        }

        self.scoreboard.write().select(player_id);
        self.active = Some(player_id);
        info!("Now watching {}", target);
        Some(target)
    }

    /// Opponents in scoreboard order
    fn opponent_order(&self) -> Vec<PlayerId> {
        self.scoreboard
            .read()
            .entries()
            .iter()
            .map(|e| e.player().id)
            .filter(|id| self.controllers.contains_key(id))
            .collect()
    }

    /// Picks an opponent to show when none is, such as after the watched
    /// one left.
    fn ensure_active(&mut self) -> Option<LocalEffect> {
        if self.active.is_some() {
            return None;
        }
        match self.opponent_order().first().copied() {
            Some(id) => self
                .activate(id)
                .map(|player| LocalEffect::Retarget(Some(player))),
            None => None,
        }
    }

    /// Brings the controllers in line with a room roster announced by the
    /// relay.
    pub fn sync_room(&mut self, room: &GameRoom) -> Vec<LocalEffect> {
        let had_active = self.active.is_some();

        for player in &room.players {
            if player.id != self.local.id {
                self.add_controller(player);
            }
        }

        let departed: Vec<PlayerId> = self
            .controllers
            .keys()
            .copied()
            .filter(|id| !room.contains(*id))
            .collect();
        for id in departed {
            self.remove_controller(id);
        }

        let mut effects = Vec::new();
        match self.ensure_active() {
            Some(effect) => effects.push(effect),
            None if had_active && self.active.is_none() => {
                effects.push(LocalEffect::Retarget(None))
            }
            None => {}
        }
        effects
    }

    /// Handles one message from the room channel or the local UI
    pub fn handle(&mut self, message: GameMessage) -> Vec<LocalEffect> {
        let mut effects = Vec::new();

        match message {
            GameMessage::MoveUpdate { player, state } => {
                if player.id == self.local.id {
                    return effects;
                }
                match self.controllers.get(&player.id) {
                    Some(controller) => {
                        controller.set_paused(false);
                        controller.add_state(state);
                    }
                    None => warn!("MOVE_UPDATE from unknown player {}", player),
                }
            }

            GameMessage::UpdateScore { score, target } => {
                let sender = score.player().clone();
                if sender.id == self.local.id {
                    return effects;
                }

                self.add_controller(&sender);
                let rows = score.rows_cleared_last();
                self.scoreboard.write().update_and_sort(score);

                if target.map_or(false, |t| t.id == self.local.id) && rows > 0 {
                    info!("{} sent {} rows our way", sender, rows);
                    effects.push(LocalEffect::AddRows(rows));
                }
                effects.extend(self.ensure_active());
            }

            GameMessage::GameKeepAlive { player } => {
                if player.id == self.local.id {
                    return effects;
                }
                match self.controllers.get(&player.id) {
                    Some(controller) => controller.set_paused(true),
                    None => warn!("GAME_KEEP_ALIVE from unknown player {}", player),
                }
            }

            GameMessage::SwitchOpponent { player } => {
                if player.id == self.local.id || !self.controllers.contains_key(&player.id) {
                    warn!("Cannot watch {}", player);
                    return effects;
                }
                if let Some(target) = self.activate(player.id) {
                    effects.push(LocalEffect::Retarget(Some(target)));
                }
            }

            GameMessage::LeaveGame { player, room } => {
                if player.id == self.local.id {
                    return effects;
                }
                info!("{} left room {}", player, room);
                let was_active = self.active == Some(player.id);
                if self.remove_controller(player.id) && was_active {
                    match self.ensure_active() {
                        Some(effect) => effects.push(effect),
                        None => effects.push(LocalEffect::Retarget(None)),
                    }
                }
            }
        }

        effects
    }

    /// The SWITCH_OPPONENT that moves the view to the next opponent in
    /// scoreboard order, wrapping around. None when there is nobody else to
    /// switch to.
    pub fn next_opponent(&self) -> Option<GameMessage> {
        let order = self.opponent_order();
        let next = match self.active.and_then(|id| order.iter().position(|p| *p == id)) {
            Some(index) => order.get((index + 1) % order.len())?,
            None => order.first()?,
        };
        if Some(*next) == self.active {
            return None;
        }
        let player = self.controllers.get(next)?.player().clone();
        Some(GameMessage::SwitchOpponent { player })
    }

    /// Stops every replay ticker
    pub fn shutdown(&mut self) {
        for (_, ticker) in self.tickers.drain() {
            ticker.abort();
        }
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
