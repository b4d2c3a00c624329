//! The local player's game: gravity, input, locking and everything published about it

use crate::display::SharedDisplay;
use crate::publisher::Publisher;
use crate::session::SessionContext;
use log::{debug, info};
use shared::{
    BlockShape, Board, BoardSnapshot, Direction, GameMessage, PieceSource, Player, Rotation,
    ScoreRecord, Square,
};
use std::sync::Arc;

/// Lifecycle of a local game. `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
    GameOver,
}

/// Player intents produced by the input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Left,
    Right,
    Down,
    RotateCw,
    RotateCcw,
    HardDrop,
    TogglePause,
    NextOpponent,
}

/// Owns the local player's board and drives it.
///
/// Every accepted change is redrawn on the display and published as a
/// MOVE_UPDATE. A lock first publishes the board as it was before full rows
/// were removed, then the board after the next block spawned, so observers
/// can animate the clear. Locks that clear rows also publish UPDATE_SCORE,
/// addressed to the current target opponent.
pub struct LocalGameLoop {
    player: Player,
    room: shared::RoomId,
    channel: String,
    board: Board,
    score: ScoreRecord,
    state: LoopState,
    target: Option<Player>,
    display: SharedDisplay,
    // Falling block squares as last drawn
    drawn: Vec<Square>,
    publisher: Arc<dyn Publisher>,
}

impl LocalGameLoop {
    pub fn new(
        session: &SessionContext,
        source: PieceSource,
        display: SharedDisplay,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let board = Board::new(session.player().id, source);
        Self::with_board(session, board, display, publisher)
    }

    pub fn with_board(
        session: &SessionContext,
        board: Board,
        display: SharedDisplay,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            player: session.player().clone(),
            room: session.room_id(),
            channel: session.channel(),
            score: ScoreRecord::new(session.player().clone()),
            board,
            state: LoopState::Stopped,
            target: None,
            display,
            drawn: Vec::new(),
            publisher,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.board.snapshot()
    }

    /// Shape of the block after the falling one
    pub fn next_shape(&mut self) -> BlockShape {
        self.board.next_shape()
    }

    pub fn score_record(&self) -> &ScoreRecord {
        &self.score
    }

    pub fn target(&self) -> Option<&Player> {
        self.target.as_ref()
    }

    /// Opponent that receives this player's cleared rows
    pub fn set_target(&mut self, target: Option<Player>) {
        if let Some(target) = &target {
            debug!("Penalty target is now {}", target);
        }
        self.target = target;
    }

    /// Begins play: spawns the first block, draws and publishes the board.
    /// Only valid from `Stopped`.
    pub fn start(&mut self) -> bool {
        if self.state != LoopState::Stopped {
            return false;
        }

        if self.board.falling().is_none() && !self.board.is_game_over() {
            self.board.spawn_block();
        }
        self.state = LoopState::Running;
        info!("Game started for {}", self.player);

        self.redraw(true);
        self.publish_state(self.board.snapshot());
        self.check_game_over();
        true
    }

    /// One gravity step. Does nothing unless running.
    pub fn tick(&mut self) -> bool {
        if self.state != LoopState::Running {
            return false;
        }
        let moved = self.board.try_move(Direction::Down);
        self.after_action(moved, false)
    }

    /// Applies a player command. Returns true if the board changed or the
    /// loop changed state.
    pub fn apply_input(&mut self, command: InputCommand) -> bool {
        match command {
            InputCommand::TogglePause => {
                return match self.state {
                    LoopState::Running => self.pause(),
                    LoopState::Paused => self.resume(),
                    _ => false,
                };
            }
            // Opponent selection belongs to the message router.
            InputCommand::NextOpponent => return false,
            _ => {}
        }

        if self.state != LoopState::Running {
            return false;
        }

        let accepted = match command {
            InputCommand::Left => self.board.try_move(Direction::Left),
            InputCommand::Right => self.board.try_move(Direction::Right),
            InputCommand::Down => self.board.try_move(Direction::Down),
            InputCommand::RotateCw => self.board.rotate(Rotation::Clockwise),
            InputCommand::RotateCcw => self.board.rotate(Rotation::Counterclockwise),
            InputCommand::HardDrop => self.board.hard_drop(),
            InputCommand::TogglePause | InputCommand::NextOpponent => false,
        };
        self.after_action(accepted, false)
    }

    pub fn pause(&mut self) -> bool {
        if self.state != LoopState::Running {
            return false;
        }
        self.state = LoopState::Paused;
        info!("Game paused");
        self.publish_keep_alive();
        true
    }

    /// Resumes play. The current board is published so observers drop their
    /// paused flag.
    pub fn resume(&mut self) -> bool {
        if self.state != LoopState::Paused {
            return false;
        }
        self.state = LoopState::Running;
        info!("Game resumed");
        self.publish_state(self.board.snapshot());
        true
    }

    /// Halts gravity and input. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if matches!(self.state, LoopState::Running | LoopState::Paused) {
            self.state = LoopState::Stopped;
            info!("Game stopped");
        }
    }

    /// Heartbeat while the player is not actively playing, so the relay keeps
    /// the session and observers show the board as paused.
    pub fn keep_alive(&self) -> bool {
        if matches!(self.state, LoopState::Paused | LoopState::GameOver) {
            self.publish_keep_alive();
            true
        } else {
            false
        }
    }

    /// Announces that this player is leaving the room and stops the game
    pub fn leave(&mut self) {
        self.publisher.publish(
            &self.channel,
            GameMessage::LeaveGame {
                player: self.player.clone(),
                room: self.room,
            },
        );
        self.stop();
    }

    /// Applies penalty rows sent by an opponent
    pub fn add_rows(&mut self, count: u32) -> bool {
        if !matches!(self.state, LoopState::Running | LoopState::Paused) {
            return false;
        }
        info!("Receiving {} penalty rows", count);
        let accepted = self.board.add_rows(count);
        self.after_action(accepted, true)
    }

    /// Publishes and redraws whatever the last board call did. `grid_changed`
    /// marks calls that touch settled cells without locking.
    fn after_action(&mut self, accepted: bool, grid_changed: bool) -> bool {
        let lock = self.board.take_lock();

        if let Some(report) = &lock {
            self.publish_state(report.settled.clone());

            if report.rows_cleared > 0 {
                let points = self.score.record(report.rows_cleared);
                debug!(
                    "Cleared {} rows for {} points (total {})",
                    report.rows_cleared,
                    points,
                    self.score.score()
                );
                self.publisher.publish(
                    &self.channel,
                    GameMessage::UpdateScore {
                        score: self.score.clone(),
                        target: self.target.clone(),
                    },
                );
            }
        }

        let changed = accepted || lock.is_some();
        if changed {
            self.redraw(lock.is_some() || grid_changed);
            self.publish_state(self.board.snapshot());
        }
        self.check_game_over();
        changed
    }

    fn check_game_over(&mut self) {
        if self.board.take_game_over() {
            self.state = LoopState::GameOver;
            info!(
                "Game over for {} with {} points",
                self.player,
                self.score.score()
            );
        }
    }

    /// Repaints the whole board when settled cells changed, otherwise only
    /// moves the falling block.
    fn redraw(&mut self, full: bool) {
        let falling = self.falling_squares();
        {
            let mut display = self.display.lock();
            if full {
                display.clear_board();
                display.draw_block(0, 0, &self.board.snapshot().squares());
            } else {
                display.undraw_block(0, 0, &self.drawn);
                display.draw_block(0, 0, &falling);
            }
        }
        self.drawn = falling;
    }

    fn falling_squares(&self) -> Vec<Square> {
        match self.board.falling() {
            Some(block) => block
                .squares()
                .map(|position| Square {
                    position,
                    code: block.code(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn publish_state(&self, state: BoardSnapshot) {
        self.publisher.publish(
            &self.channel,
            GameMessage::MoveUpdate {
                player: self.player.clone(),
                state,
            },
        );
    }

    fn publish_keep_alive(&self) {
        self.publisher.publish(
            &self.channel,
            GameMessage::GameKeepAlive {
                player: self.player.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{BoardCanvas, NoopDisplay};
    use crate::publisher::{NoopPublisher, RecordingPublisher};
    use parking_lot::Mutex;
    use shared::{Command, GameRoom, Position};

    struct Harness {
        game: LocalGameLoop,
        canvas: Arc<Mutex<BoardCanvas>>,
        publisher: Arc<RecordingPublisher>,
    }

    fn session() -> SessionContext {
        let mut room = GameRoom::new(9);
        room.players.push(Player::new(1, "ada"));
        room.players.push(Player::new(2, "grace"));
        SessionContext::new(Player::new(1, "ada"), room)
    }

    fn harness(rows: usize, cols: usize, shape: BlockShape) -> Harness {
        let canvas = BoardCanvas::shared(rows, cols);
        let publisher = Arc::new(RecordingPublisher::new());
        let board = Board::with_size(1, rows, cols, PieceSource::fixed(shape));
        let game = LocalGameLoop::with_board(
            &session(),
            board,
            canvas.clone(),
            publisher.clone(),
        );
        Harness {
            game,
            canvas,
            publisher,
        }
    }

    fn commands(publisher: &RecordingPublisher) -> Vec<Command> {
        publisher
            .take()
            .into_iter()
            .map(|(channel, message)| {
                assert_eq!(channel, "Game9");
                message.command()
            })
            .collect()
    }

    #[test]
    fn test_start_draws_and_publishes() {
        let mut h = harness(6, 4, BlockShape::Basic);
        assert_eq!(h.game.state(), LoopState::Stopped);

        assert!(h.game.start());
        assert!(!h.game.start());

        assert_eq!(h.game.state(), LoopState::Running);
        assert_eq!(h.canvas.lock().get(0, 2), BlockShape::Basic.code());
        assert_eq!(commands(&h.publisher), vec![Command::MoveUpdate]);
    }

    #[test]
    fn test_nothing_moves_before_start() {
        let mut h = harness(6, 4, BlockShape::Basic);
        assert!(!h.game.tick());
        assert!(!h.game.apply_input(InputCommand::Left));
        assert!(h.publisher.is_empty());
        assert_eq!(h.canvas.lock().frames(), 0);
    }

    #[test]
    fn test_tick_applies_gravity() {
        let mut h = harness(6, 4, BlockShape::Basic);
        h.game.start();
        h.publisher.take();

        assert!(h.game.tick());
        assert_eq!(
            h.game.board().falling().unwrap().position(),
            Position::new(1, 2)
        );
        assert_eq!(h.canvas.lock().get(1, 2), BlockShape::Basic.code());
        assert_eq!(h.canvas.lock().get(0, 2), 0);
        assert_eq!(commands(&h.publisher), vec![Command::MoveUpdate]);
    }

    #[test]
    fn test_rejected_move_has_no_side_effects() {
        let mut h = harness(6, 4, BlockShape::Basic);
        h.game.start();
        assert!(h.game.apply_input(InputCommand::Right));
        h.publisher.take();
        let frames = h.canvas.lock().frames();

        assert!(!h.game.apply_input(InputCommand::Right));
        assert!(!h.game.apply_input(InputCommand::RotateCw));

        assert!(h.publisher.is_empty());
        assert_eq!(h.canvas.lock().frames(), frames);
    }

    #[test]
    fn test_lock_publishes_settled_then_spawned_state() {
        let mut h = harness(3, 2, BlockShape::Basic);
        h.game.start();
        h.publisher.take();

        assert!(h.game.apply_input(InputCommand::HardDrop));

        let sent = h.publisher.take();
        assert_eq!(sent.len(), 2);
        match (&sent[0].1, &sent[1].1) {
            (
                GameMessage::MoveUpdate { state: settled, .. },
                GameMessage::MoveUpdate { state: spawned, .. },
            ) => {
                assert!(settled.falling().is_none());
                assert!(spawned.falling().is_some());
                assert!(spawned.sequence() > settled.sequence());
            }
            other => panic!("Unexpected messages {:?}", other),
        }
    }

    #[test]
    fn test_clearing_rows_scores_and_targets_opponent() {
        let mut h = harness(3, 1, BlockShape::Basic);
        h.game.set_target(Some(Player::new(2, "grace")));
        h.game.start();
        h.publisher.take();

        // A one-column board: every lock fills and clears the bottom row.
        assert!(h.game.apply_input(InputCommand::HardDrop));

        let sent = h.publisher.take();
        let kinds: Vec<Command> = sent.iter().map(|(_, m)| m.command()).collect();
        assert_eq!(
            kinds,
            vec![Command::MoveUpdate, Command::UpdateScore, Command::MoveUpdate]
        );
        match &sent[1].1 {
            GameMessage::UpdateScore { score, target } => {
                assert_eq!(score.score(), 40);
                assert_eq!(score.rows_cleared_last(), 1);
                assert_eq!(target.as_ref().map(|p| p.id), Some(2));
            }
            other => panic!("Unexpected message {:?}", other),
        }
        assert_eq!(h.game.score_record().score(), 40);
    }

    #[test]
    fn test_pause_resume_and_keep_alive() {
        let mut h = harness(6, 4, BlockShape::Basic);
        h.game.start();
        h.publisher.take();

        assert!(!h.game.keep_alive());
        assert!(h.game.apply_input(InputCommand::TogglePause));
        assert_eq!(h.game.state(), LoopState::Paused);
        assert!(!h.game.tick());
        assert!(!h.game.apply_input(InputCommand::Left));
        assert!(h.game.keep_alive());

        assert!(h.game.apply_input(InputCommand::TogglePause));
        assert_eq!(h.game.state(), LoopState::Running);

        assert_eq!(
            commands(&h.publisher),
            vec![
                Command::GameKeepAlive,
                Command::GameKeepAlive,
                Command::MoveUpdate
            ]
        );
    }

    #[test]
    fn test_inert_loop_runs_without_display_or_network() {
        let display: SharedDisplay = Arc::new(Mutex::new(NoopDisplay));
        let mut game = LocalGameLoop::new(
            &session(),
            PieceSource::fixed(BlockShape::O),
            display,
            Arc::new(NoopPublisher),
        );

        assert!(game.start());
        assert!(game.board().falling().is_some());
        assert!(game.tick());
        assert!(game.apply_input(InputCommand::HardDrop));
        assert_eq!(game.state(), LoopState::Running);
        assert_eq!(game.board().grid().settled_count(), 4);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let mut h = harness(2, 2, BlockShape::Basic);
        h.game.start();

        // Column 1 fills up after two drops and the third block cannot spawn.
        assert!(h.game.apply_input(InputCommand::HardDrop));
        assert_eq!(h.game.state(), LoopState::Running);
        assert!(h.game.apply_input(InputCommand::HardDrop));
        assert_eq!(h.game.state(), LoopState::GameOver);

        // The final MOVE_UPDATE shows the settled board with nothing falling.
        match h.publisher.take().pop() {
            Some((_, GameMessage::MoveUpdate { state, .. })) => {
                assert!(state.falling().is_none());
                assert_eq!(state, h.game.snapshot());
            }
            other => panic!("Unexpected last message {:?}", other),
        }
        assert!(!h.game.tick());
        assert!(!h.game.start());
        assert!(h.publisher.is_empty());
    }

    #[test]
    fn test_penalty_rows_end_game_and_stop_input() {
        let mut h = harness(3, 2, BlockShape::Basic);
        h.game.start();
        assert!(h.game.apply_input(InputCommand::HardDrop));
        assert_eq!(h.game.state(), LoopState::Running);

        // Three rows push the settled square off the top.
        assert!(h.game.add_rows(3));
        assert_eq!(h.game.state(), LoopState::GameOver);
        h.publisher.take();

        assert!(!h.game.apply_input(InputCommand::HardDrop));
        assert!(!h.game.add_rows(1));
        assert!(!h.game.apply_input(InputCommand::TogglePause));
        assert!(h.game.keep_alive());
        assert_eq!(commands(&h.publisher), vec![Command::GameKeepAlive]);
    }

    #[test]
    fn test_stop_is_idempotent_and_leave_publishes() {
        let mut h = harness(6, 4, BlockShape::Basic);
        h.game.start();
        h.publisher.take();

        h.game.stop();
        h.game.stop();
        assert_eq!(h.game.state(), LoopState::Stopped);
        assert!(!h.game.tick());

        h.game.leave();
        let sent = h.publisher.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            sent[0].1,
            GameMessage::LeaveGame { room: 9, .. }
        ));
    }
}
