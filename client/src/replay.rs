//! Replays an opponent's board from the snapshots it publishes

use crate::display::SharedDisplay;
use log::{debug, warn};
use parking_lot::Mutex;
use shared::{BoardSnapshot, Player};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug)]
struct ReplayState {
    active: bool,
    paused: bool,
    queue: VecDeque<BoardSnapshot>,
    displayed: BoardSnapshot,
    last_sequence: Option<u32>,
}

/// Buffers a remote player's snapshots and plays them back one per tick.
///
/// While the controller is active, incoming snapshots are queued and the
/// display is driven by `update`. A displayed snapshot with full rows is
/// held for one tick per row while the rows are removed, which reproduces
/// the clear animation regardless of when the snapshots arrived. While
/// inactive, the newest snapshot simply replaces the displayed one and
/// nothing is drawn.
///
/// All state sits behind one mutex shared by the network path and the
/// replay ticker.
pub struct RemoteReplayController {
    player: Player,
    rows: usize,
    cols: usize,
    display: SharedDisplay,
    state: Mutex<ReplayState>,
}

impl RemoteReplayController {
    pub fn new(player: Player, rows: usize, cols: usize, display: SharedDisplay) -> Self {
        let displayed = BoardSnapshot::empty(player.id, rows, cols);
        Self {
            player,
            rows,
            cols,
            display,
            state: Mutex::new(ReplayState {
                active: false,
                paused: false,
                queue: VecDeque::new(),
                displayed,
                last_sequence: None,
            }),
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Accepts the next snapshot from the network. Snapshots older than the
    /// newest one seen, or sized for another board, are dropped.
    pub fn add_state(&self, snapshot: BoardSnapshot) {
        let grid = snapshot.grid();
        if grid.rows() != self.rows || grid.cols() != self.cols {
            warn!(
                "Dropping {}x{} snapshot from {} (board is {}x{})",
                grid.rows(),
                grid.cols(),
                self.player,
                self.rows,
                self.cols
            );
            return;
        }

        let mut state = self.state.lock();

        if let Some(last) = state.last_sequence {
            if snapshot.sequence() < last {
                debug!(
                    "Dropping stale snapshot {} from {} (newest {})",
                    snapshot.sequence(),
                    self.player,
                    last
                );
                return;
            }
        }
        state.last_sequence = Some(snapshot.sequence());

        if state.active {
            state.queue.push_back(snapshot);
        } else {
            state.displayed = snapshot;
        }
    }

    /// One replay tick. Returns true if the display was redrawn.
    pub fn update(&self) -> bool {
        let mut state = self.state.lock();
        if !state.active {
            return false;
        }

        if state.displayed.num_full_rows() > 0 {
            state.displayed = state.displayed.with_lowest_full_row_cleared();
        } else if let Some(next) = state.queue.pop_front() {
            state.displayed = next;
        } else {
            return false;
        }

        self.redraw(&state.displayed);
        true
    }

    /// Makes this the opponent on screen. Activation redraws the displayed
    /// board; deactivation throws away queued snapshots without showing them.
    pub fn set_active(&self, active: bool) {
        let mut state = self.state.lock();
        state.active = active;
        if active {
            self.redraw(&state.displayed);
        } else {
            state.queue.clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn displayed(&self) -> BoardSnapshot {
        self.state.lock().displayed.clone()
    }

    fn redraw(&self, snapshot: &BoardSnapshot) {
        let squares = snapshot.squares();
        let mut display = self.display.lock();
        display.clear_board();
        display.draw_block(0, 0, &squares);
    }

    /// Runs `update` every `period` on the current tokio runtime until the
    /// returned task is aborted.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                controller.update();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::BoardCanvas;
    use shared::{Grid, Position};

    const ROWS: usize = 6;
    const COLS: usize = 3;

    fn controller() -> (RemoteReplayController, Arc<Mutex<BoardCanvas>>) {
        let canvas = BoardCanvas::shared(ROWS, COLS);
        let controller =
            RemoteReplayController::new(Player::new(2, "grace"), ROWS, COLS, canvas.clone());
        (controller, canvas)
    }

    /// A snapshot whose bottom `full` rows are complete, with a marker square
    /// on the top row at `marker` so frames can be told apart
    fn snapshot(sequence: u32, full: usize, marker: i32) -> BoardSnapshot {
        let mut grid = Grid::new(ROWS, COLS);
        for row in (ROWS - full)..ROWS {
            for col in 0..COLS {
                grid.set(Position::new(row as i32, col as i32), 4);
            }
        }
        grid.set(Position::new(0, marker), 7);
        BoardSnapshot::new(2, sequence, grid, None, full as u32)
    }

    #[test]
    fn test_inactive_controller_replaces_displayed_state() {
        let (controller, canvas) = controller();
        controller.add_state(snapshot(1, 0, 0));
        controller.add_state(snapshot(2, 0, 1));

        assert_eq!(controller.queue_len(), 0);
        assert_eq!(controller.displayed().sequence(), 2);
        assert!(!controller.update());
        assert_eq!(canvas.lock().frames(), 0);
    }

    #[test]
    fn test_activation_draws_displayed_state() {
        let (controller, canvas) = controller();
        controller.add_state(snapshot(1, 0, 2));

        controller.set_active(true);

        assert!(controller.is_active());
        assert_eq!(canvas.lock().get(0, 2), 7);
    }

    #[test]
    fn test_full_rows_hold_the_queue_one_tick_per_row() {
        let (controller, canvas) = controller();
        controller.set_active(true);

        controller.add_state(snapshot(1, 2, 0));
        for sequence in 2..=5 {
            controller.add_state(snapshot(sequence, 0, 1));
        }
        assert_eq!(controller.queue_len(), 5);

        // First tick shows the snapshot with two full rows.
        assert!(controller.update());
        assert_eq!(controller.displayed().sequence(), 1);
        assert_eq!(controller.displayed().num_full_rows(), 2);

        // Two ticks spent clearing, one row each.
        assert!(controller.update());
        assert_eq!(controller.displayed().num_full_rows(), 1);
        assert_eq!(controller.queue_len(), 4);
        assert!(controller.update());
        assert_eq!(controller.displayed().num_full_rows(), 0);
        assert_eq!(controller.displayed().sequence(), 1);
        assert_eq!(controller.queue_len(), 4);

        // Only now does the next snapshot appear.
        assert!(controller.update());
        assert_eq!(controller.displayed().sequence(), 2);
        assert_eq!(canvas.lock().get(0, 1), 7);
        assert_eq!(canvas.lock().get(0, 0), 0);
    }

    #[test]
    fn test_cleared_rows_shift_the_marker_down() {
        let (controller, canvas) = controller();
        controller.set_active(true);
        controller.add_state(snapshot(1, 1, 0));

        controller.update();
        controller.update();

        // The marker on row 0 moved down by the one cleared row.
        let canvas = canvas.lock();
        assert_eq!(canvas.get(1, 0), 7);
        assert_eq!(canvas.painted_count(), 1);
    }

    #[test]
    fn test_deactivation_discards_queue_without_drawing() {
        let (controller, canvas) = controller();
        controller.set_active(true);
        for sequence in 1..=3 {
            controller.add_state(snapshot(sequence, 0, 2));
        }
        let frames = canvas.lock().frames();

        controller.set_active(false);

        assert_eq!(controller.queue_len(), 0);
        assert_eq!(canvas.lock().frames(), frames);
        assert_eq!(canvas.lock().get(0, 2), 0);
        assert!(!controller.update());
        assert_eq!(controller.displayed().sequence(), 0);
    }

    #[test]
    fn test_stale_snapshots_are_dropped() {
        let (controller, _) = controller();
        controller.set_active(true);
        controller.add_state(snapshot(5, 0, 0));
        controller.add_state(snapshot(3, 0, 0));
        controller.add_state(snapshot(5, 0, 1));

        assert_eq!(controller.queue_len(), 2);
    }

    #[test]
    fn test_snapshots_for_another_board_size_are_dropped() {
        let (controller, canvas) = controller();
        controller.set_active(true);

        let wrong = BoardSnapshot::new(2, 1, Grid::new(ROWS + 1, COLS), None, 0);
        controller.add_state(wrong);
        assert_eq!(controller.queue_len(), 0);

        // A later valid snapshot is still accepted.
        controller.add_state(snapshot(1, 0, 1));
        assert!(controller.update());
        assert_eq!(canvas.lock().get(0, 1), 7);
    }

    #[test]
    fn test_paused_flag() {
        let (controller, _) = controller();
        assert!(!controller.is_paused());
        controller.set_paused(true);
        assert!(controller.is_paused());
    }

    #[tokio::test]
    async fn test_ticker_drains_queue() {
        let (controller, _) = controller();
        let controller = Arc::new(controller);
        controller.set_active(true);
        for sequence in 1..=3 {
            controller.add_state(snapshot(sequence, 0, 0));
        }

        let ticker = controller.spawn_ticker(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(200)).await;
        ticker.abort();

        assert_eq!(controller.queue_len(), 0);
        assert_eq!(controller.displayed().sequence(), 3);
    }
}
