use crate::display::BoardCanvas;
use crate::game_loop::LoopState;
use crate::network::ClientStatus;
use crate::scoreboard::Scoreboard;
use macroquad::prelude::*;
use shared::{Block, Position, EMPTY, PENALTY_CODE};

const MARGIN: f32 = 20.0;
const PANEL_WIDTH: f32 = 200.0;

/// Fill color for a cell code
pub fn color_for(code: u8) -> Color {
    match code {
        EMPTY => Color::from_rgba(34, 34, 34, 255),
        1 => Color::from_rgba(200, 200, 200, 255),
        2 => Color::from_rgba(0, 240, 240, 255),
        3 => Color::from_rgba(240, 240, 0, 255),
        4 => Color::from_rgba(160, 0, 240, 255),
        5 => Color::from_rgba(0, 240, 0, 255),
        6 => Color::from_rgba(240, 0, 0, 255),
        7 => Color::from_rgba(0, 0, 240, 255),
        8 => Color::from_rgba(240, 160, 0, 255),
        PENALTY_CODE => Color::from_rgba(102, 102, 102, 255),
        _ => MAGENTA,
    }
}

/// Paints the local board, the watched opponent and the side panel
pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Cell size that fits two boards and the panel in the window
    fn cell_size(&self, rows: usize, cols: usize) -> f32 {
        let by_height = (self.height - 2.0 * MARGIN) / rows.max(1) as f32;
        let by_width = (self.width - PANEL_WIDTH - 3.0 * MARGIN) / (2 * cols.max(1)) as f32;
        by_height.min(by_width).max(4.0)
    }

    pub fn render(
        &self,
        local: &BoardCanvas,
        opponent: &BoardCanvas,
        scoreboard: &Scoreboard,
        status: &ClientStatus,
    ) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let cell = self.cell_size(local.rows(), local.cols());
        let board_width = cell * local.cols() as f32;

        self.draw_board(local, MARGIN, MARGIN, cell);
        let opponent_x = 2.0 * MARGIN + board_width;
        self.draw_board(opponent, opponent_x, MARGIN, cell);

        if matches!(status.state, Some(LoopState::Paused)) {
            self.draw_banner("PAUSED", MARGIN, board_width, cell);
        }
        if matches!(status.state, Some(LoopState::GameOver)) {
            self.draw_banner("GAME OVER", MARGIN, board_width, cell);
        }
        if status.opponent_paused {
            self.draw_banner("PAUSED", opponent_x, board_width, cell);
        }

        let panel_x = 3.0 * MARGIN + 2.0 * board_width;
        self.draw_panel(panel_x, scoreboard, status);
    }

    fn draw_board(&self, canvas: &BoardCanvas, x: f32, y: f32, cell: f32) {
        for row in 0..canvas.rows() {
            for col in 0..canvas.cols() {
                let cx = x + col as f32 * cell;
                let cy = y + row as f32 * cell;
                let code = canvas.get(row, col);
                draw_rectangle(cx, cy, cell - 1.0, cell - 1.0, color_for(code));
            }
        }
        draw_rectangle_lines(
            x - 1.0,
            y - 1.0,
            cell * canvas.cols() as f32 + 1.0,
            cell * canvas.rows() as f32 + 1.0,
            2.0,
            WHITE,
        );
    }

    fn draw_banner(&self, text: &str, x: f32, board_width: f32, cell: f32) {
        let y = MARGIN + cell * 8.0;
        draw_rectangle(x, y, board_width, 40.0, Color::from_rgba(0, 0, 0, 200));
        let size = measure_text(text, None, 28, 1.0);
        draw_text(
            text,
            x + (board_width - size.width) / 2.0,
            y + 28.0,
            28.0,
            WHITE,
        );
    }

    fn draw_panel(&self, x: f32, scoreboard: &Scoreboard, status: &ClientStatus) {
        let mut y = MARGIN + 12.0;

        let who = match (&status.player, status.room) {
            (Some(player), Some(room)) => format!("{} in room {}", player, room),
            (Some(player), None) => format!("{} (joining)", player),
            _ => "Connecting...".to_string(),
        };
        draw_text(&who, x, y, 18.0, WHITE);
        y += 24.0;

        if let Some(reason) = &status.disconnected {
            draw_text(&format!("Disconnected: {}", reason), x, y, 16.0, RED);
            y += 24.0;
        }

        if let Some(shape) = status.next_shape {
            draw_text("Next", x, y, 16.0, GRAY);
            y += 8.0;
            let preview = 12.0;
            let block = Block::at(shape, Position::new(1, 1));
            for square in block.squares() {
                draw_rectangle(
                    x + square.col as f32 * preview,
                    y + square.row as f32 * preview,
                    preview - 1.0,
                    preview - 1.0,
                    color_for(shape.code()),
                );
            }
            y += preview * 4.0 + 8.0;
        }

        draw_text("Scores", x, y, 16.0, GRAY);
        y += 20.0;
        let selected = scoreboard.selected().map(|s| s.player().id);
        for entry in scoreboard.entries() {
            let color = if Some(entry.player().id) == selected {
                YELLOW
            } else if status.player.as_ref() == Some(entry.player()) {
                GREEN
            } else {
                WHITE
            };
            let line = format!("{:<12} {:>7}", entry.player().name, entry.score());
            draw_text(&line, x, y, 16.0, color);
            y += 18.0;
        }

        y += 12.0;
        if let Some(opponent) = &status.opponent {
            draw_text(&format!("Watching {}", opponent.name), x, y, 16.0, GRAY);
            y += 18.0;
        }
        draw_text("Tab: next opponent  P: pause", x, y, 14.0, GRAY);
    }
}
