//! Performance benchmarks for the board model, replay and wire codec

use client::display::BoardCanvas;
use client::replay::RemoteReplayController;
use client::scoreboard::Scoreboard;
use shared::{
    decode_packet, encode_packet, game_channel, Board, BoardSnapshot, Direction, GameMessage,
    Grid, Packet, PieceSource, Player, Position, Rotation, ScoreRecord, BOARD_COLS, BOARD_ROWS,
};
use std::time::Instant;

fn snapshot_with_full_rows(sequence: u32, full_rows: usize) -> BoardSnapshot {
    let mut grid = Grid::new(BOARD_ROWS, BOARD_COLS);
    for row in BOARD_ROWS - full_rows..BOARD_ROWS {
        for col in 0..BOARD_COLS {
            grid.set(Position::new(row as i32, col as i32), 3);
        }
    }
    BoardSnapshot::new(1, sequence, grid, None, 0)
}

/// Benchmarks a stream of player moves on a full-size board
#[test]
fn benchmark_board_moves() {
    let iterations = 50_000;
    let mut board = Board::new(1, PieceSource::seven_bag(7));
    board.spawn_block();

    let start = Instant::now();

    for i in 0..iterations {
        if board.is_game_over() {
            board = Board::new(1, PieceSource::seven_bag(i as u64));
            board.spawn_block();
        }
        match i % 6 {
            0 => {
                board.try_move(Direction::Left);
            }
            1 => {
                board.rotate(Rotation::Clockwise);
            }
            2 | 3 => {
                board.try_move(Direction::Down);
            }
            4 => {
                board.try_move(Direction::Right);
            }
            _ => {
                board.hard_drop();
            }
        }
        board.take_lock();
    }

    let duration = start.elapsed();
    println!(
        "Board moves: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks clearing four full rows at once
#[test]
fn benchmark_row_clearing() {
    let iterations = 10_000;
    let template = snapshot_with_full_rows(0, 4);

    let start = Instant::now();

    for _ in 0..iterations {
        let mut grid = template.grid().clone();
        assert_eq!(grid.clear_full_rows(), 4);
    }

    let duration = start.elapsed();
    println!(
        "Row clearing: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks flattening snapshots into drawable squares
#[test]
fn benchmark_snapshot_squares() {
    let iterations = 10_000;
    let snapshot = snapshot_with_full_rows(0, 10);

    let start = Instant::now();

    let mut total = 0;
    for _ in 0..iterations {
        total += snapshot.squares().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot squares: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(total, iterations * 10 * BOARD_COLS);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks encoding and decoding MOVE_UPDATE datagrams
#[test]
fn benchmark_packet_serialization() {
    let iterations = 10_000;
    let mut board = Board::new(1, PieceSource::seven_bag(1));
    board.spawn_block();
    for _ in 0..5 {
        board.hard_drop();
    }

    let packet = Packet::Publish {
        channel: game_channel(1),
        message: GameMessage::MoveUpdate {
            player: Player::new(1, "ada"),
            state: board.snapshot(),
        },
    };

    let start = Instant::now();

    let mut total_bytes = 0;
    for _ in 0..iterations {
        let data = encode_packet(&packet).unwrap();
        total_bytes += data.len();
        let _: Packet = decode_packet(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} round trips in {:?} ({:.2} μs/iter, {} bytes avg)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        total_bytes / iterations
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks draining a long replay queue, including row clear animation
#[test]
fn benchmark_replay_queue() {
    let snapshots = 1_000u32;
    let canvas = BoardCanvas::shared(BOARD_ROWS, BOARD_COLS);
    let controller =
        RemoteReplayController::new(Player::new(1, "ada"), BOARD_ROWS, BOARD_COLS, canvas.clone());
    controller.set_active(true);

    let start = Instant::now();

    for sequence in 0..snapshots {
        let full_rows = if sequence % 10 == 0 { 2 } else { 0 };
        controller.add_state(snapshot_with_full_rows(sequence, full_rows));
    }
    let mut frames = 0u32;
    while controller.update() {
        frames += 1;
    }

    let duration = start.elapsed();
    println!(
        "Replay queue: {} frames in {:?} ({:.2} μs/frame)",
        frames,
        duration,
        duration.as_micros() as f64 / frames as f64
    );

    // Every snapshot plus one extra frame per full row
    assert_eq!(frames, snapshots + 2 * (snapshots / 10));
    assert_eq!(controller.queue_len(), 0);
    assert!(duration.as_millis() < 2000);
}

/// Stress test for scoreboard ordering with many score updates
#[test]
fn stress_test_scoreboard_updates() {
    let iterations = 10_000;
    let mut scoreboard = Scoreboard::new();
    let mut records: Vec<ScoreRecord> = (1..=16)
        .map(|id| ScoreRecord::new(Player::new(id, format!("player{}", id))))
        .collect();

    let start = Instant::now();

    for i in 0..iterations {
        let record = &mut records[i % 16];
        record.record((i % 5) as u32);
        scoreboard.update_and_sort(record.clone());
    }

    let duration = start.elapsed();
    println!(
        "Scoreboard updates: {} iterations in {:?}",
        iterations, duration
    );

    assert_eq!(scoreboard.len(), 16);
    for pair in scoreboard.entries().windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }
    assert!(duration.as_millis() < 500);
}
