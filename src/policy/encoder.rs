//! FEN → LC0 input-tensor encoding.
//!
//! Produces the 112×8×8 float tensor the Maia networks were trained on:
//! eight 13-plane time steps (current position plus up to seven history
//! positions), castling rights, side to move, and the counter planes. The
//! layout must match the training convention exactly; a deviation here
//! silently corrupts every prediction downstream.

use log::debug;
use ndarray::Array3;
use shakmaty::{fen::Fen, CastlingMode, CastlingSide, Chess, Color, Position, Role, Square};

use crate::engine::types::EngineResult;

/// Planes per time step: six of ours, six of theirs, one repetition flag.
const STEP_PLANES: usize = 13;
/// Time steps encoded: the current position plus up to seven prior ones.
const TIME_STEPS: usize = 8;

pub const INPUT_PLANES: usize = 112;
pub const INPUT_LEN: usize = INPUT_PLANES * 64;

const CASTLING_BASE: usize = 104;
const SIDE_TO_MOVE_PLANE: usize = 108;
const RULE50_PLANE: usize = 109;
const ONES_PLANE: usize = 111;

/// Encode a position and its history into a (112, 8, 8) tensor.
///
/// `history` is most-recent-first and may hold at most seven entries;
/// extras are ignored. Steps without a history entry keep zeroed planes.
/// The board is rotated 180° when Black is to move so the mover always
/// sits at the bottom of the encoded frame.
pub fn encode_position(fen: &str, history: &[String]) -> EngineResult<Array3<f32>> {
    let current = parse_position(fen)?;
    let us = current.turn();
    let flip = us.is_black();

    let mut planes = Array3::<f32>::zeros((INPUT_PLANES, 8, 8));

    // Repetition detection compares the position fields of the FEN only;
    // move counters never make two positions distinct.
    let mut step_keys: Vec<Option<String>> = Vec::with_capacity(TIME_STEPS);
    step_keys.push(Some(position_key(fen)));

    fill_step(&mut planes, 0, &current, us, flip);

    for (step, entry) in history.iter().take(TIME_STEPS - 1).enumerate() {
        match parse_position(entry) {
            Ok(pos) => {
                fill_step(&mut planes, step + 1, &pos, us, flip);
                step_keys.push(Some(position_key(entry)));
            }
            Err(err) => {
                debug!("skipping unparsable history entry at step {}: {}", step + 1, err);
                step_keys.push(None);
            }
        }
    }

    // A step repeats when its position key reappears further back in time.
    for step in 0..step_keys.len() {
        let Some(key) = &step_keys[step] else { continue };
        let repeated = step_keys[step + 1..]
            .iter()
            .any(|older| older.as_deref() == Some(key.as_str()));
        if repeated {
            fill_plane(&mut planes, step * STEP_PLANES + 12, 1.0);
        }
    }

    let castles = current.castles();
    for (offset, (color, side)) in [
        (us, CastlingSide::KingSide),
        (us, CastlingSide::QueenSide),
        (us.other(), CastlingSide::KingSide),
        (us.other(), CastlingSide::QueenSide),
    ]
    .into_iter()
    .enumerate()
    {
        if castles.has(color, side) {
            fill_plane(&mut planes, CASTLING_BASE + offset, 1.0);
        }
    }

    if us.is_black() {
        fill_plane(&mut planes, SIDE_TO_MOVE_PLANE, 1.0);
    }

    fill_plane(
        &mut planes,
        RULE50_PLANE,
        (current.halfmoves() as f32 / 99.0).min(1.0),
    );
    // Plane 110 stays zero: modern LC0 networks zero the move-count plane.
    fill_plane(&mut planes, ONES_PLANE, 1.0);

    Ok(planes)
}

fn parse_position(fen: &str) -> EngineResult<Chess> {
    let fen: Fen = fen.parse()?;
    Ok(fen.into_position(CastlingMode::Standard)?)
}

fn fill_step(planes: &mut Array3<f32>, step: usize, pos: &Chess, us: Color, flip: bool) {
    let base = step * STEP_PLANES;
    for sq in Square::ALL {
        let Some(piece) = pos.board().piece_at(sq) else { continue };
        let side = if piece.color == us { 0 } else { 6 };
        let plane = base + side + role_offset(piece.role);
        let (rank, file) = oriented(sq, flip);
        planes[[plane, rank, file]] = 1.0;
    }
}

fn role_offset(role: Role) -> usize {
    match role {
        Role::Pawn => 0,
        Role::Knight => 1,
        Role::Bishop => 2,
        Role::Rook => 3,
        Role::Queen => 4,
        Role::King => 5,
    }
}

fn oriented(sq: Square, flip: bool) -> (usize, usize) {
    let (rank, file) = (sq.rank() as usize, sq.file() as usize);
    if flip {
        (7 - rank, 7 - file)
    } else {
        (rank, file)
    }
}

fn fill_plane(planes: &mut Array3<f32>, plane: usize, value: f32) {
    for rank in 0..8 {
        for file in 0..8 {
            planes[[plane, rank, file]] = value;
        }
    }
}

/// Piece placement, side to move, castling and en-passant fields of a FEN.
fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
