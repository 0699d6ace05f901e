//! Policy-vector → ranked legal move decoding.
//!
//! The network emits weights for the full 1858-slot move space; only the
//! slots matching a legal move in the source position carry meaning. The
//! decoder intersects the two, renormalizes over the legal set, and
//! returns the top candidates annotated with SAN.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, san::SanPlus, CastlingMode, Chess, Position};

use super::index::{flip_uci, MOVE_INDEX};
use crate::engine::types::EngineResult;

/// How many candidates a decode returns unless the caller asks otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// One ranked candidate move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePrediction {
    pub uci: String,
    pub san: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<char>,
    pub probability: f32,
}

/// Decode a raw policy vector against a position.
///
/// Weights are read per legal move (absent or negative slots count as
/// zero) and renormalized over the legal set; a non-positive total falls
/// back to the uniform distribution. The result is sorted by probability
/// descending, ties broken by policy slot, truncated to `top_k`.
///
/// A terminal position decodes to an empty list; the caller treats that
/// as checkmate or stalemate, not as an error.
pub fn decode_policy(policy: &[f32], fen: &str, top_k: usize) -> EngineResult<Vec<MovePrediction>> {
    let fen: Fen = fen.parse()?;
    let pos: Chess = fen.into_position(CastlingMode::Standard)?;
    let legal = pos.legal_moves();
    if legal.is_empty() {
        return Ok(Vec::new());
    }

    let black = pos.turn().is_black();
    let mut candidates: Vec<(usize, u16, String, f32)> = legal
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let uci = m.to_uci(CastlingMode::Standard).to_string();
            let oriented = if black { flip_uci(&uci) } else { uci.clone() };
            let slot = MOVE_INDEX.index_of(&oriented).unwrap_or(u16::MAX);
            let weight = policy
                .get(slot as usize)
                .copied()
                .unwrap_or(0.0)
                .max(0.0);
            (i, slot, uci, weight)
        })
        .collect();

    let total: f32 = candidates.iter().map(|(_, _, _, w)| w).sum();
    let uniform = 1.0 / candidates.len() as f32;
    for candidate in &mut candidates {
        candidate.3 = if total > 0.0 { candidate.3 / total } else { uniform };
    }

    candidates.sort_by(|a, b| {
        b.3.partial_cmp(&a.3)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    candidates.truncate(top_k);

    Ok(candidates
        .into_iter()
        .map(|(i, _, uci, probability)| {
            let mut scratch = pos.clone();
            let san = SanPlus::from_move_and_play_unchecked(&mut scratch, &legal[i]);
            MovePrediction {
                san: san.to_string(),
                from: uci[0..2].to_string(),
                to: uci[2..4].to_string(),
                promotion: uci.chars().nth(4),
                uci,
                probability,
            }
        })
        .collect())
}

/// Uniform distribution over the legal moves of a position, shaped like a
/// real decode. Used when the network output is unusable.
pub fn uniform_predictions(fen: &str, top_k: usize) -> EngineResult<Vec<MovePrediction>> {
    decode_policy(&[], fen, top_k)
}
