//! Score-based fallback move distribution.
//!
//! When no network is available the product still needs candidate moves
//! shaped like a real prediction. Moves are scored by a coarse priority
//! ladder (captures over central squares over castling over checks),
//! then the scores are normalized into a distribution.

use shakmaty::{fen::Fen, san::SanPlus, CastlingMode, Chess, Move, Position, Role, Square};

use crate::engine::types::{EngineResult, InferenceResult};
use crate::policy::MovePrediction;

fn piece_value(role: Role) -> f32 {
    match role {
        Role::Pawn => 1.0,
        Role::Knight => 3.0,
        Role::Bishop => 3.0,
        Role::Rook => 5.0,
        Role::Queen => 9.0,
        Role::King => 0.0,
    }
}

const CENTER: [Square; 4] = [Square::D4, Square::E4, Square::D5, Square::E5];

fn score_move(pos: &Chess, m: &Move) -> f32 {
    let mut score = 1.0;
    if let Some(captured) = m.capture() {
        score += 10.0 + piece_value(captured);
    }
    if CENTER.contains(&m.to()) {
        score += 5.0;
    }
    if m.is_castle() {
        score += 3.0;
    }
    let mut after = pos.clone();
    after.play_unchecked(m);
    if after.is_check() {
        score += 1.5;
    }
    score
}

/// Heuristic candidate distribution for a position. Terminal positions
/// produce an empty list, mirroring the decoder.
pub fn heuristic_predictions(fen: &str, top_k: usize) -> EngineResult<Vec<MovePrediction>> {
    let fen: Fen = fen.parse()?;
    let pos: Chess = fen.into_position(CastlingMode::Standard)?;
    let legal = pos.legal_moves();
    if legal.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(&Move, f32)> = legal.iter().map(|m| (m, score_move(&pos, m))).collect();
    let total: f32 = scored.iter().map(|(_, s)| s).sum();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|(m, score)| {
            let uci = m.to_uci(CastlingMode::Standard).to_string();
            let mut scratch = pos.clone();
            let san = SanPlus::from_move_and_play_unchecked(&mut scratch, m);
            MovePrediction {
                san: san.to_string(),
                from: uci[0..2].to_string(),
                to: uci[2..4].to_string(),
                promotion: uci.chars().nth(4),
                uci,
                probability: score / total,
            }
        })
        .collect())
}

/// Heuristic distribution wrapped like an engine result, with the
/// fallback marker set.
pub fn heuristic_result(fen: &str, rating: u16, top_k: usize) -> EngineResult<InferenceResult> {
    Ok(InferenceResult {
        predictions: heuristic_predictions(fen, top_k)?,
        rating,
        inference_ms: 0,
        fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn distribution_is_normalized_over_all_legal_moves() {
        let predictions = heuristic_predictions(STARTPOS, 25).unwrap();
        assert_eq!(predictions.len(), 20);
        let total: f32 = predictions.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn captures_dominate_quiet_moves() {
        // White can take the d5 pawn with the e4 pawn.
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        let predictions = heuristic_predictions(fen, 5).unwrap();
        assert_eq!(predictions[0].uci, "e4d5");
    }

    #[test]
    fn central_pushes_rank_above_edge_pushes() {
        let predictions = heuristic_predictions(STARTPOS, 25).unwrap();
        let prob = |uci: &str| {
            predictions
                .iter()
                .find(|p| p.uci == uci)
                .map(|p| p.probability)
                .unwrap()
        };
        assert!(prob("e2e4") > prob("a2a3"));
        assert!(prob("d2d4") > prob("g1h3"));
    }

    #[test]
    fn terminal_position_yields_no_candidates() {
        let mate = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        assert!(heuristic_predictions(mate, 5).unwrap().is_empty());
    }

    #[test]
    fn result_wrapper_carries_the_fallback_marker() {
        let result = heuristic_result(STARTPOS, 1500, 4).unwrap();
        assert!(result.fallback);
        assert_eq!(result.predictions.len(), 4);
        assert_eq!(result.rating, 1500);
    }
}
