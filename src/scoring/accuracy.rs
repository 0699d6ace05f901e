//! Centipawn → win-probability → accuracy pipeline and move records.
//!
//! The same curve family Lichess publishes for its accuracy metric:
//! evaluations in centipawns convert to a win probability, the drop in
//! win probability across a move converts to a per-move accuracy, and a
//! game aggregates as the harmonic mean of its move accuracies. All
//! functions are pure; evaluations come from the caller.

use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, CastlingMode, Chess, Color, Position};
use uuid::Uuid;

use crate::engine::types::EngineResult;

/// Evaluations are clamped to ±1000 cp before conversion; beyond that
/// the win probability is saturated anyway.
const EVAL_CLAMP: f64 = 1000.0;

/// Win probability (0–100) for the side to move, from a centipawn
/// evaluation in that side's favour.
pub fn win_probability(centipawns: f64) -> f64 {
    let cp = centipawns.clamp(-EVAL_CLAMP, EVAL_CLAMP);
    50.0 + 50.0 * (2.0 / (1.0 + (-0.003_682_08 * cp).exp()) - 1.0)
}

/// Accuracy (0–100) of a move given the win probabilities before and
/// after it, from the mover's perspective. Holding or improving the
/// position is full accuracy.
pub fn move_accuracy(win_before: f64, win_after: f64) -> f64 {
    let drop = (win_before - win_after).max(0.0);
    (103.1668 * (-0.04354 * drop).exp() - 3.1669).clamp(0.0, 100.0)
}

/// Accuracy of a move from white-perspective evaluations. Black's moves
/// negate the centipawns so the drop is measured from the mover's side.
pub fn accuracy_for_move(eval_before: f64, eval_after: f64, mover: Color) -> f64 {
    let (before, after) = match mover {
        Color::White => (eval_before, eval_after),
        Color::Black => (-eval_before, -eval_after),
    };
    move_accuracy(win_probability(before), win_probability(after))
}

/// Per-move quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveQuality {
    Brilliant,
    Great,
    Good,
    Book,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    /// Bucket an accuracy value; "brilliant" is reserved for playing the
    /// engine's best move at near-perfect accuracy.
    pub fn classify(accuracy: f64, is_best_move: bool) -> Self {
        if is_best_move && accuracy >= 99.0 {
            MoveQuality::Brilliant
        } else if accuracy >= 95.0 {
            MoveQuality::Great
        } else if accuracy >= 80.0 {
            MoveQuality::Good
        } else if accuracy >= 60.0 {
            MoveQuality::Book
        } else if accuracy >= 40.0 {
            MoveQuality::Inaccuracy
        } else if accuracy >= 20.0 {
            MoveQuality::Mistake
        } else {
            MoveQuality::Blunder
        }
    }
}

/// Harmonic mean of per-move accuracies, zeros excluded. Weighs the bad
/// moves heavily, which is the point.
pub fn game_accuracy(accuracies: &[f64]) -> f64 {
    let nonzero: Vec<f64> = accuracies.iter().copied().filter(|&a| a > 0.0).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    let reciprocal_sum: f64 = nonzero.iter().map(|a| 1.0 / a).sum();
    nonzero.len() as f64 / reciprocal_sum
}

/// Coarse game phase, recorded on move records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

/// Classify the phase of a position: early full-board play is the
/// opening, low remaining piece material is the endgame.
pub fn classify_phase(pos: &Chess) -> GamePhase {
    let material = pos.board().material();
    let piece_points = |side: &shakmaty::ByRole<u8>| -> u32 {
        u32::from(side.knight) * 3
            + u32::from(side.bishop) * 3
            + u32::from(side.rook) * 5
            + u32::from(side.queen) * 9
    };
    let total = piece_points(&material.white) + piece_points(&material.black);

    if total <= 13 {
        GamePhase::Endgame
    } else if pos.fullmoves().get() <= 10 {
        GamePhase::Opening
    } else {
        GamePhase::Middlegame
    }
}

/// Everything recorded about one played move after server evaluation.
/// The store is a caller concern; this type only gets assembled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub game_id: Uuid,
    pub ply: u32,
    pub fen: String,
    pub played: String,
    pub engine_best: String,
    pub eval_before: f64,
    pub eval_after: f64,
    pub phase: GamePhase,
    pub concepts: Vec<String>,
    pub missed_tactics: Vec<String>,
    pub quality: MoveQuality,
    pub accuracy: f64,
}

/// Assemble a move record from a position, the move played, and the
/// caller-supplied evaluation pair (white-perspective centipawns).
#[allow(clippy::too_many_arguments)]
pub fn record_move(
    game_id: Uuid,
    ply: u32,
    fen: &str,
    played: &str,
    engine_best: &str,
    eval_before: f64,
    eval_after: f64,
    concepts: Vec<String>,
    missed_tactics: Vec<String>,
) -> EngineResult<MoveRecord> {
    let parsed: Fen = fen.parse()?;
    let pos: Chess = parsed.into_position(CastlingMode::Standard)?;

    let accuracy = accuracy_for_move(eval_before, eval_after, pos.turn());
    let quality = MoveQuality::classify(accuracy, played == engine_best);

    Ok(MoveRecord {
        game_id,
        ply,
        fen: fen.to_string(),
        played: played.to_string(),
        engine_best: engine_best.to_string(),
        eval_before,
        eval_after,
        phase: classify_phase(&pos),
        concepts,
        missed_tactics,
        quality,
        accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Chess {
        let fen: Fen = fen.parse().unwrap();
        fen.into_position(CastlingMode::Standard).unwrap()
    }

    #[test]
    fn even_position_is_a_coin_flip() {
        assert!((win_probability(0.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn win_probability_is_monotone_and_saturates() {
        assert!(win_probability(100.0) > win_probability(0.0));
        assert!(win_probability(300.0) > win_probability(100.0));
        assert!(win_probability(-100.0) < 50.0);
        // The clamp makes everything past ±1000 identical.
        assert_eq!(win_probability(1500.0), win_probability(1000.0));
        assert!(win_probability(1000.0) > 95.0);
    }

    #[test]
    fn holding_the_eval_is_full_accuracy() {
        let accuracy = move_accuracy(55.0, 55.0);
        assert_eq!(accuracy, 100.0);
        // Improving can never exceed the clamp either.
        assert_eq!(move_accuracy(40.0, 70.0), 100.0);
    }

    #[test]
    fn accuracy_decreases_as_the_position_worsens() {
        let small = move_accuracy(60.0, 55.0);
        let medium = move_accuracy(60.0, 45.0);
        let large = move_accuracy(60.0, 20.0);
        assert!(small > medium && medium > large);
        assert!((0.0..=100.0).contains(&large));
    }

    #[test]
    fn black_moves_negate_the_evaluations() {
        // White-perspective eval moves from -50 to +150: terrible for
        // Black, fine for White.
        let black = accuracy_for_move(-50.0, 150.0, Color::Black);
        let white = accuracy_for_move(-50.0, 150.0, Color::White);
        assert!(black < white);
        assert_eq!(white, 100.0);
    }

    #[test]
    fn quality_buckets_cover_the_ladder() {
        assert_eq!(MoveQuality::classify(99.5, true), MoveQuality::Brilliant);
        assert_eq!(MoveQuality::classify(99.5, false), MoveQuality::Great);
        assert_eq!(MoveQuality::classify(90.0, false), MoveQuality::Good);
        assert_eq!(MoveQuality::classify(70.0, false), MoveQuality::Book);
        assert_eq!(MoveQuality::classify(50.0, false), MoveQuality::Inaccuracy);
        assert_eq!(MoveQuality::classify(30.0, false), MoveQuality::Mistake);
        assert_eq!(MoveQuality::classify(10.0, false), MoveQuality::Blunder);
    }

    #[test]
    fn harmonic_mean_weighs_low_accuracies() {
        let accuracies = [100.0, 100.0, 25.0];
        let mean = game_accuracy(&accuracies);
        let arithmetic = accuracies.iter().sum::<f64>() / 3.0;
        assert!(mean < arithmetic);
        assert!((mean - 3.0 / (1.0 / 100.0 + 1.0 / 100.0 + 1.0 / 25.0)).abs() < 1e-9);
    }

    #[test]
    fn harmonic_mean_skips_zeros() {
        assert_eq!(game_accuracy(&[0.0, 80.0, 0.0, 80.0]), 80.0);
        assert_eq!(game_accuracy(&[]), 0.0);
        assert_eq!(game_accuracy(&[0.0]), 0.0);
    }

    #[test]
    fn phase_classification() {
        let start = pos("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert_eq!(classify_phase(&start), GamePhase::Opening);

        let middlegame = pos("r1bq1rk1/pp2bppp/2n1pn2/3p4/3P4/2NBPN2/PP3PPP/R1BQ1RK1 w - - 0 12");
        assert_eq!(classify_phase(&middlegame), GamePhase::Middlegame);

        let endgame = pos("8/5pk1/6p1/8/3R4/6P1/5PK1/3r4 w - - 0 40");
        assert_eq!(classify_phase(&endgame), GamePhase::Endgame);
    }

    #[test]
    fn record_assembly_scores_and_phases() {
        let record = record_move(
            Uuid::nil(),
            1,
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "e2e4",
            "e2e4",
            20.0,
            20.0,
            vec!["center-control".to_string()],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(record.accuracy, 100.0);
        assert_eq!(record.quality, MoveQuality::Brilliant);
        assert_eq!(record.phase, GamePhase::Opening);
        assert_eq!(record.concepts, vec!["center-control".to_string()]);
    }
}
