//! Canonical enumeration of the LC0 policy-head move space.
//!
//! The policy output of a Maia network is a flat vector of 1858 weights.
//! Each slot corresponds to one move in a fixed enumeration built in the
//! side-to-move frame: queen-like slides, knight jumps, and rank-7
//! under-promotions. The ordering below is part of the wire contract with
//! the model file and must never change.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Number of slots in the policy head output.
pub const POLICY_SIZE: usize = 1858;

/// Compass directions for queen-like moves, in enumeration order.
const QUEEN_DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),   // N
    (1, 1),   // NE
    (0, 1),   // E
    (-1, 1),  // SE
    (-1, 0),  // S
    (-1, -1), // SW
    (0, -1),  // W
    (1, -1),  // NW
];

/// Knight jumps, clockwise starting from two-up-one-right.
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (2, 1),
    (1, 2),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
    (1, -2),
    (2, -1),
];

/// Under-promotion pieces in enumeration order. Queen promotions reuse the
/// plain queen-move slot and carry no entry of their own.
const UNDER_PROMOTIONS: [char; 3] = ['n', 'b', 'r'];

lazy_static! {
    /// Process-wide move enumeration, built once on first use.
    pub static ref MOVE_INDEX: MoveIndex = MoveIndex::build();
}

/// Bijection between UCI move strings (side-to-move frame) and policy
/// vector slots in `[0, POLICY_SIZE)`.
pub struct MoveIndex {
    forward: HashMap<String, u16>,
    reverse: Vec<String>,
}

impl MoveIndex {
    fn build() -> Self {
        let mut forward = HashMap::with_capacity(POLICY_SIZE);
        let mut reverse = Vec::with_capacity(POLICY_SIZE);

        let mut push = |forward: &mut HashMap<String, u16>, reverse: &mut Vec<String>, uci: String| {
            let slot = reverse.len() as u16;
            forward.insert(uci.clone(), slot);
            reverse.push(uci);
        };

        for rank in 0..8i8 {
            for file in 0..8i8 {
                let from = square_name(file, rank);

                for (dr, df) in QUEEN_DIRECTIONS {
                    for distance in 1..8i8 {
                        let (r, f) = (rank + dr * distance, file + df * distance);
                        if !on_board(f, r) {
                            break;
                        }
                        push(&mut forward, &mut reverse, format!("{}{}", from, square_name(f, r)));
                    }
                }

                for (dr, df) in KNIGHT_JUMPS {
                    let (r, f) = (rank + dr, file + df);
                    if on_board(f, r) {
                        push(&mut forward, &mut reverse, format!("{}{}", from, square_name(f, r)));
                    }
                }

                if rank == 6 {
                    for df in [-1, 0, 1] {
                        let f = file + df;
                        if !on_board(f, 7) {
                            continue;
                        }
                        let to = square_name(f, 7);
                        for piece in UNDER_PROMOTIONS {
                            push(&mut forward, &mut reverse, format!("{}{}{}", from, to, piece));
                        }
                    }
                }
            }
        }

        debug_assert_eq!(reverse.len(), POLICY_SIZE);
        Self { forward, reverse }
    }

    /// Policy slot for a UCI move in the side-to-move frame. Queen
    /// promotions resolve to the underlying queen-move slot. Unknown
    /// moves return `None`.
    pub fn index_of(&self, uci: &str) -> Option<u16> {
        let key = match uci.as_bytes() {
            [rest @ .., b'q'] if rest.len() == 4 => &uci[..4],
            _ => uci,
        };
        self.forward.get(key).copied()
    }

    /// UCI move stored at a policy slot, if the slot is in range.
    pub fn uci_at(&self, index: usize) -> Option<&str> {
        self.reverse.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

/// Rotate a UCI move 180° into the side-to-move frame. The enumeration is
/// built for the side at the bottom of the oriented board, so Black moves
/// must pass through this before lookup.
pub fn flip_uci(uci: &str) -> String {
    uci.bytes()
        .enumerate()
        .map(|(i, b)| match i {
            0 | 2 => (b'a' + b'h' - b) as char,
            1 | 3 => (b'1' + b'8' - b) as char,
            _ => b as char,
        })
        .collect()
}

fn square_name(file: i8, rank: i8) -> String {
    format!("{}{}", (b'a' + file as u8) as char, (b'1' + rank as u8) as char)
}

fn on_board(file: i8, rank: i8) -> bool {
    (0..8).contains(&file) && (0..8).contains(&rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_exactly_policy_size_entries() {
        assert_eq!(MOVE_INDEX.len(), POLICY_SIZE);
    }

    #[test]
    fn round_trips_every_entry() {
        for slot in 0..MOVE_INDEX.len() {
            let uci = MOVE_INDEX.uci_at(slot).unwrap();
            assert_eq!(MOVE_INDEX.index_of(uci), Some(slot as u16));
        }
    }

    #[test]
    fn corner_square_enumeration_order() {
        // a1: seven north slides, then the NE diagonal, then east.
        assert_eq!(MOVE_INDEX.uci_at(0), Some("a1a2"));
        assert_eq!(MOVE_INDEX.uci_at(6), Some("a1a8"));
        assert_eq!(MOVE_INDEX.uci_at(7), Some("a1b2"));
        assert_eq!(MOVE_INDEX.uci_at(14), Some("a1b1"));
        // After 21 slides, the two on-board knight jumps.
        assert_eq!(MOVE_INDEX.uci_at(21), Some("a1b3"));
        assert_eq!(MOVE_INDEX.uci_at(22), Some("a1c2"));
    }

    #[test]
    fn queen_promotion_shares_queen_move_slot() {
        let plain = MOVE_INDEX.index_of("e7e8").unwrap();
        assert_eq!(MOVE_INDEX.index_of("e7e8q"), Some(plain));
        let knight = MOVE_INDEX.index_of("e7e8n").unwrap();
        assert_ne!(knight, plain);
    }

    #[test]
    fn under_promotions_only_from_seventh_rank() {
        assert!(MOVE_INDEX.index_of("e7d8r").is_some());
        assert!(MOVE_INDEX.index_of("e2e1n").is_none());
        assert!(MOVE_INDEX.index_of("e6e7n").is_none());
    }

    #[test]
    fn unknown_lookups_are_absent() {
        assert_eq!(MOVE_INDEX.index_of("a1a1"), None);
        assert_eq!(MOVE_INDEX.index_of("e2f7"), None);
        assert_eq!(MOVE_INDEX.uci_at(POLICY_SIZE), None);
    }

    #[test]
    fn flip_rotates_one_hundred_eighty_degrees() {
        assert_eq!(flip_uci("e7e5"), "d2d4");
        assert_eq!(flip_uci("g8f6"), "b1c3");
        assert_eq!(flip_uci("a2a1n"), "h7h8n");
        assert_eq!(flip_uci(&flip_uci("c4d5")), "c4d5");
    }
}
