//! Pure position → tensor → move-distribution plumbing.
//!
//! Everything in here is stateless and non-suspending: the move-space
//! enumeration shared with the model file, the 112-plane input encoder,
//! and the legal-move policy decoder. The async engine layers sit on top.

pub mod decoder;
pub mod encoder;
pub mod index;

pub use decoder::{decode_policy, uniform_predictions, MovePrediction, DEFAULT_TOP_K};
pub use encoder::{encode_position, INPUT_LEN, INPUT_PLANES};
pub use index::{flip_uci, MoveIndex, MOVE_INDEX, POLICY_SIZE};
