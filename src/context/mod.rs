//! Context construction: attention pooling of the previous sentence and
//! composition with the hidden state and entity memory.

pub mod attention;
pub mod compose;

pub use attention::AttentionEncoder;
pub use compose::{AdditiveGate, Compose, ConcatProject, ContextComposer};
