//! In-memory index: node arena, per-drive trees, and the Forest that owns
//! them all.

mod arena;
mod forest;
mod iterate;
mod node;
mod read;

pub use arena::NodeId;
pub use forest::{Forest, TimeKey};
pub use iterate::{TreePosition, Walk};
