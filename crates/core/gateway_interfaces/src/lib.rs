//! The public, flipped, and pulled interface state machines (§4.3-§4.5):
//! rule storage, exact/regex matching, blacklist dominance, and the
//! per-tick reconciliation each one hands the watcher loop.

mod error;
mod flipped;
mod public;
mod pulled;

pub use error::InterfaceError;
pub use flipped::FlipDelta;
pub use flipped::FlippedInterface;
pub use public::PublicDelta;
pub use public::PublicInterface;
pub use pulled::PullDelta;
pub use pulled::PulledInterface;
