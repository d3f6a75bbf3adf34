//! Adapter over the local naming authority (§4.2): the `MasterApi` trait an
//! external master RPC implementation must satisfy, action endpoint fusion
//! and explosion, and the `Mirror` that drives register/unregister on behalf
//! of remote gateways.

mod error;
mod fusion;
mod master_api;
mod mirror;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use error::MirrorError;
pub use fusion::fuse_actions;
pub use master_api::MasterApi;
pub use master_api::SystemState;
pub use mirror::Mirror;
