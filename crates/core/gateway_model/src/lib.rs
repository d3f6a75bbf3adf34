//! Data model shared across the gateway: the closed connection-type
//! enumeration, rules and rule patterns, connections and registrations, flip
//! status, and the action explode/assemble helpers.

mod action;
mod connection;
mod connection_type;
mod flip_status;
mod rule;

pub use action::assemble_rule;
pub use action::explode_connection;
pub use action::explode_rule;
pub use action::ACTION_SUFFIXES;
pub use connection::Connection;
pub use connection::Registration;
pub use connection_type::ConnectionType;
pub use flip_status::assemble_action_status;
pub use flip_status::FlipStatus;
pub use rule::RemoteRule;
pub use rule::Rule;
pub use rule::RulePattern;
