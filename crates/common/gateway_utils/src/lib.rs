#![cfg_attr(test, deny(warnings))]

pub mod select;
pub mod signals;
pub mod timers;

#[cfg(feature = "logging")]
pub mod logging;
