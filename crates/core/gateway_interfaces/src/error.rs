use thiserror::Error;

/// Preconditions the flipped interface enforces itself, before any hub call
/// is ever made (§7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("refusing to flip a rule to self")]
    FlipToSelf,

    #[error("flip rule already exists")]
    FlipRuleAlreadyExists,
}
