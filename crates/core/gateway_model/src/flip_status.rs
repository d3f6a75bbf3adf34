use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a single flip-request entry in a receiver's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlipStatus {
    Pending,
    Accepted,
    Blocked,
    Resend,
    Unknown,
}

impl fmt::Display for FlipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlipStatus::Pending => "pending",
            FlipStatus::Accepted => "accepted",
            FlipStatus::Blocked => "blocked",
            FlipStatus::Resend => "resend",
            FlipStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for FlipStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FlipStatus::Pending),
            "accepted" => Ok(FlipStatus::Accepted),
            "blocked" => Ok(FlipStatus::Blocked),
            "resend" => Ok(FlipStatus::Resend),
            "unknown" => Ok(FlipStatus::Unknown),
            _ => Err(()),
        }
    }
}

/// Combine the five per-topic statuses of an exploded action flip back into a
/// single status, per the dominance rule in §4.5: UNKNOWN dominates if any
/// part is UNKNOWN, then BLOCKED/RESEND dominate PENDING/ACCEPTED.
pub fn assemble_action_status(parts: &[FlipStatus]) -> FlipStatus {
    if parts.is_empty() {
        return FlipStatus::Unknown;
    }
    if parts.iter().any(|s| *s == FlipStatus::Unknown) {
        return FlipStatus::Unknown;
    }
    if parts.iter().any(|s| *s == FlipStatus::Blocked) {
        return FlipStatus::Blocked;
    }
    if parts.iter().any(|s| *s == FlipStatus::Resend) {
        return FlipStatus::Resend;
    }
    if parts.iter().all(|s| *s == FlipStatus::Accepted) {
        return FlipStatus::Accepted;
    }
    FlipStatus::Pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn all_accepted_assembles_to_accepted() {
        let parts = [FlipStatus::Accepted; 5];
        assert_matches!(assemble_action_status(&parts), FlipStatus::Accepted);
    }

    #[test]
    fn any_unknown_dominates() {
        let parts = [
            FlipStatus::Accepted,
            FlipStatus::Accepted,
            FlipStatus::Unknown,
            FlipStatus::Accepted,
            FlipStatus::Accepted,
        ];
        assert_matches!(assemble_action_status(&parts), FlipStatus::Unknown);
    }

    #[test]
    fn blocked_dominates_pending_and_accepted() {
        let parts = [
            FlipStatus::Accepted,
            FlipStatus::Pending,
            FlipStatus::Blocked,
            FlipStatus::Accepted,
            FlipStatus::Pending,
        ];
        assert_eq!(assemble_action_status(&parts), FlipStatus::Blocked);
    }

    #[test]
    fn mixed_pending_and_accepted_is_pending() {
        let parts = [
            FlipStatus::Accepted,
            FlipStatus::Pending,
            FlipStatus::Accepted,
            FlipStatus::Accepted,
            FlipStatus::Pending,
        ];
        assert_eq!(assemble_action_status(&parts), FlipStatus::Pending);
    }
}
