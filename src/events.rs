use std::fmt;

use serde::{Deserialize, Serialize};

/// Events that can cause a loan status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanEvent {
    /// Admin hands the book out
    Approve,
    /// Admin refuses the request
    Decline,
    /// Student brings the book back
    Return,
}

impl LoanEvent {
    /// All events
    pub const ALL: [Self; 3] = [Self::Approve, Self::Decline, Self::Return];
}

impl fmt::Display for LoanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Approve => "approve",
            Self::Decline => "decline",
            Self::Return => "return",
        };
        f.write_str(name)
    }
}
