use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the possible states of a borrowing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// A student asked to borrow the book
    #[default]
    Requested,
    /// An admin handed the book out; a due date is set
    Approved,
    /// An admin refused the request
    Declined,
    /// The student brought the book back
    Returned,
}

impl LoanStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 4] = [Self::Requested, Self::Approved, Self::Declined, Self::Returned];

    /// Get a human-readable description of the current status
    #[must_use]
    pub fn get_description(self) -> &'static str {
        match self {
            Self::Requested => "Loan is waiting for approval",
            Self::Approved => "Book is on loan",
            Self::Declined => "Request was declined",
            Self::Returned => "Book has been returned",
        }
    }

    /// Whether the loan still ties up the book for its borrower
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requested | Self::Approved)
    }

    /// Whether no further transition can leave this status
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Returned)
    }

    /// Lower-case name as stored in documents and reports
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Returned => "returned",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
