use std::fmt;

use thiserror::Error;

use crate::{events::LoanEvent, loan_state::LoanStatus};

/// Names of the document collections, used to report which lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// `books`
    Books,
    /// `users`
    Users,
    /// `borrowing`
    Borrowing,
    /// `users/{id}/notifications`
    Notifications,
    /// `activity_log`
    ActivityLog,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Books => "books",
            Self::Users => "users",
            Self::Borrowing => "borrowing",
            Self::Notifications => "notifications",
            Self::ActivityLog => "activity_log",
        };
        f.write_str(name)
    }
}

/// Errors raised by the lending service and its store
#[derive(Debug, Error)]
pub enum LendingError {
    /// The requested transition is not valid for the loan's current status
    #[error("cannot process event {event:?} from current status {from:?}")]
    InvalidTransition {
        /// Status the loan was in
        from: LoanStatus,
        /// Event that was rejected
        event: LoanEvent,
    },
    /// A document the operation depends on does not exist
    #[error("{collection} document {id} not found")]
    NotFound {
        /// Collection that was searched
        collection: Collection,
        /// Identifier that was looked up
        id: String,
    },
    /// A document with the same identifier already exists
    #[error("{collection} document {id} already exists")]
    AlreadyExists {
        /// Collection that was written
        collection: Collection,
        /// Conflicting identifier
        id: String,
    },
    /// The user already has an open request or loan for this book
    #[error("book {book_id} is already requested or borrowed by user {user_id}")]
    AlreadyRequested {
        /// Book that was requested
        book_id: String,
        /// Requesting user
        user_id: String,
    },
    /// The book is on loan and cannot be lent or removed
    #[error("book {book_id} is currently borrowed")]
    BookUnavailable {
        /// Book that is on loan
        book_id: String,
    },
    /// The user still holds borrowed books
    #[error("user {user_id} still has {count} borrowed book(s)")]
    UserHasLoans {
        /// Account that was to be removed
        user_id: String,
        /// Approved loans not yet returned
        count: usize,
    },
    /// Caller supplied an unusable value
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Error occurred while saving state
    #[error("persistence error: {0}")]
    Persistence(String),
    /// Error occurred while loading state
    #[error("load error: {0}")]
    Load(String),
    /// Configuration could not be read or is inconsistent
    #[error("config error: {0}")]
    Config(String),
}

impl LendingError {
    /// Shorthand for a [`LendingError::NotFound`]
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound { collection, id: id.into() }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = LendingError> = std::result::Result<T, E>;
