//! Documents stored in the lending collections.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loan_state::LoanStatus;

/// Defines an opaque string identifier for one document collection
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Allocate a fresh random identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Borrow the raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a document in `books`
    BookId
);
string_id!(
    /// Identifier of a document in `users`, equal to the auth uid
    UserId
);
string_id!(
    /// Identifier of a document in `borrowing`
    LoanId
);
string_id!(
    /// Identifier of a document in `users/{id}/notifications`
    NotificationId
);
string_id!(
    /// Identifier of a document in `activity_log`
    ActivityId
);

/// Whether a book can currently be lent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// On the shelf
    #[default]
    Available,
    /// Handed out on an approved loan
    Borrowed,
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("available"),
            Self::Borrowed => f.write_str("borrowed"),
        }
    }
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Document id
    pub id: BookId,
    /// Title shown to readers
    pub title: String,
    /// Author name
    pub author: String,
    /// Genre used for filtering
    pub category: String,
    /// ISBN as entered
    pub isbn: String,
    /// Link to a cover picture, may be empty
    pub cover_image_url: String,
    /// Lending status
    pub status: BookStatus,
    /// When the book entered the catalog
    pub added_at: DateTime<Utc>,
}

/// Editable catalog fields of a book
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    /// Title shown to readers
    pub title: String,
    /// Author name
    pub author: String,
    /// Genre used for filtering
    pub category: String,
    /// ISBN as entered
    pub isbn: String,
    /// Link to a cover picture, may be empty
    #[serde(default)]
    pub cover_image_url: String,
}

impl BookDetails {
    /// Build details without a cover picture
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        isbn: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            category: category.into(),
            isbn: isbn.into(),
            cover_image_url: String::new(),
        }
    }
}

impl Book {
    /// Create an available book from catalog details
    #[must_use]
    pub fn from_details(id: BookId, details: BookDetails, added_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: details.title,
            author: details.author,
            category: details.category,
            isbn: details.isbn,
            cover_image_url: details.cover_image_url,
            status: BookStatus::Available,
            added_at,
        }
    }

    /// Overwrite the catalog fields, keeping status and timestamps
    pub fn apply_details(&mut self, details: BookDetails) {
        self.title = details.title;
        self.author = details.author;
        self.category = details.category;
        self.isbn = details.isbn;
        self.cover_image_url = details.cover_image_url;
    }
}

/// Account role, fixed at creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages the catalog and approves loans
    Admin,
    /// Borrows books
    #[default]
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Student => f.write_str("student"),
        }
    }
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Auth uid, also the document id
    pub uid: UserId,
    /// Sign-in email
    pub email: String,
    /// Account role
    pub role: Role,
    /// Short display code, six upper-case hex digits
    pub unique_id: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// A borrowing record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    /// Document id
    pub id: LoanId,
    /// Borrowed book
    pub book_id: BookId,
    /// Book title at request time
    pub book_title: String,
    /// Borrower
    pub user_id: UserId,
    /// Borrower email at request time
    pub user_email: String,
    /// Lifecycle status
    pub status: LoanStatus,
    /// When the student asked for the book
    pub request_date: DateTime<Utc>,
    /// Set on approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Set on return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    /// Whether the loan is approved and its due date lies before `now`
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Approved && self.due_date.is_some_and(|due| due < now)
    }
}

/// What a notification is about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Free-text notice sent by an admin
    #[default]
    Notice,
    /// Overdue fine for a loan
    FineNotice,
}

/// A message in a user's notification inbox
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Document id
    pub id: NotificationId,
    /// Text shown to the user
    pub message: String,
    /// When the notification was created
    pub timestamp: DateTime<Utc>,
    /// Whether the user opened their inbox since
    pub read: bool,
    /// Notification type
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Loan the fine refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<LoanId>,
    /// Fine amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Title of the fined book
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
}

impl Notification {
    /// Unread free-text notice
    pub fn notice(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::generate(),
            message: message.into(),
            timestamp,
            read: false,
            kind: NotificationKind::Notice,
            loan_id: None,
            amount: None,
            book_title: None,
        }
    }

    /// Whether this is the fine notice for `loan_id`
    #[must_use]
    pub fn is_fine_for(&self, loan_id: &LoanId) -> bool {
        self.kind == NotificationKind::FineNotice && self.loan_id.as_ref() == Some(loan_id)
    }
}

/// Category of an activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Book added to the catalog
    BookAdd,
    /// Catalog fields edited
    BookUpdate,
    /// Book removed from the catalog
    BookDelete,
    /// Account created
    UserRegister,
    /// Account removed
    UserRemove,
    /// Student asked for a book
    BookRequest,
    /// Admin approved a request
    LoanApproved,
    /// Admin declined a request
    LoanDeclined,
    /// Student returned a book
    BookReturn,
    /// Admin sent a notice
    NoticeSent,
    /// Fine job produced notices
    FineCalculation,
}

/// Append-only audit entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActivityEntry {
    /// Document id
    pub id: ActivityId,
    /// Human-readable description
    pub message: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Entry type
    #[serde(rename = "type")]
    pub kind: ActivityKind,
}

impl ActivityEntry {
    /// New entry with a fresh id
    pub fn new(kind: ActivityKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { id: ActivityId::generate(), message: message.into(), timestamp, kind }
    }
}
