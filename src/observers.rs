use parking_lot::Mutex;
use tracing::info;

use crate::{
    lifecycle::StateTransition,
    model::{ActivityEntry, BookId, BookStatus, LoanId, NotificationId, NotificationKind, UserId},
};

/// Something the lending service changed, reported after it was committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A student filed a new request
    LoanRequested {
        /// New borrowing record
        loan_id: LoanId,
        /// Requested book
        book_id: BookId,
        /// Requesting student
        user_id: UserId,
    },
    /// A borrowing record moved through the lifecycle
    LoanTransitioned(StateTransition),
    /// A book was lent out or came back
    BookStatusChanged {
        /// Affected book
        book_id: BookId,
        /// Status before
        from: BookStatus,
        /// Status after
        to: BookStatus,
    },
    /// A book was added, edited or removed
    CatalogChanged {
        /// Affected book
        book_id: BookId,
    },
    /// A user was registered or removed
    UsersChanged {
        /// Affected user
        user_id: UserId,
    },
    /// A notification landed in a user's inbox
    NotificationDelivered {
        /// Recipient
        user_id: UserId,
        /// New notification
        notification_id: NotificationId,
        /// Notification type
        kind: NotificationKind,
    },
    /// A user's unread notifications were flagged as read
    NotificationsRead {
        /// Inbox owner
        user_id: UserId,
        /// How many flipped
        count: usize,
    },
    /// An activity log entry was appended
    ActivityRecorded(ActivityEntry),
}

/// Trait for change observation
pub trait LendingObserver: Send + Sync {
    /// Called once per committed change, in commit order
    fn on_change(&self, change: &Change);
}

/// Logs every change through `tracing`
#[derive(Debug)]
pub struct TransitionLogger;

impl LendingObserver for TransitionLogger {
    fn on_change(&self, change: &Change) {
        match change {
            Change::LoanTransitioned(transition) => {
                info!(
                    loan_id = %transition.loan_id,
                    from = %transition.from,
                    to = %transition.to,
                    event = %transition.event,
                    "loan transition"
                );
            }
            Change::BookStatusChanged { book_id, from, to } => {
                info!(%book_id, %from, %to, "book status changed");
            }
            Change::ActivityRecorded(entry) => {
                info!(kind = ?entry.kind, message = %entry.message, "activity");
            }
            other => info!(change = ?other, "change"),
        }
    }
}

/// Keeps every change it sees, for callers that poll instead of reacting
#[derive(Debug, Default)]
pub struct ChangeLog {
    /// Changes in arrival order
    changes: Mutex<Vec<Change>>,
}

impl ChangeLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<Change> {
        std::mem::take(&mut *self.changes.lock())
    }

    /// Copy of everything recorded so far
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.changes.lock().clone()
    }
}

impl LendingObserver for ChangeLog {
    fn on_change(&self, change: &Change) {
        self.changes.lock().push(change.clone());
    }
}

impl<O: LendingObserver + ?Sized> LendingObserver for std::sync::Arc<O> {
    fn on_change(&self, change: &Change) {
        (**self).on_change(change);
    }
}
