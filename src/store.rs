//! Document collections, batched writes and transactions.
//!
//! [`StoreRead`] and [`DocumentStore`] describe what the lending service needs
//! from a backend; [`MemoryStore`] is the in-process implementation.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Collection, LendingError, Result},
    model::{
        ActivityEntry, Book, BookDetails, BookId, BookStatus, Loan, LoanId, Notification,
        NotificationId, User, UserId,
    },
};

/// Read access to the collections
pub trait StoreRead {
    /// Look up a book
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn book(&self, id: &BookId) -> Result<Option<Book>>;

    /// Every book
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn books(&self) -> Result<Vec<Book>>;

    /// Look up a user
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn user(&self, id: &UserId) -> Result<Option<User>>;

    /// Every user
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn users(&self) -> Result<Vec<User>>;

    /// Look up a borrowing record
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn loan(&self, id: &LoanId) -> Result<Option<Loan>>;

    /// Every borrowing record
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn loans(&self) -> Result<Vec<Loan>>;

    /// Inbox of one user; empty for unknown users
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn notifications(&self, user: &UserId) -> Result<Vec<Notification>>;

    /// The activity log in append order
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    fn activity(&self) -> Result<Vec<ActivityEntry>>;
}

/// A store that can apply writes atomically
pub trait DocumentStore: StoreRead + Send + Sync {
    /// Apply every operation of `batch`, or none of them
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` if an update or delete targets a
    /// missing document; nothing is written in that case
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Run `f` against a consistent view and apply the writes it stages
    ///
    /// Reads inside the closure observe the state at the start of the
    /// transaction, not the transaction's own staged writes. When `f` fails
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or the commit error of the staged batch
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>;
}

/// A single write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite a book
    PutBook(Book),
    /// Replace the catalog fields of an existing book
    UpdateBookDetails {
        /// Target book
        id: BookId,
        /// New catalog fields
        details: BookDetails,
    },
    /// Change the lending status of an existing book
    SetBookStatus {
        /// Target book
        id: BookId,
        /// New status
        status: BookStatus,
    },
    /// Remove an existing book
    DeleteBook(BookId),
    /// Create or overwrite a user
    PutUser(User),
    /// Remove an existing user and their inbox
    DeleteUser(UserId),
    /// Create or overwrite a borrowing record
    PutLoan(Loan),
    /// Replace an existing borrowing record
    UpdateLoan(Loan),
    /// Add a notification to a user's inbox
    PutNotification {
        /// Inbox owner
        user: UserId,
        /// New notification
        notification: Notification,
    },
    /// Flag an existing notification as read
    MarkNotificationRead {
        /// Inbox owner
        user: UserId,
        /// Target notification
        id: NotificationId,
    },
    /// Append to the activity log
    AppendActivity(ActivityEntry),
}

/// Ordered list of writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    /// Pending operations
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Empty batch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue any operation
    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Queue a book creation
    pub fn put_book(&mut self, book: Book) -> &mut Self {
        self.push(WriteOp::PutBook(book))
    }

    /// Queue a catalog edit
    pub fn update_book_details(&mut self, id: BookId, details: BookDetails) -> &mut Self {
        self.push(WriteOp::UpdateBookDetails { id, details })
    }

    /// Queue a book status change
    pub fn set_book_status(&mut self, id: BookId, status: BookStatus) -> &mut Self {
        self.push(WriteOp::SetBookStatus { id, status })
    }

    /// Queue a book removal
    pub fn delete_book(&mut self, id: BookId) -> &mut Self {
        self.push(WriteOp::DeleteBook(id))
    }

    /// Queue a user creation
    pub fn put_user(&mut self, user: User) -> &mut Self {
        self.push(WriteOp::PutUser(user))
    }

    /// Queue a user removal
    pub fn delete_user(&mut self, id: UserId) -> &mut Self {
        self.push(WriteOp::DeleteUser(id))
    }

    /// Queue a borrowing record creation
    pub fn put_loan(&mut self, loan: Loan) -> &mut Self {
        self.push(WriteOp::PutLoan(loan))
    }

    /// Queue a borrowing record replacement
    pub fn update_loan(&mut self, loan: Loan) -> &mut Self {
        self.push(WriteOp::UpdateLoan(loan))
    }

    /// Queue a notification delivery
    pub fn put_notification(&mut self, user: UserId, notification: Notification) -> &mut Self {
        self.push(WriteOp::PutNotification { user, notification })
    }

    /// Queue a read flag flip
    pub fn mark_notification_read(&mut self, user: UserId, id: NotificationId) -> &mut Self {
        self.push(WriteOp::MarkNotificationRead { user, id })
    }

    /// Queue an activity log entry
    pub fn append_activity(&mut self, entry: ActivityEntry) -> &mut Self {
        self.push(WriteOp::AppendActivity(entry))
    }

    /// Number of queued operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in order
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Read view and staged writes of one transaction
pub struct Transaction<'a> {
    /// State at the start of the transaction
    reader: &'a dyn StoreRead,
    /// Writes applied when the closure succeeds
    writes: WriteBatch,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("writes", &self.writes).finish_non_exhaustive()
    }
}

impl Transaction<'_> {
    /// Open a transaction reading from `reader`
    pub fn begin(reader: &dyn StoreRead) -> Transaction<'_> {
        Transaction { reader, writes: WriteBatch::new() }
    }

    /// Consistent read view
    #[must_use]
    pub fn read(&self) -> &dyn StoreRead {
        self.reader
    }

    /// Batch the transaction will commit
    pub fn write(&mut self) -> &mut WriteBatch {
        &mut self.writes
    }

    /// Give up the read view, keeping the staged writes
    #[must_use]
    pub fn into_batch(self) -> WriteBatch {
        self.writes
    }
}

/// Every collection, as held in memory and written to snapshots
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collections {
    /// `books`
    books: BTreeMap<BookId, Book>,
    /// `users`
    users: BTreeMap<UserId, User>,
    /// `borrowing`
    borrowing: BTreeMap<LoanId, Loan>,
    /// `users/{id}/notifications`
    notifications: BTreeMap<UserId, BTreeMap<NotificationId, Notification>>,
    /// `activity_log`
    activity_log: Vec<ActivityEntry>,
}

impl Collections {
    /// Apply `batch` on a copy and keep the copy only if every operation succeeded
    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        let count = batch.len();
        let mut staged = self.clone();
        for op in batch {
            staged.apply_op(op)?;
        }
        *self = staged;
        debug!(operations = count, "committed batch");
        Ok(())
    }

    /// Apply one operation
    fn apply_op(&mut self, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::PutBook(book) => {
                self.books.insert(book.id.clone(), book);
            }
            WriteOp::UpdateBookDetails { id, details } => {
                self.books
                    .get_mut(&id)
                    .ok_or_else(|| LendingError::not_found(Collection::Books, id.as_str()))?
                    .apply_details(details);
            }
            WriteOp::SetBookStatus { id, status } => {
                self.books
                    .get_mut(&id)
                    .ok_or_else(|| LendingError::not_found(Collection::Books, id.as_str()))?
                    .status = status;
            }
            WriteOp::DeleteBook(id) => {
                self.books
                    .remove(&id)
                    .ok_or_else(|| LendingError::not_found(Collection::Books, id.as_str()))?;
            }
            WriteOp::PutUser(user) => {
                self.users.insert(user.uid.clone(), user);
            }
            WriteOp::DeleteUser(id) => {
                self.users
                    .remove(&id)
                    .ok_or_else(|| LendingError::not_found(Collection::Users, id.as_str()))?;
                self.notifications.remove(&id);
            }
            WriteOp::PutLoan(loan) => {
                self.borrowing.insert(loan.id.clone(), loan);
            }
            WriteOp::UpdateLoan(loan) => {
                let slot = self.borrowing.get_mut(&loan.id).ok_or_else(|| {
                    LendingError::not_found(Collection::Borrowing, loan.id.as_str())
                })?;
                *slot = loan;
            }
            WriteOp::PutNotification { user, notification } => {
                if !self.users.contains_key(&user) {
                    return Err(LendingError::not_found(Collection::Users, user.as_str()));
                }
                self.notifications
                    .entry(user)
                    .or_default()
                    .insert(notification.id.clone(), notification);
            }
            WriteOp::MarkNotificationRead { user, id } => {
                self.notifications
                    .get_mut(&user)
                    .and_then(|inbox| inbox.get_mut(&id))
                    .ok_or_else(|| LendingError::not_found(Collection::Notifications, id.as_str()))?
                    .read = true;
            }
            WriteOp::AppendActivity(entry) => self.activity_log.push(entry),
        }
        Ok(())
    }
}

impl StoreRead for Collections {
    fn book(&self, id: &BookId) -> Result<Option<Book>> {
        Ok(self.books.get(id).cloned())
    }

    fn books(&self) -> Result<Vec<Book>> {
        Ok(self.books.values().cloned().collect())
    }

    fn user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.get(id).cloned())
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.values().cloned().collect())
    }

    fn loan(&self, id: &LoanId) -> Result<Option<Loan>> {
        Ok(self.borrowing.get(id).cloned())
    }

    fn loans(&self) -> Result<Vec<Loan>> {
        Ok(self.borrowing.values().cloned().collect())
    }

    fn notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .get(user)
            .map(|inbox| inbox.values().cloned().collect())
            .unwrap_or_default())
    }

    fn activity(&self) -> Result<Vec<ActivityEntry>> {
        Ok(self.activity_log.clone())
    }
}

/// In-process document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// All collections behind one lock
    inner: Mutex<Collections>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `collections`
    #[must_use]
    pub fn from_collections(collections: Collections) -> Self {
        Self { inner: Mutex::new(collections) }
    }

    /// Copy of every collection
    #[must_use]
    pub fn snapshot(&self) -> Collections {
        self.inner.lock().clone()
    }
}

impl StoreRead for MemoryStore {
    fn book(&self, id: &BookId) -> Result<Option<Book>> {
        self.inner.lock().book(id)
    }

    fn books(&self) -> Result<Vec<Book>> {
        self.inner.lock().books()
    }

    fn user(&self, id: &UserId) -> Result<Option<User>> {
        self.inner.lock().user(id)
    }

    fn users(&self) -> Result<Vec<User>> {
        self.inner.lock().users()
    }

    fn loan(&self, id: &LoanId) -> Result<Option<Loan>> {
        self.inner.lock().loan(id)
    }

    fn loans(&self) -> Result<Vec<Loan>> {
        self.inner.lock().loans()
    }

    fn notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        self.inner.lock().notifications(user)
    }

    fn activity(&self) -> Result<Vec<ActivityEntry>> {
        self.inner.lock().activity()
    }
}

impl DocumentStore for MemoryStore {
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.inner.lock().apply(batch)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut collections = self.inner.lock();
        let mut tx = Transaction::begin(&*collections);
        let value = f(&mut tx)?;
        let batch = tx.into_batch();
        collections.apply(batch)?;
        Ok(value)
    }
}
