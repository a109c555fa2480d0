//! The lending service: every operation of the admin console and the
//! student dashboard, expressed against an explicit [`DocumentStore`].

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::{
    catalog,
    clock::{Clock, SystemClock},
    config::LendingPolicy,
    error::{Collection, LendingError, Result},
    events::LoanEvent,
    fines::{self, FineAssessment},
    lifecycle::{LoanLifecycle, StateTransition},
    loan_state::LoanStatus,
    model::{
        ActivityEntry, ActivityKind, Book, BookDetails, BookId, BookStatus, Loan, LoanId,
        Notification, NotificationKind, Role, User, UserId,
    },
    observers::{Change, LendingObserver},
    report,
    store::{DocumentStore, StoreRead, Transaction, WriteBatch},
};

/// Recipients of an admin notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeTarget {
    /// Every student account
    AllStudents,
    /// One account
    User(UserId),
}

/// Catalog-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    /// Books in the catalog
    pub total_books: usize,
    /// Registered accounts
    pub total_users: usize,
    /// Approved loans
    pub books_on_loan: usize,
}

/// Counters shown on a student's dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    /// Approved loans
    pub currently_borrowed: usize,
    /// Returned loans
    pub books_read: usize,
    /// Approved loans due within the due-soon window
    pub due_soon: usize,
    /// Approved loans past their due date
    pub overdue: usize,
    /// Loans returned during the current calendar month
    pub returned_this_month: usize,
}

/// Request, return and sign-up entries shown in the admin alert feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAlerts {
    /// Matching activity entries, newest first
    pub entries: Vec<ActivityEntry>,
    /// Entries newer than the last time the feed was viewed
    pub unread: usize,
}

impl AdminAlerts {
    /// Whether the feed shows the unread marker
    #[must_use]
    pub fn has_unread(&self) -> bool {
        self.unread > 0
    }

    /// Newest unread entry, if any
    #[must_use]
    pub fn newest_unread(&self) -> Option<&ActivityEntry> {
        if self.has_unread() { self.entries.first() } else { None }
    }
}

/// A fine notice created by a fine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedFine {
    /// Fined loan
    pub loan_id: LoanId,
    /// Borrower
    pub user_id: UserId,
    /// Days late and amount
    pub assessment: FineAssessment,
}

/// Result of [`LendingService::calculate_fines`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineRun {
    /// Notices created by this run
    pub issued: Vec<IssuedFine>,
}

impl FineRun {
    /// Number of notices created
    #[must_use]
    pub fn notified(&self) -> usize {
        self.issued.len()
    }
}

/// Lending operations over a document store
pub struct LendingService<S, C = SystemClock> {
    /// Backing collections
    store: S,
    /// Time source
    clock: C,
    /// Lending thresholds
    policy: LendingPolicy,
    /// Allowed loan transitions
    lifecycle: LoanLifecycle,
    /// Registered change observers
    observers: Vec<Box<dyn LendingObserver>>,
}

impl<S: fmt::Debug, C: fmt::Debug> fmt::Debug for LendingService<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LendingService")
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("lifecycle", &self.lifecycle)
            .field("observers_count", &self.observers.len())
            .finish()
    }
}

/// Fetch a book or fail with `NotFound`
fn require_book(reader: &(impl StoreRead + ?Sized), id: &BookId) -> Result<Book> {
    reader.book(id)?.ok_or_else(|| LendingError::not_found(Collection::Books, id.as_str()))
}

/// Fetch a user or fail with `NotFound`
fn require_user(reader: &(impl StoreRead + ?Sized), id: &UserId) -> Result<User> {
    reader.user(id)?.ok_or_else(|| LendingError::not_found(Collection::Users, id.as_str()))
}

/// Fetch a loan or fail with `NotFound`
fn require_loan(reader: &(impl StoreRead + ?Sized), id: &LoanId) -> Result<Loan> {
    reader.loan(id)?.ok_or_else(|| LendingError::not_found(Collection::Borrowing, id.as_str()))
}

/// Six upper-case hex digits shown next to a user's email
fn generate_unique_id() -> String {
    let code: u32 = rand::rng().random_range(0..0x0100_0000);
    format!("{code:06X}")
}

/// Reject blank free-text input
fn require_text(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LendingError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(())
}

impl<S: DocumentStore, C: Clock> LendingService<S, C> {
    /// Create a service over `store`
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Config` if `policy` is invalid
    pub fn new(store: S, clock: C, policy: LendingPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            store,
            clock,
            policy,
            lifecycle: LoanLifecycle::standard(),
            observers: Vec::new(),
        })
    }

    /// Register an observer to be notified of committed changes
    pub fn register_observer(&mut self, observer: Box<dyn LendingObserver>) {
        self.observers.push(observer);
    }

    /// Backing store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Time source
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Active thresholds
    #[must_use]
    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// Allowed loan transitions
    #[must_use]
    pub fn lifecycle(&self) -> &LoanLifecycle {
        &self.lifecycle
    }

    /// Hand committed changes to every observer, in registration order
    fn publish(&self, changes: &[Change]) {
        for change in changes {
            for observer in &self.observers {
                observer.on_change(change);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Catalog

    /// Add a book to the catalog as available
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidInput` for a blank title, or a store error
    pub fn add_book(&self, details: BookDetails) -> Result<Book> {
        require_text(&details.title, "title")?;
        let now = self.clock.now();
        let book = Book::from_details(BookId::generate(), details, now);
        let entry = ActivityEntry::new(
            ActivityKind::BookAdd,
            format!("New book added: '{}'", book.title),
            now,
        );

        let mut batch = WriteBatch::new();
        batch.put_book(book.clone()).append_activity(entry.clone());
        self.store.commit(batch)?;

        info!(book_id = %book.id, title = %book.title, "book added");
        self.publish(&[
            Change::CatalogChanged { book_id: book.id.clone() },
            Change::ActivityRecorded(entry),
        ]);
        Ok(book)
    }

    /// Replace the catalog fields of a book; its lending status is untouched
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown book,
    /// `LendingError::InvalidInput` for a blank title
    pub fn update_book(&self, id: &BookId, details: BookDetails) -> Result<Book> {
        require_text(&details.title, "title")?;
        let now = self.clock.now();

        let (book, entry) = self.store.transaction(|tx| {
            let mut book = require_book(tx.read(), id)?;
            book.apply_details(details.clone());
            let entry = ActivityEntry::new(
                ActivityKind::BookUpdate,
                format!("Book updated: '{}'", book.title),
                now,
            );
            tx.write().update_book_details(id.clone(), details).append_activity(entry.clone());
            Ok((book, entry))
        })?;

        info!(book_id = %id, "book updated");
        self.publish(&[Change::CatalogChanged { book_id: id.clone() }, Change::ActivityRecorded(entry)]);
        Ok(book)
    }

    /// Remove a book that is not on loan
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown book,
    /// `LendingError::BookUnavailable` while it is borrowed
    pub fn delete_book(&self, id: &BookId) -> Result<()> {
        let now = self.clock.now();

        let entry = self.store.transaction(|tx| {
            let book = require_book(tx.read(), id)?;
            if book.status == BookStatus::Borrowed {
                warn!(book_id = %id, "refusing to delete a borrowed book");
                return Err(LendingError::BookUnavailable { book_id: id.to_string() });
            }
            let entry = ActivityEntry::new(
                ActivityKind::BookDelete,
                format!("Book removed: '{}'", book.title),
                now,
            );
            tx.write().delete_book(id.clone()).append_activity(entry.clone());
            Ok(entry)
        })?;

        info!(book_id = %id, "book deleted");
        self.publish(&[Change::CatalogChanged { book_id: id.clone() }, Change::ActivityRecorded(entry)]);
        Ok(())
    }

    /// Look up one book
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown book
    pub fn get_book(&self, id: &BookId) -> Result<Book> {
        require_book(&self.store, id)
    }

    /// Every book, most recently added first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let mut books = self.store.books()?;
        books.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(books)
    }

    /// Fill an empty catalog with the sample books
    ///
    /// Returns how many books were inserted; zero when the catalog already
    /// has books.
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn seed_catalog(&self) -> Result<usize> {
        let now = self.clock.now();

        let books = self.store.transaction(|tx| {
            if !tx.read().books()?.is_empty() {
                return Ok(Vec::new());
            }
            let books: Vec<Book> = catalog::sample_books()
                .into_iter()
                .map(|details| Book::from_details(BookId::generate(), details, now))
                .collect();
            for book in &books {
                tx.write().put_book(book.clone());
            }
            Ok(books)
        })?;

        if !books.is_empty() {
            info!(count = books.len(), "seeded catalog");
            let changes: Vec<Change> =
                books.iter().map(|b| Change::CatalogChanged { book_id: b.id.clone() }).collect();
            self.publish(&changes);
        }
        Ok(books.len())
    }

    /// Books a student can browse: not currently lent to them, matching
    /// `query` on title or author (case-insensitive) and `category` exactly
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn search_books(
        &self,
        user: &UserId,
        query: &str,
        category: Option<&str>,
    ) -> Result<Vec<Book>> {
        let loans = self.store.loans()?;
        let borrowed: HashSet<&BookId> = loans
            .iter()
            .filter(|l| l.user_id == *user && l.status == LoanStatus::Approved)
            .map(|l| &l.book_id)
            .collect();
        let needle = query.trim().to_lowercase();

        let books = self
            .list_books()?
            .into_iter()
            .filter(|b| !borrowed.contains(&b.id))
            .filter(|b| {
                needle.is_empty()
                    || b.title.to_lowercase().contains(&needle)
                    || b.author.to_lowercase().contains(&needle)
            })
            .filter(|b| category.is_none_or(|c| b.category == c))
            .collect();
        Ok(books)
    }

    /// Distinct categories, sorted
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> =
            self.store.books()?.into_iter().map(|b| b.category).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    // ---------------------------------------------------------------------
    // Users

    /// Create the user document for a freshly signed-up student
    ///
    /// # Errors
    ///
    /// Returns `LendingError::AlreadyExists` for a taken uid,
    /// `LendingError::InvalidInput` for an unusable email
    pub fn register_student(&self, uid: UserId, email: &str) -> Result<User> {
        self.register(uid, email, Role::Student)
    }

    /// Create an admin account
    ///
    /// # Errors
    ///
    /// Same as [`LendingService::register_student`]
    pub fn register_admin(&self, uid: UserId, email: &str) -> Result<User> {
        self.register(uid, email, Role::Admin)
    }

    /// Create a user document with `role`
    fn register(&self, uid: UserId, email: &str, role: Role) -> Result<User> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(LendingError::InvalidInput(format!("'{email}' is not an email address")));
        }
        let now = self.clock.now();
        let user = User {
            uid,
            email: email.to_string(),
            role,
            unique_id: generate_unique_id(),
            created_at: now,
        };

        let entry = self.store.transaction(|tx| {
            if tx.read().user(&user.uid)?.is_some() {
                return Err(LendingError::AlreadyExists {
                    collection: Collection::Users,
                    id: user.uid.to_string(),
                });
            }
            let entry = ActivityEntry::new(
                ActivityKind::UserRegister,
                format!("New {role} registered: {}", user.email),
                now,
            );
            tx.write().put_user(user.clone()).append_activity(entry.clone());
            Ok(entry)
        })?;

        info!(uid = %user.uid, %role, "user registered");
        self.publish(&[Change::UsersChanged { user_id: user.uid.clone() }, Change::ActivityRecorded(entry)]);
        Ok(user)
    }

    /// Remove an account and its notifications
    ///
    /// Pending requests of the account are declined in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown user,
    /// `LendingError::UserHasLoans` while the user still holds borrowed books
    pub fn remove_user(&self, uid: &UserId) -> Result<()> {
        let now = self.clock.now();

        let (declined, entry) = self.store.transaction(|tx| {
            let user = require_user(tx.read(), uid)?;
            let loans: Vec<Loan> =
                tx.read().loans()?.into_iter().filter(|l| l.user_id == *uid).collect();

            let borrowed = loans.iter().filter(|l| l.status == LoanStatus::Approved).count();
            if borrowed > 0 {
                warn!(%uid, borrowed, "user still holds borrowed books");
                return Err(LendingError::UserHasLoans { user_id: uid.to_string(), count: borrowed });
            }

            let mut declined = Vec::new();
            for mut loan in loans.into_iter().filter(|l| l.status == LoanStatus::Requested) {
                let from = loan.status;
                loan.status = self.lifecycle.next(from, LoanEvent::Decline)?;
                declined.push(StateTransition {
                    loan_id: loan.id.clone(),
                    from,
                    to: loan.status,
                    event: LoanEvent::Decline,
                    timestamp: now,
                });
                tx.write().update_loan(loan);
            }

            let entry = ActivityEntry::new(
                ActivityKind::UserRemove,
                format!("User removed: {}", user.email),
                now,
            );
            tx.write().delete_user(uid.clone()).append_activity(entry.clone());
            Ok((declined, entry))
        })?;

        info!(%uid, declined = declined.len(), "user removed");
        let mut changes: Vec<Change> = declined.into_iter().map(Change::LoanTransitioned).collect();
        changes.push(Change::UsersChanged { user_id: uid.clone() });
        changes.push(Change::ActivityRecorded(entry));
        self.publish(&changes);
        Ok(())
    }

    /// Look up one user
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown user
    pub fn get_user(&self, uid: &UserId) -> Result<User> {
        require_user(&self.store, uid)
    }

    /// Every user, newest first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut users = self.store.users()?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    /// Student accounts, newest first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn students(&self) -> Result<Vec<User>> {
        Ok(self.list_users()?.into_iter().filter(|u| u.role == Role::Student).collect())
    }

    // ---------------------------------------------------------------------
    // Borrowing lifecycle

    /// File a borrow request for `book_id` on behalf of `user_id`
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown user or book,
    /// `LendingError::AlreadyRequested` when the user already has an open
    /// request or loan for the book
    pub fn request_loan(&self, user_id: &UserId, book_id: &BookId) -> Result<Loan> {
        let now = self.clock.now();

        let (loan, entry) = self.store.transaction(|tx| {
            let user = require_user(tx.read(), user_id)?;
            let book = require_book(tx.read(), book_id)?;

            let duplicate = tx.read().loans()?.into_iter().any(|l| {
                l.user_id == *user_id && l.book_id == *book_id && l.status.is_active()
            });
            if duplicate {
                warn!(%user_id, %book_id, "already requested or currently borrowed");
                return Err(LendingError::AlreadyRequested {
                    book_id: book_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }

            let loan = Loan {
                id: LoanId::generate(),
                book_id: book.id,
                book_title: book.title,
                user_id: user.uid,
                user_email: user.email,
                status: LoanStatus::Requested,
                request_date: now,
                due_date: None,
                return_date: None,
            };
            let entry = ActivityEntry::new(
                ActivityKind::BookRequest,
                format!("{} requested to borrow '{}'", loan.user_email, loan.book_title),
                now,
            );
            tx.write().put_loan(loan.clone()).append_activity(entry.clone());
            Ok((loan, entry))
        })?;

        info!(loan_id = %loan.id, %user_id, %book_id, "loan requested");
        self.publish(&[
            Change::LoanRequested {
                loan_id: loan.id.clone(),
                book_id: loan.book_id.clone(),
                user_id: loan.user_id.clone(),
            },
            Change::ActivityRecorded(entry),
        ]);
        Ok(loan)
    }

    /// Apply `event` to a loan inside one transaction
    ///
    /// `apply` sees the loan with its new status already set, may stage
    /// further writes, and returns the changes to publish besides the
    /// transition itself.
    fn transition<F>(&self, loan_id: &LoanId, event: LoanEvent, apply: F) -> Result<Loan>
    where
        F: FnOnce(&mut Transaction<'_>, &mut Loan, DateTime<Utc>) -> Result<Vec<Change>>,
    {
        let now = self.clock.now();

        let (loan, transition, extra) = self.store.transaction(|tx| {
            let mut loan = require_loan(tx.read(), loan_id)?;
            let from = loan.status;
            let to = self.lifecycle.next(from, event).inspect_err(|_| {
                warn!(%loan_id, %from, %event, "rejected loan transition");
            })?;
            loan.status = to;

            let extra = apply(tx, &mut loan, now)?;
            tx.write().update_loan(loan.clone());

            let transition =
                StateTransition { loan_id: loan.id.clone(), from, to, event, timestamp: now };
            Ok((loan, transition, extra))
        })?;

        info!(%loan_id, from = %transition.from, to = %transition.to, "loan transitioned");
        let mut changes = vec![Change::LoanTransitioned(transition)];
        changes.extend(extra);
        self.publish(&changes);
        Ok(loan)
    }

    /// Approve a request: set the due date and mark the book borrowed,
    /// both in one atomic write
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown loan or book,
    /// `LendingError::InvalidTransition` unless the loan is `requested`,
    /// `LendingError::BookUnavailable` when another loan of the book is
    /// already approved
    pub fn approve_loan(&self, loan_id: &LoanId) -> Result<Loan> {
        let period = self.policy.loan_period();

        self.transition(loan_id, LoanEvent::Approve, |tx, loan, now| {
            let book = require_book(tx.read(), &loan.book_id)?;
            let lent_elsewhere = tx.read().loans()?.into_iter().any(|other| {
                other.id != loan.id
                    && other.book_id == loan.book_id
                    && other.status == LoanStatus::Approved
            });
            if lent_elsewhere {
                warn!(book_id = %loan.book_id, "book already lent on another loan");
                return Err(LendingError::BookUnavailable { book_id: loan.book_id.to_string() });
            }

            let due = now.checked_add_signed(period).ok_or_else(|| {
                LendingError::InvalidInput("due date is out of range".to_string())
            })?;
            loan.due_date = Some(due);

            let entry = ActivityEntry::new(
                ActivityKind::LoanApproved,
                format!(
                    "Approved '{}' for {}, due {}",
                    loan.book_title,
                    loan.user_email,
                    due.format("%Y-%m-%d")
                ),
                now,
            );
            tx.write()
                .set_book_status(book.id.clone(), BookStatus::Borrowed)
                .append_activity(entry.clone());

            let mut changes = Vec::new();
            if book.status != BookStatus::Borrowed {
                changes.push(Change::BookStatusChanged {
                    book_id: book.id,
                    from: book.status,
                    to: BookStatus::Borrowed,
                });
            }
            changes.push(Change::ActivityRecorded(entry));
            Ok(changes)
        })
    }

    /// Decline a request; the book is untouched
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown loan,
    /// `LendingError::InvalidTransition` unless the loan is `requested`
    pub fn decline_loan(&self, loan_id: &LoanId) -> Result<Loan> {
        self.transition(loan_id, LoanEvent::Decline, |tx, loan, now| {
            let entry = ActivityEntry::new(
                ActivityKind::LoanDeclined,
                format!("Declined '{}' for {}", loan.book_title, loan.user_email),
                now,
            );
            tx.write().append_activity(entry.clone());
            Ok(vec![Change::ActivityRecorded(entry)])
        })
    }

    /// Return a borrowed book and put it back on the shelf
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` when the loan no longer exists,
    /// `LendingError::InvalidTransition` unless the loan is `approved`
    pub fn return_loan(&self, loan_id: &LoanId) -> Result<Loan> {
        self.transition(loan_id, LoanEvent::Return, |tx, loan, now| {
            loan.return_date = Some(now);

            let mut changes = Vec::new();
            let book = tx.read().book(&loan.book_id)?;
            if let Some(book) = book {
                if book.status == BookStatus::Borrowed {
                    tx.write().set_book_status(book.id.clone(), BookStatus::Available);
                    changes.push(Change::BookStatusChanged {
                        book_id: book.id,
                        from: BookStatus::Borrowed,
                        to: BookStatus::Available,
                    });
                }
            }

            let entry = ActivityEntry::new(
                ActivityKind::BookReturn,
                format!("{} returned '{}'", loan.user_email, loan.book_title),
                now,
            );
            tx.write().append_activity(entry.clone());
            changes.push(Change::ActivityRecorded(entry));
            Ok(changes)
        })
    }

    /// Look up one loan
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotFound` for an unknown loan
    pub fn get_loan(&self, loan_id: &LoanId) -> Result<Loan> {
        require_loan(&self.store, loan_id)
    }

    /// Every loan, most recent request first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn loans(&self) -> Result<Vec<Loan>> {
        let mut loans = self.store.loans()?;
        loans.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        Ok(loans)
    }

    /// Loans of one user, most recent request first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn loans_for_user(&self, user: &UserId) -> Result<Vec<Loan>> {
        Ok(self.loans()?.into_iter().filter(|l| l.user_id == *user).collect())
    }

    /// Requests waiting for an admin decision, most recent first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn pending_requests(&self) -> Result<Vec<Loan>> {
        Ok(self.loans()?.into_iter().filter(|l| l.status == LoanStatus::Requested).collect())
    }

    // ---------------------------------------------------------------------
    // Fines

    /// Issue a fine notice for every eligible overdue loan that has none yet
    ///
    /// Repeated runs never notify the same loan twice.
    ///
    /// # Errors
    ///
    /// Returns a store error; no notice is written in that case
    pub fn calculate_fines(&self) -> Result<FineRun> {
        let now = self.clock.now();
        info!("calculating fines");

        let (run, delivered, entry) = self.store.transaction(|tx| {
            let mut run = FineRun::default();
            let mut delivered = Vec::new();

            let approved =
                tx.read().loans()?.into_iter().filter(|l| l.status == LoanStatus::Approved);
            for loan in approved {
                let Some(assessment) = fines::assess(&loan, now, &self.policy) else {
                    continue;
                };
                if tx.read().user(&loan.user_id)?.is_none() {
                    warn!(loan_id = %loan.id, user_id = %loan.user_id, "borrower no longer exists");
                    continue;
                }
                let already_fined =
                    tx.read().notifications(&loan.user_id)?.iter().any(|n| n.is_fine_for(&loan.id));
                if already_fined {
                    continue;
                }

                let notification = Notification {
                    message: fines::fine_message(assessment.amount, &loan.book_title),
                    kind: NotificationKind::FineNotice,
                    loan_id: Some(loan.id.clone()),
                    amount: Some(assessment.amount),
                    book_title: Some(loan.book_title.clone()),
                    ..Notification::notice(String::new(), now)
                };
                delivered.push(Change::NotificationDelivered {
                    user_id: loan.user_id.clone(),
                    notification_id: notification.id.clone(),
                    kind: NotificationKind::FineNotice,
                });
                tx.write().put_notification(loan.user_id.clone(), notification);
                run.issued.push(IssuedFine { loan_id: loan.id, user_id: loan.user_id, assessment });
            }

            let entry = if run.issued.is_empty() {
                None
            } else {
                let entry = ActivityEntry::new(
                    ActivityKind::FineCalculation,
                    format!(
                        "Fines calculated. {} user(s) received fine notices.",
                        run.notified()
                    ),
                    now,
                );
                tx.write().append_activity(entry.clone());
                Some(entry)
            };
            Ok((run, delivered, entry))
        })?;

        if let Some(entry) = entry {
            info!(notified = run.notified(), "fines calculated");
            let mut changes = delivered;
            changes.push(Change::ActivityRecorded(entry));
            self.publish(&changes);
        } else {
            info!("no overdue users found for fines");
        }
        Ok(run)
    }

    // ---------------------------------------------------------------------
    // Notifications

    /// Send a free-text notice to one user or to every student
    ///
    /// Each recipient gets an independent notification document. Returns
    /// the number of recipients.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidInput` for a blank message,
    /// `LendingError::NotFound` for an unknown target user
    pub fn send_notice(&self, target: &NoticeTarget, message: &str) -> Result<usize> {
        require_text(message, "message")?;
        let now = self.clock.now();

        let (delivered, entry) = self.store.transaction(|tx| {
            let recipients: Vec<UserId> = match target {
                NoticeTarget::AllStudents => tx
                    .read()
                    .users()?
                    .into_iter()
                    .filter(|u| u.role == Role::Student)
                    .map(|u| u.uid)
                    .collect(),
                NoticeTarget::User(uid) => vec![require_user(tx.read(), uid)?.uid],
            };

            let mut delivered = Vec::with_capacity(recipients.len());
            for uid in recipients {
                let notification = Notification::notice(message, now);
                delivered.push(Change::NotificationDelivered {
                    user_id: uid.clone(),
                    notification_id: notification.id.clone(),
                    kind: NotificationKind::Notice,
                });
                tx.write().put_notification(uid, notification);
            }

            let entry = ActivityEntry::new(
                ActivityKind::NoticeSent,
                format!("Notice sent to {} user(s)", delivered.len()),
                now,
            );
            tx.write().append_activity(entry.clone());
            Ok((delivered, entry))
        })?;

        let count = delivered.len();
        info!(recipients = count, "notice sent");
        let mut changes = delivered;
        changes.push(Change::ActivityRecorded(entry));
        self.publish(&changes);
        Ok(count)
    }

    /// A user's notifications, newest first
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        let mut inbox = self.store.notifications(user)?;
        inbox.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(inbox)
    }

    /// Number of unread notifications
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn unread_count(&self, user: &UserId) -> Result<usize> {
        Ok(self.store.notifications(user)?.iter().filter(|n| !n.read).count())
    }

    /// Flag every unread notification of `user` as read; returns how many flipped
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn mark_notifications_read(&self, user: &UserId) -> Result<usize> {
        let count = self.store.transaction(|tx| {
            let unread: Vec<Notification> =
                tx.read().notifications(user)?.into_iter().filter(|n| !n.read).collect();
            for notification in &unread {
                tx.write().mark_notification_read(user.clone(), notification.id.clone());
            }
            Ok(unread.len())
        })?;

        if count > 0 {
            self.publish(&[Change::NotificationsRead { user_id: user.clone(), count }]);
        }
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Statistics, activity and reporting

    /// Catalog-wide counters
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn library_stats(&self) -> Result<LibraryStats> {
        Ok(LibraryStats {
            total_books: self.store.books()?.len(),
            total_users: self.store.users()?.len(),
            books_on_loan: self
                .store
                .loans()?
                .iter()
                .filter(|l| l.status == LoanStatus::Approved)
                .count(),
        })
    }

    /// Dashboard counters of one student
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn user_stats(&self, user: &UserId) -> Result<UserStats> {
        let now = self.clock.now();
        let soon = now.checked_add_signed(self.policy.due_soon_window()).unwrap_or(now);
        let loans = self.loans_for_user(user)?;

        let approved: Vec<&Loan> =
            loans.iter().filter(|l| l.status == LoanStatus::Approved).collect();
        Ok(UserStats {
            currently_borrowed: approved.len(),
            books_read: loans.iter().filter(|l| l.status == LoanStatus::Returned).count(),
            due_soon: approved
                .iter()
                .filter(|l| l.due_date.is_some_and(|due| due > now && due <= soon))
                .count(),
            overdue: approved.iter().filter(|l| l.is_overdue(now)).count(),
            returned_this_month: loans
                .iter()
                .filter(|l| l.status == LoanStatus::Returned)
                .filter_map(|l| l.return_date)
                .filter(|at| at.year() == now.year() && at.month() == now.month())
                .count(),
        })
    }

    /// Newest activity entries; `None` uses the configured limit
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn recent_activity(&self, limit: Option<usize>) -> Result<Vec<ActivityEntry>> {
        let limit = limit.unwrap_or(self.policy.recent_activity_limit);
        // The log is append-only, so append order is time order
        Ok(self.store.activity()?.into_iter().rev().take(limit).collect())
    }

    /// Request, return and sign-up entries among the recent activity
    ///
    /// Entries newer than `since` count as unread; `None` means the feed was
    /// never viewed.
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn admin_alerts(&self, since: Option<DateTime<Utc>>) -> Result<AdminAlerts> {
        let entries: Vec<ActivityEntry> = self
            .recent_activity(None)?
            .into_iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    ActivityKind::BookRequest | ActivityKind::BookReturn | ActivityKind::UserRegister
                )
            })
            .collect();
        let unread = entries.iter().filter(|e| since.is_none_or(|seen| e.timestamp > seen)).count();
        Ok(AdminAlerts { entries, unread })
    }

    /// CSV summary and borrowing history
    ///
    /// # Errors
    ///
    /// Returns a store error
    pub fn report(&self) -> Result<String> {
        let books = self.store.books()?;
        let users = self.store.users()?;
        let loans = self.loans()?;
        Ok(report::generate_csv(&books, &users, &loans))
    }
}

#[cfg(test)]
mod tests;
