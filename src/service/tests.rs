#![allow(clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::{
    clock::{Clock, FixedClock},
    config::LendingPolicy,
    error::{Collection, LendingError},
    events::LoanEvent,
    loan_state::LoanStatus,
    model::{
        ActivityKind, BookDetails, BookId, BookStatus, Loan, LoanId, NotificationKind, UserId,
    },
    observers::{Change, ChangeLog},
    service::{LendingService, NoticeTarget},
    store::{DocumentStore, MemoryStore, StoreRead, WriteBatch},
};

/// Service over an empty store with a controllable clock and a change log
struct Fixture {
    /// Service under test
    service: LendingService<MemoryStore, Arc<FixedClock>>,
    /// Clock shared with the service
    clock: Arc<FixedClock>,
    /// Everything the service published
    log: Arc<ChangeLog>,
}

/// Day zero of every scenario
fn day_zero() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().expect("valid date")
}

/// Helper function to set up a service with one student and one book
fn setup() -> (Fixture, UserId, BookId) {
    let clock = Arc::new(FixedClock::new(day_zero()));
    let mut service =
        LendingService::new(MemoryStore::new(), Arc::clone(&clock), LendingPolicy::default())
            .expect("default policy is valid");
    let log = Arc::new(ChangeLog::new());
    service.register_observer(Box::new(Arc::clone(&log)));

    let student = service
        .register_student(UserId::from("student-1"), "reader@example.com")
        .expect("register student");
    let book = service
        .add_book(BookDetails::new("Dune", "Frank Herbert", "Sci-Fi", "978-0441013593"))
        .expect("add book");
    log.drain();

    (Fixture { service, clock, log }, student.uid, book.id)
}

#[test]
fn test_request_creates_pending_loan() {
    let (fx, student, book) = setup();

    let loan = fx.service.request_loan(&student, &book).expect("request");

    assert_eq!(loan.status, LoanStatus::Requested);
    assert_eq!(loan.book_title, "Dune");
    assert_eq!(loan.user_email, "reader@example.com");
    assert_eq!(loan.request_date, day_zero());
    assert!(loan.due_date.is_none());

    let activity = fx.service.recent_activity(Some(1)).expect("activity");
    assert_eq!(activity[0].kind, ActivityKind::BookRequest);
    assert_eq!(activity[0].message, "reader@example.com requested to borrow 'Dune'");
    assert!(matches!(fx.log.changes().first(), Some(Change::LoanRequested { .. })));
}

#[test]
fn test_duplicate_request_is_rejected_until_closed() {
    let (fx, student, book) = setup();
    let first = fx.service.request_loan(&student, &book).expect("request");

    let again = fx.service.request_loan(&student, &book);
    assert!(matches!(again, Err(LendingError::AlreadyRequested { .. })));

    // A declined request no longer blocks a new one
    fx.service.decline_loan(&first.id).expect("decline");
    assert!(fx.service.request_loan(&student, &book).is_ok());
}

#[test]
fn test_request_for_unknown_book_fails() {
    let (fx, student, _) = setup();

    let result = fx.service.request_loan(&student, &BookId::from("nope"));
    assert!(matches!(result, Err(LendingError::NotFound { collection: Collection::Books, .. })));
}

#[test]
fn test_approve_sets_due_date_and_borrows_book() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.clock.advance(TimeDelta::hours(3));
    fx.log.drain();

    let approved = fx.service.approve_loan(&loan.id).expect("approve");

    let approval_time = day_zero() + TimeDelta::hours(3);
    assert_eq!(approved.status, LoanStatus::Approved);
    assert_eq!(approved.due_date, Some(approval_time + TimeDelta::days(14)));
    assert_eq!(fx.service.get_book(&book).expect("book").status, BookStatus::Borrowed);

    let changes = fx.log.changes();
    assert!(matches!(
        changes.first(),
        Some(Change::LoanTransitioned(t))
            if t.from == LoanStatus::Requested && t.to == LoanStatus::Approved && t.event == LoanEvent::Approve
    ));
    assert!(changes.iter().any(|c| matches!(
        c,
        Change::BookStatusChanged { from: BookStatus::Available, to: BookStatus::Borrowed, .. }
    )));
}

#[test]
fn test_approve_with_missing_book_changes_nothing() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");

    // Remove the book behind the service's back
    let mut batch = WriteBatch::new();
    batch.delete_book(book.clone());
    fx.service.store().commit(batch).expect("delete");

    let result = fx.service.approve_loan(&loan.id);
    assert!(matches!(result, Err(LendingError::NotFound { collection: Collection::Books, .. })));

    let stored = fx.service.get_loan(&loan.id).expect("loan");
    assert_eq!(stored.status, LoanStatus::Requested);
    assert!(stored.due_date.is_none());
}

#[test]
fn test_book_cannot_be_approved_twice() {
    let (fx, student, book) = setup();
    let other = fx
        .service
        .register_student(UserId::from("student-2"), "other@example.com")
        .expect("register");
    let first = fx.service.request_loan(&student, &book).expect("request");
    let second = fx.service.request_loan(&other.uid, &book).expect("request");

    fx.service.approve_loan(&first.id).expect("approve");
    let result = fx.service.approve_loan(&second.id);

    assert!(matches!(result, Err(LendingError::BookUnavailable { .. })));
    assert_eq!(fx.service.get_loan(&second.id).expect("loan").status, LoanStatus::Requested);
    assert_eq!(fx.service.library_stats().expect("stats").books_on_loan, 1);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");

    assert!(matches!(
        fx.service.return_loan(&loan.id),
        Err(LendingError::InvalidTransition { from: LoanStatus::Requested, event: LoanEvent::Return })
    ));

    fx.service.approve_loan(&loan.id).expect("approve");
    assert!(matches!(
        fx.service.decline_loan(&loan.id),
        Err(LendingError::InvalidTransition { from: LoanStatus::Approved, event: LoanEvent::Decline })
    ));
    assert!(matches!(
        fx.service.approve_loan(&loan.id),
        Err(LendingError::InvalidTransition { from: LoanStatus::Approved, event: LoanEvent::Approve })
    ));

    fx.service.return_loan(&loan.id).expect("return");
    for result in [
        fx.service.approve_loan(&loan.id),
        fx.service.decline_loan(&loan.id),
        fx.service.return_loan(&loan.id),
    ] {
        assert!(matches!(
            result,
            Err(LendingError::InvalidTransition { from: LoanStatus::Returned, .. })
        ));
    }
}

#[test]
fn test_decline_leaves_book_available() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");

    let declined = fx.service.decline_loan(&loan.id).expect("decline");

    assert_eq!(declined.status, LoanStatus::Declined);
    assert_eq!(fx.service.get_book(&book).expect("book").status, BookStatus::Available);
}

#[test]
fn test_return_restores_availability() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");
    fx.clock.advance_days(7);

    let returned = fx.service.return_loan(&loan.id).expect("return");

    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(returned.return_date, Some(day_zero() + TimeDelta::days(7)));
    assert_eq!(fx.service.get_book(&book).expect("book").status, BookStatus::Available);

    // The book can be lent again
    let next = fx.service.request_loan(&student, &book).expect("request again");
    assert!(fx.service.approve_loan(&next.id).is_ok());
}

#[test]
fn test_return_of_missing_loan_aborts() {
    let (fx, _, _) = setup();

    let result = fx.service.return_loan(&LoanId::from("gone"));
    assert!(matches!(
        result,
        Err(LendingError::NotFound { collection: Collection::Borrowing, ref id }) if id == "gone"
    ));
    assert!(fx.log.changes().is_empty());
}

#[test]
fn test_fine_notice_is_issued_once() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");

    // Day 19: five days late is still within the grace period
    fx.clock.set(day_zero() + TimeDelta::days(19));
    assert_eq!(fx.service.calculate_fines().expect("fines").notified(), 0);

    fx.clock.set(day_zero() + TimeDelta::days(20));
    let run = fx.service.calculate_fines().expect("fines");
    assert_eq!(run.notified(), 1);
    assert_eq!(run.issued[0].assessment.overdue_days, 6);
    assert_eq!(run.issued[0].assessment.amount, 6);

    let inbox = fx.service.notifications(&student).expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::FineNotice);
    assert_eq!(inbox[0].amount, Some(6));
    assert_eq!(inbox[0].loan_id.as_ref(), Some(&loan.id));
    assert_eq!(
        inbox[0].message,
        "You have an overdue fine of 6 for 'Dune'. Please return the book."
    );

    let activity = fx.service.recent_activity(Some(1)).expect("activity");
    assert_eq!(activity[0].kind, ActivityKind::FineCalculation);
    assert_eq!(activity[0].message, "Fines calculated. 1 user(s) received fine notices.");

    // Day 21: the existing notice short-circuits a second one
    fx.clock.set(day_zero() + TimeDelta::days(21));
    assert_eq!(fx.service.calculate_fines().expect("fines").notified(), 0);
    assert_eq!(fx.service.notifications(&student).expect("inbox").len(), 1);
}

#[test]
fn test_returned_loans_are_not_fined() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");
    fx.clock.advance_days(18);
    fx.service.return_loan(&loan.id).expect("return");

    fx.clock.advance_days(10);
    assert_eq!(fx.service.calculate_fines().expect("fines").notified(), 0);
}

#[test]
fn test_broadcast_reaches_every_student_independently() {
    let (fx, first, _) = setup();
    let second = fx
        .service
        .register_student(UserId::from("student-2"), "two@example.com")
        .expect("register");
    let third = fx
        .service
        .register_student(UserId::from("student-3"), "three@example.com")
        .expect("register");
    fx.service.register_admin(UserId::from("admin"), "admin@example.com").expect("admin");

    let sent = fx
        .service
        .send_notice(&NoticeTarget::AllStudents, "Library closed on Friday")
        .expect("broadcast");
    assert_eq!(sent, 3);

    let students = [first.clone(), second.uid.clone(), third.uid.clone()];
    for uid in &students {
        let inbox = fx.service.notifications(uid).expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "Library closed on Friday");
        assert!(!inbox[0].read);
    }
    assert!(fx.service.notifications(&UserId::from("admin")).expect("inbox").is_empty());

    // Opening one inbox does not touch the others
    assert_eq!(fx.service.mark_notifications_read(&first).expect("mark"), 1);
    assert_eq!(fx.service.unread_count(&first).expect("unread"), 0);
    assert_eq!(fx.service.unread_count(&second.uid).expect("unread"), 1);
    assert_eq!(fx.service.mark_notifications_read(&first).expect("mark"), 0);
}

#[test]
fn test_targeted_notice() {
    let (fx, student, _) = setup();

    assert_eq!(
        fx.service.send_notice(&NoticeTarget::User(student.clone()), "Your card expires").ok(),
        Some(1)
    );
    assert!(matches!(
        fx.service.send_notice(&NoticeTarget::User(UserId::from("ghost")), "hello"),
        Err(LendingError::NotFound { collection: Collection::Users, .. })
    ));
    assert!(matches!(
        fx.service.send_notice(&NoticeTarget::AllStudents, "   "),
        Err(LendingError::InvalidInput(_))
    ));
}

#[test]
fn test_search_hides_own_borrowed_books() {
    let (fx, student, dune) = setup();
    fx.service
        .add_book(BookDetails::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", "978-0345339683"))
        .expect("add");
    fx.service
        .add_book(BookDetails::new("Children of Dune", "Frank Herbert", "Sci-Fi", "978-0593098233"))
        .expect("add");

    let loan = fx.service.request_loan(&student, &dune).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");

    let found = fx.service.search_books(&student, "herbert", None).expect("search");
    let titles: Vec<&str> = found.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Children of Dune"]);

    let fantasy = fx.service.search_books(&student, "", Some("Fantasy")).expect("search");
    assert_eq!(fantasy.len(), 1);
    assert_eq!(
        fx.service.categories().expect("categories"),
        vec!["Fantasy".to_string(), "Sci-Fi".to_string()]
    );
}

#[test]
fn test_seed_catalog_only_fills_empty_library() {
    let clock = Arc::new(FixedClock::new(day_zero()));
    let service = LendingService::new(MemoryStore::new(), clock, LendingPolicy::default())
        .expect("service");

    let seeded = service.seed_catalog().expect("seed");
    assert!(seeded > 0);
    assert_eq!(service.list_books().expect("books").len(), seeded);
    assert_eq!(service.seed_catalog().expect("seed again"), 0);
}

#[test]
fn test_catalog_edits() {
    let (fx, student, book) = setup();

    let updated = fx
        .service
        .update_book(&book, BookDetails::new("Dune Messiah", "Frank Herbert", "Sci-Fi", "978-0593098233"))
        .expect("update");
    assert_eq!(updated.title, "Dune Messiah");
    assert_eq!(updated.status, BookStatus::Available);

    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");
    assert!(matches!(fx.service.delete_book(&book), Err(LendingError::BookUnavailable { .. })));

    fx.service.return_loan(&loan.id).expect("return");
    fx.service.delete_book(&book).expect("delete");
    assert!(fx.service.list_books().expect("books").is_empty());

    assert!(matches!(
        fx.service.add_book(BookDetails::new(" ", "x", "y", "z")),
        Err(LendingError::InvalidInput(_))
    ));
}

#[test]
fn test_registration_rules() {
    let (fx, student, _) = setup();

    let user = fx.service.get_user(&student).expect("user");
    assert_eq!(user.unique_id.len(), 6);
    assert!(user.unique_id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

    assert!(matches!(
        fx.service.register_student(student.clone(), "again@example.com"),
        Err(LendingError::AlreadyExists { collection: Collection::Users, .. })
    ));
    assert!(matches!(
        fx.service.register_student(UserId::from("x"), "not-an-email"),
        Err(LendingError::InvalidInput(_))
    ));

    fx.service.send_notice(&NoticeTarget::User(student.clone()), "bye").expect("notice");
    fx.service.remove_user(&student).expect("remove");
    assert!(fx.service.store().user(&student).expect("read").is_none());
    assert!(fx.service.notifications(&student).expect("inbox").is_empty());
}

#[test]
fn test_user_with_borrowed_book_cannot_be_removed() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.service.approve_loan(&loan.id).expect("approve");

    assert!(matches!(
        fx.service.remove_user(&student),
        Err(LendingError::UserHasLoans { count: 1, .. })
    ));
    assert!(fx.service.store().user(&student).expect("read").is_some());

    // The fine still reaches the account that holds the book
    fx.clock.set(day_zero() + TimeDelta::days(20));
    assert_eq!(fx.service.calculate_fines().expect("fines").notified(), 1);

    fx.service.return_loan(&loan.id).expect("return");
    fx.service.remove_user(&student).expect("remove after return");
    assert_eq!(fx.service.get_book(&book).expect("book").status, BookStatus::Available);
}

#[test]
fn test_removing_user_declines_pending_requests() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.log.drain();

    fx.service.remove_user(&student).expect("remove");

    assert_eq!(fx.service.get_loan(&loan.id).expect("loan").status, LoanStatus::Declined);
    assert!(fx.service.pending_requests().expect("pending").is_empty());
    assert!(fx.log.changes().iter().any(|c| matches!(
        c,
        Change::LoanTransitioned(t) if t.loan_id == loan.id && t.to == LoanStatus::Declined
    )));

    // A new account with the same uid starts clean
    fx.clock.set(day_zero() + TimeDelta::days(20));
    fx.service.register_student(student.clone(), "new@example.com").expect("re-register");
    assert_eq!(fx.service.calculate_fines().expect("fines").notified(), 0);
    assert!(fx.service.notifications(&student).expect("inbox").is_empty());
    fx.service.request_loan(&student, &book).expect("request again");
}

#[test]
fn test_fines_skip_loans_of_missing_users() {
    let (fx, _, book) = setup();
    let ghost = UserId::from("ghost");
    let mut batch = WriteBatch::new();
    batch.put_loan(Loan {
        id: LoanId::from("orphan"),
        book_id: book,
        book_title: "Dune".to_string(),
        user_id: ghost.clone(),
        user_email: "ghost@example.com".to_string(),
        status: LoanStatus::Approved,
        request_date: day_zero(),
        due_date: Some(day_zero() + TimeDelta::days(14)),
        return_date: None,
    });
    fx.service.store().commit(batch).expect("seed orphan");

    fx.clock.set(day_zero() + TimeDelta::days(20));
    let run = fx.service.calculate_fines().expect("fines");

    assert_eq!(run.notified(), 0);
    assert!(fx.service.notifications(&ghost).expect("inbox").is_empty());
}

#[test]
fn test_user_and_library_stats() {
    let (fx, student, dune) = setup();
    let hobbit = fx
        .service
        .add_book(BookDetails::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", "978-0345339683"))
        .expect("add");
    let gatsby = fx
        .service
        .add_book(BookDetails::new("The Great Gatsby", "F. Scott Fitzgerald", "Classic", "978-0743273565"))
        .expect("add");

    // Returned on day 2
    let read = fx.service.request_loan(&student, &gatsby.id).expect("request");
    fx.service.approve_loan(&read.id).expect("approve");
    fx.clock.advance_days(2);
    fx.service.return_loan(&read.id).expect("return");

    // Approved on day 2, due day 16
    let early = fx.service.request_loan(&student, &dune).expect("request");
    fx.service.approve_loan(&early.id).expect("approve");

    // Approved on day 5, due day 19
    fx.clock.advance_days(3);
    let late = fx.service.request_loan(&student, &hobbit.id).expect("request");
    fx.service.approve_loan(&late.id).expect("approve");

    // Day 17: first loan overdue, second due in two days
    fx.clock.set(day_zero() + TimeDelta::days(17));
    let stats = fx.service.user_stats(&student).expect("stats");
    assert_eq!(stats.currently_borrowed, 2);
    assert_eq!(stats.books_read, 1);
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.due_soon, 1);
    assert_eq!(stats.returned_this_month, 1);

    let library = fx.service.library_stats().expect("stats");
    assert_eq!(library.total_books, 3);
    assert_eq!(library.total_users, 1);
    assert_eq!(library.books_on_loan, 2);
    assert_eq!(fx.service.pending_requests().expect("pending").len(), 0);
    assert_eq!(fx.service.loans_for_user(&student).expect("loans").len(), 3);
    assert!(fx.clock.now() > day_zero());

    // February: January's return no longer counts
    fx.clock.set(day_zero() + TimeDelta::days(31));
    assert_eq!(fx.service.user_stats(&student).expect("stats").returned_this_month, 0);
}

#[test]
fn test_report_escapes_titles() {
    let (fx, student, _) = setup();
    let quoted = fx
        .service
        .add_book(BookDetails::new("He said \"hi\"", "Anon", "Essay", "978-1"))
        .expect("add");
    fx.service.request_loan(&student, &quoted.id).expect("request");

    let csv = fx.service.report().expect("report");

    assert!(csv.starts_with("Summary\nTotal Books,2\nTotal Users,1\nBooks on Loan,0\n"));
    assert!(csv.contains("reader@example.com,\"He said \"\"hi\"\"\",requested,2024-01-01,N/A,N/A\r\n"));
}

#[test]
fn test_admin_alerts_track_requests_returns_and_signups() {
    let (fx, student, book) = setup();
    let loan = fx.service.request_loan(&student, &book).expect("request");
    fx.clock.advance_days(1);
    fx.service.approve_loan(&loan.id).expect("approve");
    fx.clock.advance_days(1);
    fx.service.return_loan(&loan.id).expect("return");

    let never_viewed = fx.service.admin_alerts(None).expect("alerts");
    let kinds: Vec<ActivityKind> = never_viewed.entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ActivityKind::BookReturn, ActivityKind::BookRequest, ActivityKind::UserRegister]
    );
    assert_eq!(never_viewed.unread, 3);

    // Viewed on day zero: only the return is new
    let seen_day_zero = fx.service.admin_alerts(Some(day_zero())).expect("alerts");
    assert_eq!(seen_day_zero.entries.len(), 3);
    assert_eq!(seen_day_zero.unread, 1);
    assert_eq!(
        seen_day_zero.newest_unread().map(|e| e.kind),
        Some(ActivityKind::BookReturn)
    );

    let caught_up = fx.service.admin_alerts(Some(fx.clock.now())).expect("alerts");
    assert!(!caught_up.has_unread());
    assert!(caught_up.newest_unread().is_none());
}
