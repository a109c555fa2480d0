//! Overdue fine policy.
//!
//! A loan earns a fine once it is more than `fine_grace_days` past its due
//! date *and* the allowed return period counted from the request has elapsed.

use chrono::{DateTime, TimeDelta, Utc};

use crate::{config::LendingPolicy, loan_state::LoanStatus, model::Loan};

/// Outcome of assessing one loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineAssessment {
    /// Whole days past the due date, rounded up
    pub overdue_days: u64,
    /// Amount to charge
    pub amount: u64,
}

/// Days between `due` and `now`, rounded up; zero when `now` is not past `due`
#[must_use]
pub fn overdue_days(due: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    if now <= due {
        return 0;
    }
    let late = now.signed_duration_since(due);
    let day = TimeDelta::days(1).num_milliseconds();
    let millis = late.num_milliseconds();
    let whole = millis.div_euclid(day);
    let days = if millis.rem_euclid(day) > 0 { whole.saturating_add(1) } else { whole };
    u64::try_from(days).unwrap_or(0)
}

/// Decide whether `loan` is fined at `now`
///
/// Only approved loans with a due date are considered.
#[must_use]
pub fn assess(loan: &Loan, now: DateTime<Utc>, policy: &LendingPolicy) -> Option<FineAssessment> {
    if loan.status != LoanStatus::Approved {
        return None;
    }
    let due = loan.due_date?;
    if now <= due {
        return None;
    }

    let overdue_days = overdue_days(due, now);
    let allowed_return_date = loan.request_date.checked_add_signed(policy.allowed_return_period())?;

    if overdue_days > u64::from(policy.fine_grace_days) && now > allowed_return_date {
        Some(FineAssessment { overdue_days, amount: overdue_days.saturating_mul(policy.fine_per_day) })
    } else {
        None
    }
}

/// Text of the fine notice sent to the borrower
#[must_use]
pub fn fine_message(amount: u64, book_title: &str) -> String {
    format!("You have an overdue fine of {amount} for '{book_title}'. Please return the book.")
}
