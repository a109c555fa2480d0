use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::{
    loan_state::LoanStatus,
    model::{Book, Loan, User},
};

/// Quote a field unconditionally, doubling embedded quotes
#[must_use]
pub fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Quote a field only when it would otherwise break the row
#[must_use]
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) { quote_field(field) } else { field.to_string() }
}

/// Format an optional date as `YYYY-MM-DD`, or `N/A`
fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

/// Render the summary and borrowing history as CSV
#[must_use]
pub fn generate_csv(books: &[Book], users: &[User], loans: &[Loan]) -> String {
    let on_loan = loans.iter().filter(|l| l.status == LoanStatus::Approved).count();

    let mut csv = String::new();
    csv.push_str("Summary\n");
    // Writing into a String cannot fail
    let _ = writeln!(csv, "Total Books,{}", books.len());
    let _ = writeln!(csv, "Total Users,{}", users.len());
    let _ = writeln!(csv, "Books on Loan,{on_loan}");
    csv.push('\n');

    csv.push_str("Borrowing History\n");
    csv.push_str("User Email,Book Title,Status,Request Date,Due Date,Return Date\n");
    for loan in loans {
        let row = [
            escape_field(&loan.user_email),
            quote_field(&loan.book_title),
            loan.status.to_string(),
            format_date(Some(loan.request_date)),
            format_date(loan.due_date),
            format_date(loan.return_date),
        ]
        .join(",");
        csv.push_str(&row);
        csv.push_str("\r\n");
    }
    csv
}
