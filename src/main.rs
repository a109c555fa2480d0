use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use library_lending::{
    Config, LendingService, LoanLifecycle, MemoryStore, NoticeTarget, StateVisualization,
    SystemClock, TransitionLogger,
    model::{ActivityKind, BookDetails, BookId, BookStatus, LoanId, UserId},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Library borrowing desk over a JSON state file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file, overrides the configured one
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Action to run
    #[command(subcommand)]
    command: Command,
}

/// Desk actions
#[derive(Subcommand, Debug)]
enum Command {
    /// Add the sample catalog
    Seed,
    /// Add one book to the catalog
    AddBook {
        /// Title shown to readers
        #[arg(long)]
        title: String,
        /// Author name
        #[arg(long)]
        author: String,
        /// Genre
        #[arg(long, default_value = "General")]
        category: String,
        /// ISBN as printed
        #[arg(long, default_value = "")]
        isbn: String,
    },
    /// List the catalog, newest first
    Books,
    /// Register an account
    Register {
        /// Account uid
        uid: String,
        /// Sign-in email
        email: String,
        /// Create an admin instead of a student
        #[arg(long)]
        admin: bool,
    },
    /// File a borrow request
    Request {
        /// Requesting student
        user: String,
        /// Requested book
        book: String,
    },
    /// Approve a pending request
    Approve {
        /// Loan id
        loan: String,
    },
    /// Decline a pending request
    Decline {
        /// Loan id
        loan: String,
    },
    /// Record a returned book
    Return {
        /// Loan id
        loan: String,
    },
    /// Run the overdue fine job
    Fines,
    /// Send a notice
    Notify {
        /// Notice text
        message: String,
        /// Send to every student
        #[arg(long, conflicts_with = "user")]
        all: bool,
        /// Send to a single account
        #[arg(long)]
        user: Option<String>,
    },
    /// Show a user's inbox and mark it read
    Notifications {
        /// Inbox owner
        user: String,
    },
    /// Show counters and recent activity
    Stats {
        /// Show a student's dashboard counters as well
        #[arg(long)]
        user: Option<String>,
    },
    /// Show request, return and sign-up alerts
    Alerts {
        /// Last time the feed was viewed, RFC 3339
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Write the CSV report
    Report {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the loan lifecycle
    Lifecycle {
        /// Write a DOT graph to this file
        #[arg(long)]
        dot: Option<PathBuf>,
    },
}

impl Command {
    /// Whether the command writes to the state file
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Self::Books
                | Self::Stats { .. }
                | Self::Alerts { .. }
                | Self::Report { .. }
                | Self::Lifecycle { .. }
        )
    }
}

/// Service type the CLI drives
type Desk = LendingService<MemoryStore, SystemClock>;

/// Parse arguments, run one command and persist the result
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(state) = args.state {
        config.state_file = state;
    }
    debug!(state_file = %config.state_file.display(), "configuration loaded");

    let store = MemoryStore::open(&config.state_file)?;
    let mut desk = LendingService::new(store, SystemClock, config.policy)?;
    desk.register_observer(Box::new(TransitionLogger));

    run(&desk, &args.command)?;

    if args.command.mutates() {
        desk.store()
            .save_to_file(&config.state_file)
            .with_context(|| format!("saving {}", config.state_file.display()))?;
    }
    Ok(())
}

/// Execute one command against the service
fn run(desk: &Desk, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Seed => {
            let added = desk.seed_catalog()?;
            println!("{} {added} books", "Seeded".green().bold());
        }
        Command::AddBook { title, author, category, isbn } => {
            let book = desk.add_book(BookDetails::new(
                title.as_str(),
                author.as_str(),
                category.as_str(),
                isbn.as_str(),
            ))?;
            println!("{} {} ({})", "Added".green().bold(), book.title, book.id);
        }
        Command::Books => {
            for book in desk.list_books()? {
                let status = match book.status {
                    BookStatus::Available => book.status.to_string().green(),
                    BookStatus::Borrowed => book.status.to_string().yellow(),
                };
                println!("{}  {:<9} {} by {} [{}]", book.id, status, book.title, book.author, book.category);
            }
        }
        Command::Register { uid, email, admin } => {
            let uid = UserId::from(uid.as_str());
            let user = if *admin {
                desk.register_admin(uid, email)?
            } else {
                desk.register_student(uid, email)?
            };
            println!("{} {} as {} ({})", "Registered".green().bold(), user.email, user.role, user.unique_id);
        }
        Command::Request { user, book } => {
            let loan = desk.request_loan(&UserId::from(user.as_str()), &BookId::from(book.as_str()))?;
            println!("{} {} for '{}'", "Requested".green().bold(), loan.id, loan.book_title);
        }
        Command::Approve { loan } => {
            let loan = desk.approve_loan(&LoanId::from(loan.as_str()))?;
            let due = loan.due_date.map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string());
            println!("{} '{}', due {due}", "Approved".green().bold(), loan.book_title);
        }
        Command::Decline { loan } => {
            let loan = desk.decline_loan(&LoanId::from(loan.as_str()))?;
            println!("{} '{}'", "Declined".yellow().bold(), loan.book_title);
        }
        Command::Return { loan } => {
            let loan = desk.return_loan(&LoanId::from(loan.as_str()))?;
            println!("{} '{}'", "Returned".green().bold(), loan.book_title);
        }
        Command::Fines => {
            let run = desk.calculate_fines()?;
            println!("{} {} fine notice(s) sent", "Fines calculated.".green().bold(), run.notified());
            for fine in &run.issued {
                println!(
                    "  {} owes {} for {} day(s) on loan {}",
                    fine.user_id, fine.assessment.amount, fine.assessment.overdue_days, fine.loan_id
                );
            }
        }
        Command::Notify { message, all, user } => {
            let target = match (all, user) {
                (true, _) => NoticeTarget::AllStudents,
                (false, Some(user)) => NoticeTarget::User(UserId::from(user.as_str())),
                (false, None) => bail!("pass --all or --user <UID>"),
            };
            let sent = desk.send_notice(&target, message)?;
            println!("{} {sent} notice(s)", "Sent".green().bold());
        }
        Command::Notifications { user } => {
            let uid = UserId::from(user.as_str());
            let inbox = desk.notifications(&uid)?;
            if inbox.is_empty() {
                println!("No notifications.");
            }
            for note in &inbox {
                let marker = if note.read { " ".normal() } else { "*".cyan().bold() };
                println!("{marker} {} {}", note.timestamp.format("%Y-%m-%d %H:%M"), note.message);
            }
            desk.mark_notifications_read(&uid)?;
        }
        Command::Stats { user } => {
            let stats = desk.library_stats()?;
            println!("{}", "Library".green().bold());
            println!("  Total books:   {}", stats.total_books);
            println!("  Total users:   {}", stats.total_users);
            println!("  Books on loan: {}", stats.books_on_loan);

            if let Some(user) = user {
                let uid = UserId::from(user.as_str());
                let mine = desk.user_stats(&uid)?;
                println!("{}", format!("Dashboard for {uid}").green().bold());
                println!("  Borrowed: {}", mine.currently_borrowed);
                println!("  Read:     {}", mine.books_read);
                println!("  Due soon: {}", mine.due_soon);
                println!("  Overdue:  {}", mine.overdue.to_string().red());
                println!("  Returned this month: {}", mine.returned_this_month);
                println!("  Unread:   {}", desk.unread_count(&uid)?);
            }

            println!("{}", "Recent activity".green().bold());
            for entry in desk.recent_activity(None)? {
                println!("  {} {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.message);
            }
        }
        Command::Alerts { since } => {
            let alerts = desk.admin_alerts(*since)?;
            if let Some(latest) = alerts.newest_unread() {
                let headline = if latest.kind == ActivityKind::BookRequest {
                    "New Request Received"
                } else {
                    "New Notification"
                };
                println!("{} ({} unread)", headline.cyan().bold(), alerts.unread);
            }
            if alerts.entries.is_empty() {
                println!("No notifications.");
            }
            for entry in &alerts.entries {
                println!("  {} {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.message);
            }
        }
        Command::Report { output } => {
            let csv = desk.report()?;
            match output {
                Some(path) => {
                    std::fs::write(path, csv)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{} {}", "Report written to".green().bold(), path.display());
                }
                None => print!("{csv}"),
            }
        }
        Command::Lifecycle { dot } => {
            let lifecycle: &LoanLifecycle = desk.lifecycle();
            print!("{lifecycle}");
            if let Some(path) = dot {
                let graph = StateVisualization::generate_dot(lifecycle, None);
                StateVisualization::save_dot_to_file(&graph, path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("{} {}", "DOT graph written to".green().bold(), path.display());
            }
        }
    }
    Ok(())
}
