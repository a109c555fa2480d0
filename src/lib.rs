//! Borrowing lifecycle and fine policy for a small library.
//!
//! This crate provides the loan state machine, the overdue-fine job,
//! notification fan-out and reporting, all running against an explicit
//! [`store::DocumentStore`] handed to a [`LendingService`].

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fines;
pub mod lifecycle;
pub mod loan_state;
pub mod model;
pub mod observers;
pub mod persistence;
pub mod report;
pub mod service;
pub mod store;
pub mod visualization;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, LendingPolicy};
pub use error::{LendingError, Result};
pub use events::LoanEvent;
pub use lifecycle::{LoanLifecycle, StateTransition};
pub use loan_state::LoanStatus;
pub use observers::{Change, ChangeLog, LendingObserver, TransitionLogger};
pub use service::{AdminAlerts, LendingService, NoticeTarget};
pub use store::{DocumentStore, MemoryStore, StoreRead, WriteBatch};
pub use visualization::StateVisualization;
