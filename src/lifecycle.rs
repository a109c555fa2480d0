use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LendingError, Result},
    events::LoanEvent,
    loan_state::LoanStatus,
    model::LoanId,
};

/// Represents a status transition applied to a loan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StateTransition {
    /// Loan that moved
    pub loan_id: LoanId,
    /// The status before the transition
    pub from: LoanStatus,
    /// The status after the transition
    pub to: LoanStatus,
    /// The event that triggered the transition
    pub event: LoanEvent,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Transition table of the borrowing lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanLifecycle {
    /// Mapping of (status, event) to the resulting status
    transitions: HashMap<(LoanStatus, LoanEvent), LoanStatus>,
}

impl Default for LoanLifecycle {
    fn default() -> Self {
        Self::standard()
    }
}

impl LoanLifecycle {
    /// Create a lifecycle with no transitions at all
    #[must_use]
    pub fn empty() -> Self {
        Self { transitions: HashMap::new() }
    }

    /// The lending lifecycle: `requested -> {approved, declined}`, `approved -> returned`
    #[must_use]
    pub fn standard() -> Self {
        let mut lifecycle = Self::empty();
        lifecycle.add_transition(LoanStatus::Requested, LoanEvent::Approve, LoanStatus::Approved);
        lifecycle.add_transition(LoanStatus::Requested, LoanEvent::Decline, LoanStatus::Declined);
        lifecycle.add_transition(LoanStatus::Approved, LoanEvent::Return, LoanStatus::Returned);
        lifecycle
    }

    /// Define a valid transition from one status to another when an event occurs
    pub fn add_transition(&mut self, from: LoanStatus, event: LoanEvent, to: LoanStatus) {
        self.transitions.insert((from, event), to);
    }

    /// Resolve the status reached by applying `event` in `from`
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidTransition` if no transition is defined
    /// for this event from this status
    pub fn next(&self, from: LoanStatus, event: LoanEvent) -> Result<LoanStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or(LendingError::InvalidTransition { from, event })
    }

    /// Check whether `event` may be applied in `from` without applying it
    #[must_use]
    pub fn is_valid(&self, from: LoanStatus, event: LoanEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// Events accepted in `status`, with their targets, in a stable order
    #[must_use]
    pub fn outgoing(&self, status: LoanStatus) -> Vec<(LoanEvent, LoanStatus)> {
        LoanEvent::ALL
            .iter()
            .filter_map(|event| {
                self.transitions.get(&(status, *event)).map(|to| (*event, *to))
            })
            .collect()
    }

    /// Get all transitions defined in the lifecycle
    #[must_use]
    pub fn get_all_transitions(&self) -> &HashMap<(LoanStatus, LoanEvent), LoanStatus> {
        &self.transitions
    }
}

impl fmt::Display for LoanLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for status in LoanStatus::ALL {
            for (event, to) in self.outgoing(status) {
                writeln!(f, "{status} --({event})--> {to}")?;
            }
        }
        Ok(())
    }
}
