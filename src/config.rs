use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{LendingError, Result};

/// Lending thresholds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LendingPolicy {
    /// Days between approval and the due date
    pub loan_period_days: u32,
    /// Days after the request before a fine may be issued
    pub allowed_return_days: u32,
    /// Overdue days tolerated before a fine is issued
    pub fine_grace_days: u32,
    /// Fine units charged per overdue day
    pub fine_per_day: u64,
    /// Window, in days, in which an approved loan counts as due soon
    pub due_soon_days: u32,
    /// Default length of the recent activity feed
    pub recent_activity_limit: usize,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            allowed_return_days: 15,
            fine_grace_days: 5,
            fine_per_day: 1,
            due_soon_days: 3,
            recent_activity_limit: 10,
        }
    }
}

impl LendingPolicy {
    /// Loan period as a duration
    #[must_use]
    pub fn loan_period(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.loan_period_days))
    }

    /// Period after the request before fines apply
    #[must_use]
    pub fn allowed_return_period(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.allowed_return_days))
    }

    /// Due-soon window as a duration
    #[must_use]
    pub fn due_soon_window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.due_soon_days))
    }

    /// Reject settings that make the lifecycle meaningless
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Config` if the loan period is zero
    pub fn validate(&self) -> Result<()> {
        if self.loan_period_days == 0 {
            return Err(LendingError::Config("loan_period_days must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Settings for the command-line driver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// JSON snapshot the store is loaded from and saved to
    pub state_file: PathBuf,
    /// Lending thresholds
    pub policy: LendingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self { state_file: PathBuf::from("library.json"), policy: LendingPolicy::default() }
    }
}

impl Config {
    /// Parse a TOML document; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Config` if the document is malformed or the
    /// policy is invalid
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| LendingError::Config(e.to_string()))?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns `LendingError::Config` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| {
            LendingError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }
}
