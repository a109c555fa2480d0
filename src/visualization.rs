use std::{fmt::Write as _, fs::File, io::Write, path::Path};

use crate::{lifecycle::LoanLifecycle, loan_state::LoanStatus};

/// Visualization tools for the loan lifecycle
#[derive(Debug)]
pub struct StateVisualization;

impl StateVisualization {
    /// Generate a DOT graph representation of the lifecycle
    ///
    /// `current`, when given, is drawn with a double border.
    #[must_use]
    pub fn generate_dot(lifecycle: &LoanLifecycle, current: Option<LoanStatus>) -> String {
        let mut dot = String::from("digraph loan_lifecycle {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=circle, style=filled, fillcolor=lightblue];\n");

        // Writing into a String cannot fail
        for status in LoanStatus::ALL {
            if Some(status) == current {
                let _ = writeln!(
                    dot,
                    "  {status} [label=\"{status}\", fillcolor=palegreen, peripheries=2];"
                );
            } else if status.is_terminal() {
                let _ = writeln!(dot, "  {status} [label=\"{status}\", fillcolor=lightgrey];");
            } else {
                let _ = writeln!(dot, "  {status} [label=\"{status}\"];");
            }
        }

        for status in LoanStatus::ALL {
            for (event, to) in lifecycle.outgoing(status) {
                let _ = writeln!(dot, "  {status} -> {to} [label=\"{event}\"];");
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Save the DOT representation to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to
    pub fn save_dot_to_file(dot: &str, path: &Path) -> Result<(), std::io::Error> {
        let mut file = File::create(path)?;
        file.write_all(dot.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_contains_every_edge() {
        let dot = StateVisualization::generate_dot(&LoanLifecycle::standard(), None);

        assert!(dot.starts_with("digraph loan_lifecycle {"));
        assert!(dot.contains("requested -> approved [label=\"approve\"];"));
        assert!(dot.contains("requested -> declined [label=\"decline\"];"));
        assert!(dot.contains("approved -> returned [label=\"return\"];"));
        assert!(!dot.contains("peripheries"));
    }

    #[test]
    fn test_dot_highlights_current_status() {
        let dot =
            StateVisualization::generate_dot(&LoanLifecycle::standard(), Some(LoanStatus::Approved));
        assert!(dot.contains("approved [label=\"approved\", fillcolor=palegreen, peripheries=2];"));
    }
}
