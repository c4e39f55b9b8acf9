//! In-memory command log.
//!
//! Each executed command occupies one index-aligned entry: the input is
//! recorded before execution, the output is attached at the same index once
//! the command finishes (including recovered failures). The log is held in
//! memory only; `log_type` in the configuration is an advisory tag.

use serde::Serialize;

use crate::connection::ExecOutput;

/// One logged command: the input as given by the caller, and the output
/// once execution finished.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// The command as the caller issued it, without any wire prefix.
    pub input: String,
    /// The execution result; `None` while the command is still running.
    pub output: Option<ExecOutput>,
}

/// Ordered, index-aligned record of executed commands.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    entries: Vec<LogEntry>,
}

impl CommandLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a command about to run; returns its index.
    pub fn push_input(&mut self, input: impl Into<String>) -> usize {
        self.entries.push(LogEntry {
            input: input.into(),
            output: None,
        });
        self.entries.len() - 1
    }

    /// Attach the output for the command at `index`.
    ///
    /// Out-of-range indices are ignored; the log never panics on behalf of
    /// a command that was not recorded.
    pub fn set_output(&mut self, index: usize, output: ExecOutput) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.output = Some(output);
        }
    }

    /// All entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The logged inputs in execution order.
    #[must_use]
    pub fn inputs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.input.as_str()).collect()
    }

    /// The logged outputs in execution order; `None` for unfinished entries.
    #[must_use]
    pub fn outputs(&self) -> Vec<Option<&ExecOutput>> {
        self.entries.iter().map(|e| e.output.as_ref()).collect()
    }

    /// Number of logged commands.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the log is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn entries_are_index_aligned() {
        let mut log = CommandLog::new();
        let first = log.push_input("ls");
        let second = log.push_input("whoami");
        assert_eq!((first, second), (0, 1));

        log.set_output(
            second,
            ExecOutput {
                stdio: "deploy\n".to_string(),
                stderr: String::new(),
            },
        );

        assert_eq!(log.inputs(), ["ls", "whoami"]);
        assert!(log.outputs()[0].is_none());
        assert_eq!(log.outputs()[1].map(|o| o.stdio.as_str()), Some("deploy\n"));
    }

    #[test]
    fn out_of_range_output_is_ignored() {
        let mut log = CommandLog::new();
        log.set_output(
            5,
            ExecOutput {
                stdio: String::new(),
                stderr: String::new(),
            },
        );
        assert!(log.is_empty());
    }
}
