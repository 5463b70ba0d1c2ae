//! Structured configuration issues.
//!
//! Parsing never fails on a bad value: the offending value falls back to its
//! default and an issue is reported. The binary prints warnings and refuses
//! to run when any issue is an [`Severity::Error`].

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The configuration cannot work as written.
    Error,
    /// Works, but not the way the file says.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    InvalidRule {
        field: String,
        value: String,
    },
    /// A quorum gate without voters.
    NoVoters { gate: String },
    /// A single-approver gate without an approver.
    MissingApprover { gate: String },
    /// The rule needs more approvals than there are voters.
    UnattainableThreshold {
        gate: String,
        threshold: usize,
        voters: usize,
    },
    DuplicateVoter { gate: String, voter: String },
    UnknownStep { step: String },
    OutOfRange { field: String, value: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
