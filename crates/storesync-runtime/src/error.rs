#![forbid(unsafe_code)]

//! Error type for declarator misuse and configuration loading.
//!
//! Synchronization itself never fails; every edge path there is a binding
//! state transition.

/// Errors from storesync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A field was attached after an instance of the class had activated.
    ClassAlreadyActivated { class: String, field: String },
    /// The same field was attached twice to one class.
    DuplicateField { class: String, field: String },
    /// The initial state could not be parsed.
    Config(String),
    /// The initial state file could not be read.
    Io(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassAlreadyActivated { class, field } => write!(
                f,
                "cannot sync field '{field}': class '{class}' has already activated"
            ),
            Self::DuplicateField { class, field } => {
                write!(f, "field '{field}' is already synced on class '{class}'")
            }
            Self::Config(msg) => write!(f, "invalid initial state: {msg}"),
            Self::Io(msg) => write!(f, "cannot read initial state: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}
