//! Error types for unit-of-work operations.

use std::fmt;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for all persistence operations.
#[derive(Debug)]
pub enum Error {
    /// A delete or update referenced an entity that is not tracked.
    UntrackedEntity {
        /// Schema role of the entity.
        role: String,
    },
    /// An entity was attached to the heap twice.
    AlreadyTracked {
        /// Schema role of the entity.
        role: String,
    },
    /// A predicate needed a primary key that never became known.
    MissingIdentity {
        /// Table the command targets.
        table: String,
    },
    /// The scheduling loop made zero progress over a wave.
    SchedulingStall {
        /// Descriptions of the commands that could not run.
        commands: Vec<String>,
    },
    /// The underlying storage write failed.
    Driver(DriverError),
    /// No schema entry exists for the given role.
    UnknownRole {
        /// The role that was looked up.
        role: String,
    },
    /// No driver is registered for the given database name.
    UnknownDatabase {
        /// The database that was looked up.
        database: String,
    },
}

/// Failure reported by a storage driver.
#[derive(Debug)]
pub struct DriverError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Underlying cause, if any.
    pub source: Option<Box<dyn std::error::Error + 'static>>,
}

impl DriverError {
    /// Create a driver error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a driver error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + 'static>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UntrackedEntity { role } => {
                write!(f, "entity of role '{role}' is not tracked by the heap")
            }
            Error::AlreadyTracked { role } => {
                write!(f, "entity of role '{role}' is already tracked by the heap")
            }
            Error::MissingIdentity { table } => {
                write!(f, "no primary key available to identify a row in '{table}'")
            }
            Error::SchedulingStall { commands } => {
                write!(f, "unable to complete: {}", commands.join(", "))
            }
            Error::Driver(e) => write!(f, "driver error: {}", e.message),
            Error::UnknownRole { role } => write!(f, "no schema defined for role '{role}'"),
            Error::UnknownDatabase { database } => {
                write!(f, "no driver registered for database '{database}'")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => e.source.as_deref(),
            _ => None,
        }
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Error::Driver(e)
    }
}
