//! Result of a gateway call
//!
//! A gateway call never returns an error: by the time a caller sees
//! `Outcome::Failed`, the failure has already been reported on the
//! notification bus. The reason is kept so code can tell "empty" from "failed".

use crate::events::Level;
use std::fmt;

/// Why a gateway call did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The service answered with a non-2xx status
    Rejected { status: u16 },
    /// No response could be obtained (connect, DNS, timeout)
    Connectivity { reason: String },
    /// A 2xx response whose body was not a valid `{content}` envelope
    Malformed { reason: String },
}

impl Failure {
    /// Severity used when the failure is reported on the bus.
    ///
    /// Client errors (4xx) are warnings; everything else is an error.
    pub fn level(&self) -> Level {
        match self {
            Failure::Rejected { status } if (400..500).contains(status) => Level::Warn,
            _ => Level::Error,
        }
    }

    /// HTTP status, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Rejected { status } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Rejected { status } => {
                write!(f, "The configuration service responded with status {status}")
            }
            Failure::Connectivity { .. } => {
                f.write_str("Unable to reach the configuration service")
            }
            Failure::Malformed { .. } => {
                f.write_str("The configuration service sent an unexpected response")
            }
        }
    }
}

/// `Ok(T) | Failed(reason)` returned by every gateway operation
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Ok(T),
    Failed(Failure),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_failed(&self) -> bool {
        !self.is_ok()
    }

    /// The value, or `None` if the call failed (and was already reported)
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Failed(failure) => Some(failure),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Failed(failure) => Outcome::Failed(failure),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(value),
            Outcome::Failed(failure) => Outcome::Failed(failure.clone()),
        }
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.ok()
    }
}
