//! Status requests and response attempts

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::oracle::OracleHandle;
use crate::domain::status::StatusCode;

/// Identifies the flight a request is about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectKey {
    /// Airline account that operates the flight
    pub airline: String,
    /// Flight number, e.g. `ND1309`
    pub flight: String,
    /// Scheduled departure (unix seconds)
    pub timestamp: u64,
}

impl SubjectKey {
    pub fn new(airline: impl Into<String>, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            airline: airline.into(),
            flight: flight.into(),
            timestamp,
        }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.flight, self.timestamp, self.airline)
    }
}

/// Where an event came from on the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub block_number: u64,
    pub transaction_hash: Option<String>,
}

impl EventMetadata {
    pub fn at_block(block_number: u64) -> Self {
        Self {
            block_number,
            transaction_hash: None,
        }
    }
}

/// A registry request for oracles holding `index` to report on `subject`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub index: u8,
    pub subject: SubjectKey,
    pub metadata: EventMetadata,
}

impl StatusRequest {
    pub fn new(index: u8, subject: SubjectKey, metadata: EventMetadata) -> Self {
        Self {
            index,
            subject,
            metadata,
        }
    }
}

/// How the registry answered one response submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    /// Expected whenever quorum was already reached or the registry does
    /// not consider the oracle eligible.
    Rejected { reason: String },
    /// The call never got a definite answer (transport failure).
    Unknown { reason: String },
}

impl AttemptOutcome {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::Rejected { .. } => "rejected",
            AttemptOutcome::Unknown { .. } => "unknown",
        }
    }
}

/// Record of one oracle answering one request. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseAttempt {
    pub oracle: OracleHandle,
    pub request_index: u8,
    pub status: StatusCode,
    pub outcome: AttemptOutcome,
}

impl ResponseAttempt {
    pub fn is_accepted(&self) -> bool {
        self.outcome == AttemptOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_display() {
        let subject = SubjectKey::new("0xair", "ND1309", 1554952974);
        assert_eq!(subject.to_string(), "ND1309@1554952974 (0xair)");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::Accepted.label(), "accepted");
        assert_eq!(
            AttemptOutcome::Rejected { reason: "closed".into() }.label(),
            "rejected"
        );
        assert_eq!(
            AttemptOutcome::Unknown { reason: "timeout".into() }.label(),
            "unknown"
        );
    }
}
