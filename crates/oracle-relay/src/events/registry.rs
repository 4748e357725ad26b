//! Registry event records
//!
//! The registry client decodes raw ledger logs into these records before
//! they reach the relay; the relay only ever sees this tagged union.

use serde::{Deserialize, Serialize};

use crate::domain::{EventMetadata, StatusCode, StatusRequest, SubjectKey};

/// One decoded event from the registry subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    /// Oracles holding `request.index` are asked to report on a flight.
    OracleRequest(StatusRequest),

    /// The registry reached consensus on a flight's status.
    FlightStatusInfo {
        subject: SubjectKey,
        status: StatusCode,
        metadata: EventMetadata,
    },

    /// Any other registry event (registrations, accepted reports, ...).
    Other {
        name: String,
        metadata: EventMetadata,
    },
}

/// Event classification used for logging and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    OracleRequest,
    TerminalStatus,
    Other,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::OracleRequest => "oracle_request",
            EventKind::TerminalStatus => "flight_status_info",
            EventKind::Other => "other",
        }
    }
}

impl RegistryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RegistryEvent::OracleRequest(_) => EventKind::OracleRequest,
            RegistryEvent::FlightStatusInfo { .. } => EventKind::TerminalStatus,
            RegistryEvent::Other { .. } => EventKind::Other,
        }
    }

    /// Event name as the registry emits it.
    pub fn name(&self) -> &str {
        match self {
            RegistryEvent::OracleRequest(_) => "OracleRequest",
            RegistryEvent::FlightStatusInfo { .. } => "FlightStatusInfo",
            RegistryEvent::Other { name, .. } => name,
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        match self {
            RegistryEvent::OracleRequest(request) => &request.metadata,
            RegistryEvent::FlightStatusInfo { metadata, .. } => metadata,
            RegistryEvent::Other { metadata, .. } => metadata,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.metadata().block_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let request = RegistryEvent::OracleRequest(StatusRequest::new(
            4,
            SubjectKey::new("0xair", "ND1309", 1554952974),
            EventMetadata::at_block(12),
        ));
        assert_eq!(request.kind(), EventKind::OracleRequest);
        assert_eq!(request.name(), "OracleRequest");
        assert_eq!(request.block_number(), 12);

        let other = RegistryEvent::Other {
            name: "OracleReport".to_string(),
            metadata: EventMetadata::at_block(13),
        };
        assert_eq!(other.kind(), EventKind::Other);
        assert_eq!(other.name(), "OracleReport");
        assert_eq!(other.kind().label(), "other");
    }

    #[test]
    fn test_decodes_tagged_record() {
        let raw = r#"{
            "event": "FlightStatusInfo",
            "subject": { "airline": "0xair", "flight": "ND1310", "timestamp": 1554952975 },
            "status": 10,
            "metadata": { "block_number": 40, "transaction_hash": null }
        }"#;
        let event: RegistryEvent = serde_json::from_str(raw).unwrap();
        match event {
            RegistryEvent::FlightStatusInfo { subject, status, .. } => {
                assert_eq!(subject.flight, "ND1310");
                assert_eq!(status, StatusCode::OnTime);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
