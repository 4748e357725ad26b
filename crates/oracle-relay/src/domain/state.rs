//! Relay halt state
//!
//! Owned by the event relay and written only from its handler. Nothing
//! here is shared across tasks.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::request::SubjectKey;

/// What a terminal status event stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HaltPolicy {
    /// The first terminal status event halts the relay for every later
    /// request until restart.
    #[default]
    Global,
    /// Only requests for a subject whose status was already finalized are
    /// skipped; the relay stays active.
    PerSubject,
}

impl FromStr for HaltPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(HaltPolicy::Global),
            "per-subject" | "per_subject" | "subject" => Ok(HaltPolicy::PerSubject),
            other => Err(format!("unknown halt policy {:?}", other)),
        }
    }
}

impl fmt::Display for HaltPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltPolicy::Global => f.write_str("global"),
            HaltPolicy::PerSubject => f.write_str("per-subject"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayPhase {
    Active,
    /// Terminal until restart.
    Halted,
}

#[derive(Debug, Clone)]
pub struct RelayState {
    policy: HaltPolicy,
    halted: bool,
    concluded: HashSet<SubjectKey>,
}

impl RelayState {
    pub fn new(policy: HaltPolicy) -> Self {
        Self {
            policy,
            halted: false,
            concluded: HashSet::new(),
        }
    }

    pub fn policy(&self) -> HaltPolicy {
        self.policy
    }

    pub fn phase(&self) -> RelayPhase {
        if self.halted {
            RelayPhase::Halted
        } else {
            RelayPhase::Active
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Record a finalized subject. Returns `true` when this transitions the
    /// relay to [`RelayPhase::Halted`].
    ///
    /// Under [`HaltPolicy::PerSubject`] every concluded subject is kept for
    /// the life of the process, so the set grows with the number of
    /// distinct flights finalized.
    pub fn record_terminal(&mut self, subject: SubjectKey) -> bool {
        match self.policy {
            HaltPolicy::Global if !self.halted => {
                self.halted = true;
                true
            }
            HaltPolicy::Global => false,
            HaltPolicy::PerSubject => {
                self.concluded.insert(subject);
                false
            }
        }
    }

    /// Whether a request for `subject` must be skipped.
    pub fn suppresses(&self, subject: &SubjectKey) -> bool {
        match self.policy {
            HaltPolicy::Global => self.halted,
            HaltPolicy::PerSubject => self.concluded.contains(subject),
        }
    }

    /// Subjects remembered as concluded. Always zero under
    /// [`HaltPolicy::Global`], which only tracks the halt flag.
    pub fn concluded_subjects(&self) -> usize {
        self.concluded.len()
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new(HaltPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(flight: &str) -> SubjectKey {
        SubjectKey::new("0xair", flight, 1554952974)
    }

    #[test]
    fn test_global_halts_everything() {
        let mut state = RelayState::new(HaltPolicy::Global);
        assert_eq!(state.phase(), RelayPhase::Active);
        assert!(!state.suppresses(&subject("ND1309")));

        assert!(state.record_terminal(subject("ND1309")));
        assert_eq!(state.phase(), RelayPhase::Halted);
        assert!(state.suppresses(&subject("ND1309")));
        assert!(state.suppresses(&subject("ND1310")));

        // Already halted: no second transition
        assert!(!state.record_terminal(subject("ND1310")));
    }

    #[test]
    fn test_global_does_not_remember_subjects() {
        let mut state = RelayState::new(HaltPolicy::Global);
        for flight in ["ND1309", "ND1310", "ND1311"] {
            state.record_terminal(subject(flight));
        }
        assert!(state.is_halted());
        assert_eq!(state.concluded_subjects(), 0);
    }

    #[test]
    fn test_per_subject_only_suppresses_concluded() {
        let mut state = RelayState::new(HaltPolicy::PerSubject);
        assert!(!state.record_terminal(subject("ND1309")));
        assert_eq!(state.phase(), RelayPhase::Active);
        assert!(state.suppresses(&subject("ND1309")));
        assert!(!state.suppresses(&subject("ND1310")));
        assert_eq!(state.concluded_subjects(), 1);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("global".parse::<HaltPolicy>().unwrap(), HaltPolicy::Global);
        assert_eq!("Per-Subject".parse::<HaltPolicy>().unwrap(), HaltPolicy::PerSubject);
        assert!("never".parse::<HaltPolicy>().is_err());
        assert_eq!(HaltPolicy::PerSubject.to_string(), "per-subject");
    }
}
