//! Flight status codes and the sources that pick them
//!
//! The registry only knows the numeric codes; the relay never interprets
//! them beyond picking one per matched oracle.

use std::fmt;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Status value an oracle reports for a flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum StatusCode {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl StatusCode {
    /// Every code the registry accepts, in ascending order.
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Unknown => "unknown",
            StatusCode::OnTime => "on-time",
            StatusCode::LateAirline => "late-airline",
            StatusCode::LateWeather => "late-weather",
            StatusCode::LateTechnical => "late-technical",
            StatusCode::LateOther => "late-other",
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = DomainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        StatusCode::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or(DomainError::InvalidStatus(code))
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

/// Picks the status an oracle reports.
pub trait StatusSource: Send + Sync {
    fn next_status(&self) -> StatusCode;
}

/// Uniform pick over [`StatusCode::ALL`] from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformStatusSource;

impl StatusSource for UniformStatusSource {
    fn next_status(&self) -> StatusCode {
        *StatusCode::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&StatusCode::Unknown)
    }
}

/// Always reports the same status.
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusSource(pub StatusCode);

impl StatusSource for FixedStatusSource {
    fn next_status(&self) -> StatusCode {
        self.0
    }
}

/// Replays a fixed list of statuses, wrapping around at the end.
#[derive(Debug)]
pub struct SequenceStatusSource {
    statuses: Vec<StatusCode>,
    cursor: Mutex<usize>,
}

impl SequenceStatusSource {
    /// An empty list behaves like `FixedStatusSource(StatusCode::Unknown)`.
    pub fn new(statuses: Vec<StatusCode>) -> Self {
        Self {
            statuses,
            cursor: Mutex::new(0),
        }
    }
}

impl StatusSource for SequenceStatusSource {
    fn next_status(&self) -> StatusCode {
        if self.statuses.is_empty() {
            return StatusCode::Unknown;
        }
        let mut cursor = self.cursor.lock();
        let status = self.statuses[*cursor % self.statuses.len()];
        *cursor = cursor.wrapping_add(1);
        status
    }
}
