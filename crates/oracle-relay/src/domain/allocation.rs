//! Oracle identity allocation
//!
//! The registry exposes one account universe shared by airlines,
//! passengers and oracles. Oracles take a contiguous slice of it.

use crate::domain::oracle::OracleHandle;
use crate::error::AllocationError;

/// First account index handed to oracles.
pub const DEFAULT_ORACLE_START_INDEX: usize = 10;

/// Number of oracle identities the relay runs.
pub const DEFAULT_ORACLE_COUNT: usize = 30;

/// Take `count` accounts starting at `start` as oracle identities.
pub fn allocate_oracles(
    accounts: &[OracleHandle],
    start: usize,
    count: usize,
) -> Result<Vec<OracleHandle>, AllocationError> {
    if accounts.is_empty() {
        return Err(AllocationError::NoAccounts);
    }
    if accounts.len() < start {
        return Err(AllocationError::StartBeyondAccounts {
            start,
            available: accounts.len(),
        });
    }
    let end = match start.checked_add(count) {
        Some(end) if end <= accounts.len() => end,
        end => {
            return Err(AllocationError::NotEnoughAccounts {
                start,
                end: end.unwrap_or(usize::MAX),
                available: accounts.len(),
            })
        }
    };
    Ok(accounts[start..end].to_vec())
}
