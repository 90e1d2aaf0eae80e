// Autoraffle - Upkeep
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, program_error::ProgramError};

use crate::state::{Raffle, RaffleState};

/// Why a drawing is or is not due
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpkeepReason {
    Due,
    NotOpen,
    IntervalNotElapsed,
    NoParticipants,
    EmptyPool,
}

/// Result of the upkeep check, published as return data by `CheckUpkeep`
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub needed: bool,
    pub reason: UpkeepReason,
}

impl UpkeepStatus {
    /// Encoded size: one byte for `needed`, one for the reason index
    pub const LEN: usize = 2;

    /// Decode `CheckUpkeep` return data.
    ///
    /// The runtime strips trailing zero bytes from return data, so a short
    /// buffer is padded back to `LEN` before decoding.
    pub fn from_return_data(data: &[u8]) -> Result<Self, ProgramError> {
        if data.len() > Self::LEN {
            return Err(ProgramError::InvalidAccountData);
        }
        let mut buf = [0u8; Self::LEN];
        buf[..data.len()].copy_from_slice(data);
        Self::try_from_slice(&buf).map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    fn not_needed(reason: UpkeepReason) -> Self {
        Self {
            needed: false,
            reason,
        }
    }
}

/// A drawing is due when the round is open, the interval has elapsed and
/// the round holds at least one paid entry.
pub fn is_drawing_due(
    now: UnixTimestamp,
    last_round_start: UnixTimestamp,
    interval: i64,
    participant_count: usize,
    pool_balance: u64,
    state: RaffleState,
) -> UpkeepStatus {
    if state != RaffleState::Open {
        return UpkeepStatus::not_needed(UpkeepReason::NotOpen);
    }
    if now.saturating_sub(last_round_start) < interval {
        return UpkeepStatus::not_needed(UpkeepReason::IntervalNotElapsed);
    }
    if participant_count == 0 {
        return UpkeepStatus::not_needed(UpkeepReason::NoParticipants);
    }
    if pool_balance == 0 {
        return UpkeepStatus::not_needed(UpkeepReason::EmptyPool);
    }
    UpkeepStatus {
        needed: true,
        reason: UpkeepReason::Due,
    }
}

impl Raffle {
    pub fn check_upkeep(&self, now: UnixTimestamp) -> UpkeepStatus {
        is_drawing_due(
            now,
            self.last_round_start,
            self.config.interval,
            self.participants.len(),
            self.pool_balance,
            self.state,
        )
    }
}
