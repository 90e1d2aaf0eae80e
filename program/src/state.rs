// Autoraffle - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, program_error::ProgramError,
    program_pack::IsInitialized, pubkey::Pubkey,
};
use vrf_coordinator::state::{MAX_CALLBACK_GAS_LIMIT, MAX_REQUEST_CONFIRMATIONS};

use crate::{
    constants::{
        DEFAULT_CALLBACK_GAS_LIMIT, DEFAULT_ENTRANCE_FEE, DEFAULT_INTERVAL,
        DEFAULT_REQUEST_CONFIRMATIONS, MAX_PARTICIPANTS, NUM_WORDS,
    },
    error::RaffleError,
    events::{EventSink, RaffleEvent},
};

/// Phase of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// A randomness request is outstanding
    Drawing,
}

/// Deployment parameters, fixed at initialization
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum lamports per entry
    pub entrance_fee: u64,
    /// Seconds a round stays open before a drawing is due
    pub interval: i64,
    /// Oracle lane the randomness is requested on
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub coordinator_program: Pubkey,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 8 + 2 + 4 + 32;

    /// Parameters used on local clusters
    pub fn development(coordinator_program: Pubkey, subscription_id: u64) -> Self {
        Self {
            entrance_fee: DEFAULT_ENTRANCE_FEE,
            interval: DEFAULT_INTERVAL,
            key_hash: [0; 32],
            subscription_id,
            request_confirmations: DEFAULT_REQUEST_CONFIRMATIONS,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            coordinator_program,
        }
    }

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0
            || self.interval <= 0
            || self.request_confirmations > MAX_REQUEST_CONFIRMATIONS
            || self.callback_gas_limit > MAX_CALLBACK_GAS_LIMIT
        {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

/// The raffle aggregate: configuration, round state and ledger
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    pub is_initialized: bool,
    /// Bump of the raffle PDA
    pub bump: u8,
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// Start of the current round
    pub last_round_start: UnixTimestamp,
    /// Lamports collected in the current round
    pub pool_balance: u64,
    /// One entry per paid entrance, in order
    pub participants: Vec<Pubkey>,
    /// Request id of the outstanding randomness request
    pub pending_request: Option<u64>,
    pub recent_winner: Option<Pubkey>,
    /// Number of the current round, starting at 1
    pub round: u64,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    /// Account size with the participant list at full capacity
    pub const LEN: usize = 1
        + 1
        + RaffleConfig::LEN
        + 1
        + 8
        + 8
        + (4 + 32 * MAX_PARTICIPANTS)
        + (1 + 8)
        + (1 + 32)
        + 8;

    pub fn new(bump: u8, config: RaffleConfig, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            state: RaffleState::Open,
            last_round_start: now,
            pool_balance: 0,
            participants: Vec::new(),
            pending_request: None,
            recent_winner: None,
            round: 1,
        }
    }

    /// Read the raffle from account data. Trailing capacity is ignored.
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let raffle =
            Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    pub fn save(&self, data: &mut [u8]) -> ProgramResult {
        let mut writer = data;
        self.serialize(&mut writer)
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    /// Record a paid entry. The pool grows by the full amount paid.
    pub fn deposit(
        &mut self,
        participant: Pubkey,
        amount: u64,
        events: &mut impl EventSink,
    ) -> Result<(), RaffleError> {
        if amount < self.config.entrance_fee {
            return Err(RaffleError::InsufficientFee);
        }
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(RaffleError::RaffleFull);
        }
        self.pool_balance = self
            .pool_balance
            .checked_add(amount)
            .ok_or(RaffleError::AmountOverflow)?;
        self.participants.push(participant);

        events.emit(RaffleEvent::EntryAccepted {
            participant,
            amount,
        });
        Ok(())
    }

    /// Start the next round at `now` with an empty ledger
    pub(crate) fn reset_round(&mut self, now: UnixTimestamp) {
        self.participants.clear();
        self.pool_balance = 0;
        self.last_round_start = now;
        self.state = RaffleState::Open;
        self.round = self.round.saturating_add(1);
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participant(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.participants
            .get(index)
            .copied()
            .ok_or(RaffleError::IndexOutOfRange)
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn last_round_start(&self) -> UnixTimestamp {
        self.last_round_start
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.request_confirmations
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.pending_request
    }
}
