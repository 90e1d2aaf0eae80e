// Autoraffle - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use vrf_coordinator::{
    find_request_address, find_state_address, find_subscription_address,
};

use crate::{error::RaffleError, state::RaffleConfig, utils::find_raffle_address};

/// First byte of `FulfillRandomWords` data, handed to the coordinator as the callback tag
pub const FULFILL_RANDOM_WORDS_TAG: u8 = 4;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create the raffle account and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Authority, pays for the raffle account
    /// 1. `[writable]` Raffle PDA
    /// 2. `[]` Coordinator program
    /// 3. `[]` System program
    Initialize {
        entrance_fee: u64,
        interval: i64,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
    },

    /// Pay into the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Player
    /// 1. `[writable]` Raffle PDA
    /// 2. `[]` System program
    Enter { amount: u64 },

    /// Report whether a drawing is due, as `UpkeepStatus` return data
    ///
    /// Accounts expected:
    /// 0. `[]` Raffle PDA
    CheckUpkeep,

    /// Request randomness for a drawing once one is due
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Keeper, pays for the coordinator request account
    /// 1. `[writable]` Raffle PDA
    /// 2. `[]` Raffle program
    /// 3. `[]` Coordinator program
    /// 4. `[writable]` Coordinator state
    /// 5. `[]` Coordinator subscription
    /// 6. `[writable]` Coordinator request account
    /// 7. `[]` System program
    PerformUpkeep,

    /// Callback from the coordinator carrying the random words
    ///
    /// Accounts expected:
    /// 0. `[signer]` Coordinator authority PDA
    /// 1. `[writable]` Raffle PDA
    /// 2. `[writable]` Winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u128>,
    },
}

impl RaffleInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| RaffleError::InvalidInstruction.into())
    }
}

/// Create initialize instruction
pub fn initialize(program_id: &Pubkey, authority: &Pubkey, config: &RaffleConfig) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::Initialize {
            entrance_fee: config.entrance_fee,
            interval: config.interval,
            key_hash: config.key_hash,
            subscription_id: config.subscription_id,
            request_confirmations: config.request_confirmations,
            callback_gas_limit: config.callback_gas_limit,
        },
        vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(config.coordinator_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::Enter { amount },
        vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::CheckUpkeep,
        vec![AccountMeta::new_readonly(raffle, false)],
    )
}

/// Create perform_upkeep instruction. `request_id` must be the coordinator's
/// next request id, which decides the request account address.
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    coordinator_program: &Pubkey,
    subscription_id: u64,
    request_id: u64,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    let (state, _) = find_state_address(coordinator_program);
    let (subscription, _) = find_subscription_address(coordinator_program, subscription_id);
    let (request, _) = find_request_address(coordinator_program, request_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::PerformUpkeep,
        vec![
            AccountMeta::new(*keeper, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(*program_id, false),
            AccountMeta::new_readonly(*coordinator_program, false),
            AccountMeta::new(state, false),
            AccountMeta::new_readonly(subscription, false),
            AccountMeta::new(request, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create the coordinator instruction that fulfills a raffle request and
/// forwards the raffle accounts to the callback. `request_payer` is refunded
/// the request account rent once the request is closed.
pub fn fulfill_through_coordinator(
    program_id: &Pubkey,
    coordinator_program: &Pubkey,
    request_id: u64,
    subscription_id: u64,
    request_payer: &Pubkey,
    winner: &Pubkey,
    random_words_override: Option<Vec<u128>>,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id);
    vrf_coordinator::instruction::fulfill_random_words(
        coordinator_program,
        request_id,
        subscription_id,
        program_id,
        request_payer,
        &[AccountMeta::new(raffle, false), AccountMeta::new(*winner, false)],
        random_words_override,
    )
}
