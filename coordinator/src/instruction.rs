// VRF Coordinator - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    error::CoordinatorError, find_authority_address, find_request_address, find_state_address,
    find_subscription_address,
};

/// Parameters a consumer sends with a randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RequestParams {
    /// Lane identifying the oracle key and price tier
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// First byte of the instruction data the consumer expects for the callback
    pub callback_tag: u8,
}

/// Payload delivered to the consumer program, after its callback tag
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomWordsCallback {
    pub request_id: u64,
    pub random_words: Vec<u128>,
}

impl RandomWordsCallback {
    /// Build the consumer instruction data: `[tag] ++ borsh(self)`
    pub fn to_instruction_data(&self, callback_tag: u8) -> Result<Vec<u8>, ProgramError> {
        let mut data = vec![callback_tag];
        data.extend_from_slice(&self.try_to_vec()?);
        Ok(data)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorInstruction {
    /// Create the coordinator state
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Admin, pays for the state account
    /// 1. `[writable]` Coordinator state PDA
    /// 2. `[]` System program
    Initialize { base_fee: u64 },

    /// Create a subscription owned by the signer, using the next subscription id
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Owner, pays for the subscription account
    /// 1. `[writable]` Coordinator state PDA
    /// 2. `[writable]` Subscription PDA
    /// 3. `[]` System program
    CreateSubscription,

    /// Credit a subscription balance
    ///
    /// Accounts expected:
    /// 0. `[signer]` Funder
    /// 1. `[writable]` Subscription PDA
    FundSubscription { subscription_id: u64, amount: u64 },

    /// Register a consumer account on a subscription
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription PDA
    AddConsumer { subscription_id: u64, consumer: Pubkey },

    /// Record a randomness request and return its id as return data
    ///
    /// Accounts expected:
    /// 0. `[signer]` Consumer account registered on the subscription
    /// 1. `[]` Program owning the consumer account, invoked on fulfillment
    /// 2. `[writable]` Coordinator state PDA
    /// 3. `[]` Subscription PDA
    /// 4. `[writable]` Request PDA for the next request id
    /// 5. `[signer, writable]` Payer of the request account
    /// 6. `[]` System program
    RequestRandomWords(RequestParams),

    /// Deliver random words to the consumer program
    ///
    /// Accounts expected:
    /// 0. `[]` Coordinator state PDA
    /// 1. `[writable]` Subscription PDA
    /// 2. `[writable]` Request PDA
    /// 3. `[]` Coordinator authority PDA, signs the callback
    /// 4. `[]` Consumer program
    /// 5. `[writable]` Payer of the request account, refunded when it is closed
    /// 6.. Accounts forwarded to the consumer callback
    FulfillRandomWords {
        request_id: u64,
        random_words_override: Option<Vec<u128>>,
    },
}

impl CoordinatorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| CoordinatorError::InvalidInstruction.into())
    }
}

/// Create initialize instruction
pub fn initialize(program_id: &Pubkey, admin: &Pubkey, base_fee: u64) -> Instruction {
    let (state, _) = find_state_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::Initialize { base_fee },
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(state, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create create_subscription instruction. `subscription_id` must be the
/// coordinator's current `next_subscription_id`.
pub fn create_subscription(program_id: &Pubkey, owner: &Pubkey, subscription_id: u64) -> Instruction {
    let (state, _) = find_state_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::CreateSubscription,
        vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(state, false),
            AccountMeta::new(subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    program_id: &Pubkey,
    funder: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Instruction {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::FundSubscription {
            subscription_id,
            amount,
        },
        vec![
            AccountMeta::new_readonly(*funder, true),
            AccountMeta::new(subscription, false),
        ],
    )
}

/// Create add_consumer instruction
pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
    consumer: &Pubkey,
) -> Instruction {
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::AddConsumer {
            subscription_id,
            consumer: *consumer,
        },
        vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(subscription, false),
        ],
    )
}

/// Create request_random_words instruction. `request_id` must be the
/// coordinator's current `next_request_id`.
pub fn request_random_words(
    program_id: &Pubkey,
    consumer: &Pubkey,
    consumer_program: &Pubkey,
    payer: &Pubkey,
    request_id: u64,
    params: RequestParams,
) -> Instruction {
    let (state, _) = find_state_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, params.subscription_id);
    let (request, _) = find_request_address(program_id, request_id);
    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::RequestRandomWords(params),
        vec![
            AccountMeta::new_readonly(*consumer, true),
            AccountMeta::new_readonly(*consumer_program, false),
            AccountMeta::new(state, false),
            AccountMeta::new_readonly(subscription, false),
            AccountMeta::new(request, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create fulfill_random_words instruction. `consumer_accounts` are forwarded
/// to the consumer callback after the coordinator authority.
pub fn fulfill_random_words(
    program_id: &Pubkey,
    request_id: u64,
    subscription_id: u64,
    consumer_program: &Pubkey,
    request_payer: &Pubkey,
    consumer_accounts: &[AccountMeta],
    random_words_override: Option<Vec<u128>>,
) -> Instruction {
    let (state, _) = find_state_address(program_id);
    let (subscription, _) = find_subscription_address(program_id, subscription_id);
    let (request, _) = find_request_address(program_id, request_id);
    let (authority, _) = find_authority_address(program_id);

    let mut accounts = vec![
        AccountMeta::new_readonly(state, false),
        AccountMeta::new(subscription, false),
        AccountMeta::new(request, false),
        AccountMeta::new_readonly(authority, false),
        AccountMeta::new_readonly(*consumer_program, false),
        AccountMeta::new(*request_payer, false),
    ];
    accounts.extend_from_slice(consumer_accounts);

    Instruction::new_with_borsh(
        *program_id,
        &CoordinatorInstruction::FulfillRandomWords {
            request_id,
            random_words_override,
        },
        accounts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_starts_with_tag() {
        let callback = RandomWordsCallback {
            request_id: 9,
            random_words: vec![37],
        };
        let data = callback.to_instruction_data(4).unwrap();

        assert_eq!(data[0], 4);
        assert_eq!(RandomWordsCallback::try_from_slice(&data[1..]).unwrap(), callback);
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert_eq!(
            CoordinatorInstruction::unpack(&[42, 1, 2]),
            Err(CoordinatorError::InvalidInstruction.into())
        );
    }
}
