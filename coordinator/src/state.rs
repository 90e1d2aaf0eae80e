// VRF Coordinator - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    keccak,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::error::CoordinatorError;

/// Upper bound of random words per request
pub const MAX_NUM_WORDS: u32 = 500;
/// Upper bound of confirmations a consumer may ask for
pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;
/// Upper bound of the gas budget recorded for a callback
pub const MAX_CALLBACK_GAS_LIMIT: u32 = 2_500_000;
/// Consumers that can share one subscription
pub const MAX_CONSUMERS: usize = 4;

/// Global coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorState {
    pub is_initialized: bool,
    /// Account that initialized the coordinator
    pub admin: Pubkey,
    /// Flat amount charged to a subscription per fulfillment
    pub base_fee: u64,
    /// Id handed to the next randomness request
    pub next_request_id: u64,
    /// Id handed to the next subscription
    pub next_subscription_id: u64,
}

/// Funded subscription shared by a set of consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub is_initialized: bool,
    pub id: u64,
    pub owner: Pubkey,
    pub balance: u64,
    pub consumer_count: u8,
    pub consumers: [Pubkey; MAX_CONSUMERS],
}

impl Subscription {
    pub fn is_consumer(&self, key: &Pubkey) -> bool {
        self.consumers[..self.consumer_count as usize]
            .iter()
            .any(|consumer| consumer == key)
    }

    /// Register a consumer. Adding one that is already present is a no-op.
    pub fn add_consumer(&mut self, key: Pubkey) -> Result<(), CoordinatorError> {
        if self.is_consumer(&key) {
            return Ok(());
        }
        let index = self.consumer_count as usize;
        if index >= MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers);
        }
        self.consumers[index] = key;
        self.consumer_count += 1;
        Ok(())
    }
}

/// A randomness request waiting for fulfillment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub is_initialized: bool,
    pub request_id: u64,
    pub subscription_id: u64,
    /// Account that signed the request
    pub consumer: Pubkey,
    /// Program invoked with the random words
    pub consumer_program: Pubkey,
    /// Paid for the request account, refunded when it is closed on fulfillment
    pub payer: Pubkey,
    pub num_words: u32,
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
    /// First byte of the callback instruction data
    pub callback_tag: u8,
    pub key_hash: [u8; 32],
    pub requested_at_slot: u64,
}

impl Sealed for CoordinatorState {}
impl Sealed for Subscription {}
impl Sealed for RandomnessRequest {}

impl IsInitialized for CoordinatorState {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for Subscription {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for RandomnessRequest {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for CoordinatorState {
    const LEN: usize = 1 + 32 + 8 + 8 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, CoordinatorState::LEN];
        let (is_initialized, admin, base_fee, next_request_id, next_subscription_id) =
            array_refs![src, 1, 32, 8, 8, 8];

        Ok(CoordinatorState {
            is_initialized: is_initialized[0] != 0,
            admin: Pubkey::new_from_array(*admin),
            base_fee: u64::from_le_bytes(*base_fee),
            next_request_id: u64::from_le_bytes(*next_request_id),
            next_subscription_id: u64::from_le_bytes(*next_subscription_id),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, CoordinatorState::LEN];
        let (is_initialized_dst, admin_dst, base_fee_dst, next_request_id_dst, next_subscription_id_dst) =
            mut_array_refs![dst, 1, 32, 8, 8, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        admin_dst.copy_from_slice(self.admin.as_ref());
        *base_fee_dst = self.base_fee.to_le_bytes();
        *next_request_id_dst = self.next_request_id.to_le_bytes();
        *next_subscription_id_dst = self.next_subscription_id.to_le_bytes();
    }
}

impl Pack for Subscription {
    const LEN: usize = 1 + 8 + 32 + 8 + 1 + 32 * MAX_CONSUMERS;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Subscription::LEN];
        let (is_initialized, id, owner, balance, consumer_count, consumers_src) =
            array_refs![src, 1, 8, 32, 8, 1, 32 * MAX_CONSUMERS];

        let consumer_count = consumer_count[0];
        if consumer_count as usize > MAX_CONSUMERS {
            return Err(ProgramError::InvalidAccountData);
        }

        let mut consumers = [Pubkey::default(); MAX_CONSUMERS];
        for (i, consumer) in consumers.iter_mut().enumerate() {
            *consumer = Pubkey::new_from_array(*array_ref![consumers_src, i * 32, 32]);
        }

        Ok(Subscription {
            is_initialized: is_initialized[0] != 0,
            id: u64::from_le_bytes(*id),
            owner: Pubkey::new_from_array(*owner),
            balance: u64::from_le_bytes(*balance),
            consumer_count,
            consumers,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Subscription::LEN];
        let (is_initialized_dst, id_dst, owner_dst, balance_dst, consumer_count_dst, consumers_dst) =
            mut_array_refs![dst, 1, 8, 32, 8, 1, 32 * MAX_CONSUMERS];

        is_initialized_dst[0] = self.is_initialized as u8;
        *id_dst = self.id.to_le_bytes();
        owner_dst.copy_from_slice(self.owner.as_ref());
        *balance_dst = self.balance.to_le_bytes();
        consumer_count_dst[0] = self.consumer_count;
        for (i, consumer) in self.consumers.iter().enumerate() {
            consumers_dst[i * 32..(i + 1) * 32].copy_from_slice(consumer.as_ref());
        }
    }
}

impl Pack for RandomnessRequest {
    const LEN: usize = 1 + 8 + 8 + 32 + 32 + 32 + 4 + 4 + 2 + 1 + 32 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RandomnessRequest::LEN];
        let (
            is_initialized,
            request_id,
            subscription_id,
            consumer,
            consumer_program,
            payer,
            num_words,
            callback_gas_limit,
            request_confirmations,
            callback_tag,
            key_hash,
            requested_at_slot,
        ) = array_refs![src, 1, 8, 8, 32, 32, 32, 4, 4, 2, 1, 32, 8];

        Ok(RandomnessRequest {
            is_initialized: is_initialized[0] != 0,
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer: Pubkey::new_from_array(*consumer),
            consumer_program: Pubkey::new_from_array(*consumer_program),
            payer: Pubkey::new_from_array(*payer),
            num_words: u32::from_le_bytes(*num_words),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            request_confirmations: u16::from_le_bytes(*request_confirmations),
            callback_tag: callback_tag[0],
            key_hash: *key_hash,
            requested_at_slot: u64::from_le_bytes(*requested_at_slot),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RandomnessRequest::LEN];
        let (
            is_initialized_dst,
            request_id_dst,
            subscription_id_dst,
            consumer_dst,
            consumer_program_dst,
            payer_dst,
            num_words_dst,
            callback_gas_limit_dst,
            request_confirmations_dst,
            callback_tag_dst,
            key_hash_dst,
            requested_at_slot_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 32, 32, 4, 4, 2, 1, 32, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_dst.copy_from_slice(self.consumer.as_ref());
        consumer_program_dst.copy_from_slice(self.consumer_program.as_ref());
        payer_dst.copy_from_slice(self.payer.as_ref());
        *num_words_dst = self.num_words.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        *request_confirmations_dst = self.request_confirmations.to_le_bytes();
        callback_tag_dst[0] = self.callback_tag;
        key_hash_dst.copy_from_slice(&self.key_hash);
        *requested_at_slot_dst = self.requested_at_slot.to_le_bytes();
    }
}

/// Derive `num_words` random words for a request.
///
/// Word `i` is the first 16 bytes of `keccak(request_id || i)`, read little-endian.
pub fn derive_random_words(request_id: u64, num_words: u32) -> Vec<u128> {
    (0..num_words)
        .map(|index| {
            let hash = keccak::hashv(&[&request_id.to_le_bytes(), &index.to_le_bytes()]);
            u128::from_le_bytes(*array_ref![hash.0, 0, 16])
        })
        .collect()
}
