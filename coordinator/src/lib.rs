// Development VRF coordinator
// Issues request ids against funded subscriptions and calls the consumer
// program back with random words. Stands in for the oracle network's
// coordinator on local clusters and in tests.

pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::pubkey::Pubkey;

/// Seed of the PDA that signs consumer callbacks
pub const AUTHORITY_SEED: &[u8] = b"coordinator";
/// Seed of the global coordinator state account
pub const STATE_SEED: &[u8] = b"coordinator-state";
pub const SUBSCRIPTION_SEED: &[u8] = b"subscription";
pub const REQUEST_SEED: &[u8] = b"request";

/// Find the PDA that signs every consumer callback
pub fn find_authority_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[AUTHORITY_SEED], program_id)
}

/// Find the coordinator state account
pub fn find_state_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[STATE_SEED], program_id)
}

/// Find the account of a subscription
pub fn find_subscription_address(program_id: &Pubkey, subscription_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes()],
        program_id,
    )
}

/// Find the account recording a pending randomness request
pub fn find_request_address(program_id: &Pubkey, request_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REQUEST_SEED, &request_id.to_le_bytes()], program_id)
}
