// Autoraffle - VRF Client
// Client side of the randomness coordinator, invoked through CPI
use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
};
use vrf_coordinator::instruction::{CoordinatorInstruction, RequestParams};

use crate::{
    draw::{DrawRequest, RandomnessCoordinator},
    error::RaffleError,
    instruction::FULFILL_RANDOM_WORDS_TAG,
};

/// Accounts needed to file a randomness request on behalf of the raffle
pub struct CoordinatorClient<'a, 'b> {
    pub coordinator_program: &'b AccountInfo<'a>,
    /// Raffle PDA, the registered consumer
    pub consumer: &'b AccountInfo<'a>,
    /// This program, called back on fulfillment
    pub consumer_program: &'b AccountInfo<'a>,
    pub coordinator_state: &'b AccountInfo<'a>,
    pub subscription: &'b AccountInfo<'a>,
    pub request: &'b AccountInfo<'a>,
    pub payer: &'b AccountInfo<'a>,
    pub system_program: &'b AccountInfo<'a>,
    /// Seeds of the raffle PDA, including the bump
    pub consumer_seeds: &'b [&'b [u8]],
}

impl<'a, 'b> RandomnessCoordinator for CoordinatorClient<'a, 'b> {
    fn request_random_words(&mut self, request: &DrawRequest) -> Result<u64, ProgramError> {
        let params = RequestParams {
            key_hash: request.key_hash,
            subscription_id: request.subscription_id,
            request_confirmations: request.request_confirmations,
            callback_gas_limit: request.callback_gas_limit,
            num_words: request.num_words,
            callback_tag: FULFILL_RANDOM_WORDS_TAG,
        };
        let ix = Instruction::new_with_borsh(
            *self.coordinator_program.key,
            &CoordinatorInstruction::RequestRandomWords(params),
            vec![
                AccountMeta::new_readonly(*self.consumer.key, true),
                AccountMeta::new_readonly(*self.consumer_program.key, false),
                AccountMeta::new(*self.coordinator_state.key, false),
                AccountMeta::new_readonly(*self.subscription.key, false),
                AccountMeta::new(*self.request.key, false),
                AccountMeta::new(*self.payer.key, true),
                AccountMeta::new_readonly(*self.system_program.key, false),
            ],
        );

        invoke_signed(
            &ix,
            &[
                self.consumer.clone(),
                self.consumer_program.clone(),
                self.coordinator_state.clone(),
                self.subscription.clone(),
                self.request.clone(),
                self.payer.clone(),
                self.system_program.clone(),
                self.coordinator_program.clone(),
            ],
            &[self.consumer_seeds],
        )?;

        let (program_id, data) = get_return_data().ok_or_else(|| {
            msg!("Coordinator returned no request id");
            RaffleError::InvalidCoordinator
        })?;
        if program_id != *self.coordinator_program.key {
            msg!("Return data was set by {}", program_id);
            return Err(RaffleError::InvalidCoordinator.into());
        }
        let id_bytes: [u8; 8] = data
            .as_slice()
            .try_into()
            .map_err(|_| RaffleError::InvalidCoordinator)?;
        Ok(u64::from_le_bytes(id_bytes))
    }
}
