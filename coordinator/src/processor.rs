// VRF Coordinator - Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    error::CoordinatorError,
    find_authority_address, find_request_address, find_state_address, find_subscription_address,
    instruction::{CoordinatorInstruction, RandomWordsCallback, RequestParams},
    state::{
        derive_random_words, CoordinatorState, RandomnessRequest, Subscription,
        MAX_CALLBACK_GAS_LIMIT, MAX_CONSUMERS, MAX_NUM_WORDS, MAX_REQUEST_CONFIRMATIONS,
    },
    AUTHORITY_SEED, REQUEST_SEED, STATE_SEED, SUBSCRIPTION_SEED,
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = CoordinatorInstruction::unpack(instruction_data)?;

        match instruction {
            CoordinatorInstruction::Initialize { base_fee } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, base_fee)
            }
            CoordinatorInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                Self::process_create_subscription(program_id, accounts)
            }
            CoordinatorInstruction::FundSubscription {
                subscription_id,
                amount,
            } => {
                msg!("Instruction: Fund Subscription");
                Self::process_fund_subscription(program_id, accounts, subscription_id, amount)
            }
            CoordinatorInstruction::AddConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Add Consumer");
                Self::process_add_consumer(program_id, accounts, subscription_id, consumer)
            }
            CoordinatorInstruction::RequestRandomWords(params) => {
                msg!("Instruction: Request Random Words");
                Self::process_request_random_words(program_id, accounts, params)
            }
            CoordinatorInstruction::FulfillRandomWords {
                request_id,
                random_words_override,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(
                    program_id,
                    accounts,
                    request_id,
                    random_words_override,
                )
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        base_fee: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let state_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_state, bump) = find_state_address(program_id);
        if *state_info.key != expected_state {
            msg!("Invalid coordinator state address");
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }
        if state_info.owner == program_id {
            msg!("Coordinator state already exists");
            return Err(CoordinatorError::AlreadyInitialized.into());
        }

        create_pda_account(
            admin_info,
            state_info,
            system_program_info,
            CoordinatorState::LEN,
            program_id,
            &[STATE_SEED, &[bump]],
        )?;

        let state = CoordinatorState {
            is_initialized: true,
            admin: *admin_info.key,
            base_fee,
            next_request_id: 1,
            next_subscription_id: 1,
        };
        CoordinatorState::pack(state, &mut state_info.data.borrow_mut())?;

        msg!("Coordinator initialized: admin={}, base_fee={}", admin_info.key, base_fee);
        Ok(())
    }

    fn process_create_subscription(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let state_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut state = load_state(program_id, state_info)?;
        let subscription_id = state.next_subscription_id;

        let (expected_subscription, bump) = find_subscription_address(program_id, subscription_id);
        if *subscription_info.key != expected_subscription {
            msg!("Subscription account does not match id {}", subscription_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        create_pda_account(
            owner_info,
            subscription_info,
            system_program_info,
            Subscription::LEN,
            program_id,
            &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes(), &[bump]],
        )?;

        let subscription = Subscription {
            is_initialized: true,
            id: subscription_id,
            owner: *owner_info.key,
            balance: 0,
            consumer_count: 0,
            consumers: [Pubkey::default(); MAX_CONSUMERS],
        };
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        state.next_subscription_id = subscription_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        CoordinatorState::pack(state, &mut state_info.data.borrow_mut())?;

        msg!("Subscription {} created for {}", subscription_id, owner_info.key);
        Ok(())
    }

    fn process_fund_subscription(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let funder_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !funder_info.is_signer {
            msg!("Funder must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut subscription = load_subscription(program_id, subscription_info, subscription_id)?;
        subscription.balance = subscription
            .balance
            .checked_add(amount)
            .ok_or(CoordinatorError::Overflow)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        msg!(
            "Subscription {} funded with {}, balance {}",
            subscription_id,
            amount,
            subscription.balance
        );
        Ok(())
    }

    fn process_add_consumer(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        subscription_id: u64,
        consumer: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let owner_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;

        if !owner_info.is_signer {
            msg!("Subscription owner must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut subscription = load_subscription(program_id, subscription_info, subscription_id)?;
        if subscription.owner != *owner_info.key {
            msg!("{} does not own subscription {}", owner_info.key, subscription_id);
            return Err(CoordinatorError::NotSubscriptionOwner.into());
        }

        subscription.add_consumer(consumer)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        msg!("Consumer {} added to subscription {}", consumer, subscription_id);
        Ok(())
    }

    fn process_request_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        params: RequestParams,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let consumer_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let state_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let payer_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !consumer_info.is_signer {
            msg!("Consumer must sign the request");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if consumer_info.owner != consumer_program_info.key {
            msg!("Consumer account is not owned by the callback program");
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        validate_request_params(&params)?;

        let mut state = load_state(program_id, state_info)?;
        let subscription =
            load_subscription(program_id, subscription_info, params.subscription_id)?;
        if !subscription.is_consumer(consumer_info.key) {
            msg!(
                "{} is not a consumer of subscription {}",
                consumer_info.key,
                params.subscription_id
            );
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        let request_id = state.next_request_id;
        let (expected_request, bump) = find_request_address(program_id, request_id);
        if *request_info.key != expected_request {
            msg!("Request account does not match id {}", request_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        create_pda_account(
            payer_info,
            request_info,
            system_program_info,
            RandomnessRequest::LEN,
            program_id,
            &[REQUEST_SEED, &request_id.to_le_bytes(), &[bump]],
        )?;

        let request = RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id: params.subscription_id,
            consumer: *consumer_info.key,
            consumer_program: *consumer_program_info.key,
            payer: *payer_info.key,
            num_words: params.num_words,
            callback_gas_limit: params.callback_gas_limit,
            request_confirmations: params.request_confirmations,
            callback_tag: params.callback_tag,
            key_hash: params.key_hash,
            requested_at_slot: Clock::get()?.slot,
        };
        RandomnessRequest::pack(request, &mut request_info.data.borrow_mut())?;

        state.next_request_id = request_id
            .checked_add(1)
            .ok_or(CoordinatorError::Overflow)?;
        CoordinatorState::pack(state, &mut state_info.data.borrow_mut())?;

        set_return_data(&request_id.to_le_bytes());
        msg!(
            "RandomWordsRequested: request_id={}, subscription_id={}, num_words={}, sender={}",
            request_id,
            params.subscription_id,
            params.num_words,
            consumer_info.key
        );
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words_override: Option<Vec<u128>>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let state_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let authority_info = next_account_info(account_info_iter)?;
        let consumer_program_info = next_account_info(account_info_iter)?;
        let request_payer_info = next_account_info(account_info_iter)?;
        let callback_infos: Vec<AccountInfo> = account_info_iter.cloned().collect();

        let state = load_state(program_id, state_info)?;

        let (expected_request, _) = find_request_address(program_id, request_id);
        if *request_info.key != expected_request {
            msg!("Request account does not match id {}", request_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }
        // fulfilled requests are closed, so an issued id without an account was already served
        if request_info.owner != program_id || request_info.data_is_empty() {
            if request_id > 0 && request_id < state.next_request_id {
                msg!("Request {} was already fulfilled", request_id);
                return Err(CoordinatorError::AlreadyFulfilled.into());
            }
            msg!("Unknown request {}", request_id);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }
        let request = RandomnessRequest::unpack(&request_info.data.borrow())?;

        if *request_payer_info.key != request.payer {
            msg!("Request {} was paid for by {}", request_id, request.payer);
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        if *consumer_program_info.key != request.consumer_program {
            msg!("Consumer program does not match request {}", request_id);
            return Err(CoordinatorError::InvalidConsumer.into());
        }

        let (expected_authority, authority_bump) = find_authority_address(program_id);
        if *authority_info.key != expected_authority {
            msg!("Invalid coordinator authority");
            return Err(CoordinatorError::InvalidAccountAddress.into());
        }

        let random_words = match random_words_override {
            Some(words) => {
                if words.len() != request.num_words as usize {
                    msg!(
                        "Expected {} random words, got {}",
                        request.num_words,
                        words.len()
                    );
                    return Err(CoordinatorError::InvalidRandomWords.into());
                }
                words
            }
            None => derive_random_words(request_id, request.num_words),
        };

        let mut subscription =
            load_subscription(program_id, subscription_info, request.subscription_id)?;
        subscription.balance = subscription
            .balance
            .checked_sub(state.base_fee)
            .ok_or(CoordinatorError::InsufficientBalance)?;
        Subscription::pack(subscription, &mut subscription_info.data.borrow_mut())?;

        close_account(request_info, request_payer_info)?;

        let callback = RandomWordsCallback {
            request_id,
            random_words,
        };
        let mut metas = vec![AccountMeta::new_readonly(*authority_info.key, true)];
        metas.extend(callback_infos.iter().map(|info| AccountMeta {
            pubkey: *info.key,
            is_signer: info.is_signer,
            is_writable: info.is_writable,
        }));
        let callback_ix = Instruction {
            program_id: request.consumer_program,
            accounts: metas,
            data: callback.to_instruction_data(request.callback_tag)?,
        };

        let mut invoke_infos = Vec::with_capacity(callback_infos.len() + 2);
        invoke_infos.push(authority_info.clone());
        invoke_infos.extend(callback_infos);
        invoke_infos.push(consumer_program_info.clone());

        invoke_signed(
            &callback_ix,
            &invoke_infos,
            &[&[AUTHORITY_SEED, &[authority_bump]]],
        )?;

        msg!(
            "RandomWordsFulfilled: request_id={}, payment={}",
            request_id,
            state.base_fee
        );
        Ok(())
    }
}

fn validate_request_params(params: &RequestParams) -> ProgramResult {
    if params.num_words == 0 || params.num_words > MAX_NUM_WORDS {
        msg!("num_words {} outside 1..={}", params.num_words, MAX_NUM_WORDS);
        return Err(CoordinatorError::InvalidNumWords.into());
    }
    if params.request_confirmations > MAX_REQUEST_CONFIRMATIONS {
        msg!(
            "request_confirmations {} above {}",
            params.request_confirmations,
            MAX_REQUEST_CONFIRMATIONS
        );
        return Err(CoordinatorError::InvalidRequestConfirmations.into());
    }
    if params.callback_gas_limit > MAX_CALLBACK_GAS_LIMIT {
        msg!(
            "callback_gas_limit {} above {}",
            params.callback_gas_limit,
            MAX_CALLBACK_GAS_LIMIT
        );
        return Err(CoordinatorError::InvalidCallbackGasLimit.into());
    }
    Ok(())
}

fn load_state(program_id: &Pubkey, state_info: &AccountInfo) -> Result<CoordinatorState, ProgramError> {
    let (expected_state, _) = find_state_address(program_id);
    if *state_info.key != expected_state {
        msg!("Invalid coordinator state address");
        return Err(CoordinatorError::InvalidAccountAddress.into());
    }
    if state_info.owner != program_id {
        msg!("Coordinator state must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    CoordinatorState::unpack(&state_info.data.borrow())
}

fn load_subscription(
    program_id: &Pubkey,
    subscription_info: &AccountInfo,
    subscription_id: u64,
) -> Result<Subscription, ProgramError> {
    let (expected_subscription, _) = find_subscription_address(program_id, subscription_id);
    if *subscription_info.key != expected_subscription {
        msg!("Subscription account does not match id {}", subscription_id);
        return Err(CoordinatorError::InvalidAccountAddress.into());
    }
    if subscription_info.owner != program_id {
        msg!("Subscription must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Subscription::unpack(&subscription_info.data.borrow())
}

/// Allocate a rent-exempt account at a PDA of this program. Lamports already
/// sitting at the address are kept and only the shortfall is paid.
fn create_pda_account<'a>(
    payer_info: &AccountInfo<'a>,
    new_account_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    space: usize,
    program_id: &Pubkey,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required_lamports = Rent::get()?.minimum_balance(space);
    let current_lamports = new_account_info.lamports();

    if current_lamports == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                new_account_info.key,
                required_lamports,
                space as u64,
                program_id,
            ),
            &[
                payer_info.clone(),
                new_account_info.clone(),
                system_program_info.clone(),
            ],
            &[signer_seeds],
        );
    }

    let shortfall = required_lamports.saturating_sub(current_lamports);
    if shortfall > 0 {
        invoke(
            &system_instruction::transfer(payer_info.key, new_account_info.key, shortfall),
            &[
                payer_info.clone(),
                new_account_info.clone(),
                system_program_info.clone(),
            ],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account_info.key, space as u64),
        &[new_account_info.clone(), system_program_info.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account_info.key, program_id),
        &[new_account_info.clone(), system_program_info.clone()],
        &[signer_seeds],
    )
}

/// Move every lamport of `account_info` to `destination_info` and wipe its data
fn close_account(account_info: &AccountInfo, destination_info: &AccountInfo) -> ProgramResult {
    let refund = account_info.lamports();
    let credited = destination_info
        .lamports()
        .checked_add(refund)
        .ok_or(CoordinatorError::Overflow)?;

    **destination_info.try_borrow_mut_lamports()? = credited;
    **account_info.try_borrow_mut_lamports()? = 0;
    account_info.data.borrow_mut().fill(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RequestParams {
        RequestParams {
            key_hash: [7; 32],
            subscription_id: 1,
            request_confirmations: 1,
            callback_gas_limit: 500_000,
            num_words: 1,
            callback_tag: 4,
        }
    }

    #[test]
    fn test_validate_request_params_accepts_limits() {
        let mut p = params();
        p.num_words = MAX_NUM_WORDS;
        p.request_confirmations = MAX_REQUEST_CONFIRMATIONS;
        p.callback_gas_limit = MAX_CALLBACK_GAS_LIMIT;
        assert_eq!(validate_request_params(&p), Ok(()));
    }

    #[test]
    fn test_validate_request_params_rejects_out_of_range() {
        let mut p = params();
        p.num_words = 0;
        assert_eq!(
            validate_request_params(&p),
            Err(CoordinatorError::InvalidNumWords.into())
        );

        let mut p = params();
        p.num_words = MAX_NUM_WORDS + 1;
        assert_eq!(
            validate_request_params(&p),
            Err(CoordinatorError::InvalidNumWords.into())
        );

        let mut p = params();
        p.request_confirmations = MAX_REQUEST_CONFIRMATIONS + 1;
        assert_eq!(
            validate_request_params(&p),
            Err(CoordinatorError::InvalidRequestConfirmations.into())
        );

        let mut p = params();
        p.callback_gas_limit = MAX_CALLBACK_GAS_LIMIT + 1;
        assert_eq!(
            validate_request_params(&p),
            Err(CoordinatorError::InvalidCallbackGasLimit.into())
        );
    }

    #[test]
    fn test_close_account_refunds_and_wipes() {
        let owner = Pubkey::new_unique();
        let request_key = Pubkey::new_unique();
        let payer_key = Pubkey::new_unique();
        let mut request_lamports = 1_500_000;
        let mut payer_lamports = 10;
        let mut request_data = vec![7u8; RandomnessRequest::LEN];
        let mut payer_data: Vec<u8> = Vec::new();
        let system_owner = Pubkey::default();

        let request_info = AccountInfo::new(
            &request_key,
            false,
            true,
            &mut request_lamports,
            &mut request_data,
            &owner,
            false,
            0,
        );
        let payer_info = AccountInfo::new(
            &payer_key,
            false,
            true,
            &mut payer_lamports,
            &mut payer_data,
            &system_owner,
            false,
            0,
        );

        close_account(&request_info, &payer_info).unwrap();

        assert_eq!(request_info.lamports(), 0);
        assert_eq!(payer_info.lamports(), 1_500_010);
        assert!(request_info.data.borrow().iter().all(|byte| *byte == 0));
    }
}
