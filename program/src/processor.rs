// Autoraffle - Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use vrf_coordinator::find_authority_address;

use crate::{
    constants::RAFFLE_SEED,
    draw::PrizeTransfer,
    error::RaffleError,
    events::ProgramLogSink,
    instruction::RaffleInstruction,
    state::{Raffle, RaffleConfig},
    utils::{create_pda_account, find_raffle_address, load_raffle},
    vrf::CoordinatorClient,
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                interval,
                key_hash,
                subscription_id,
                request_confirmations,
                callback_gas_limit,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(
                    program_id,
                    accounts,
                    entrance_fee,
                    interval,
                    key_hash,
                    subscription_id,
                    request_confirmations,
                    callback_gas_limit,
                )
            }
            RaffleInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, &random_words)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        entrance_fee: u64,
        interval: i64,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle, bump_seed) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        if !coordinator_info.executable {
            msg!("Coordinator {} is not a program", coordinator_info.key);
            return Err(RaffleError::InvalidCoordinator.into());
        }

        let config = RaffleConfig {
            entrance_fee,
            interval,
            key_hash,
            subscription_id,
            request_confirmations,
            callback_gas_limit,
            coordinator_program: *coordinator_info.key,
        };
        if let Err(e) = config.validate() {
            msg!(
                "Invalid config: fee={}, interval={}, confirmations={}, gas={}",
                entrance_fee,
                interval,
                request_confirmations,
                callback_gas_limit
            );
            return Err(e.into());
        }

        create_pda_account(
            authority_info,
            raffle_info,
            system_program_info,
            &Rent::get()?,
            Raffle::LEN,
            program_id,
            &[RAFFLE_SEED, &[bump_seed]],
        )?;

        let clock = Clock::get()?;
        let raffle = Raffle::new(bump_seed, config, clock.unix_timestamp);
        raffle.save(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: fee={}, interval={}s, coordinator={}, subscription={}",
            entrance_fee,
            interval,
            coordinator_info.key,
            subscription_id
        );
        Ok(())
    }

    fn process_enter(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = load_raffle(program_id, raffle_info)?;
        if let Err(e) = raffle.deposit(*player_info.key, amount, &mut ProgramLogSink) {
            msg!(
                "Entry rejected: amount={}, fee={}, state={:?}",
                amount,
                raffle.entrance_fee(),
                raffle.state()
            );
            return Err(e.into());
        }

        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.save(&mut raffle_info.data.borrow_mut())
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = load_raffle(program_id, raffle_info)?;
        let status = raffle.check_upkeep(Clock::get()?.unix_timestamp);

        msg!("Upkeep needed: {} ({:?})", status.needed, status.reason);
        let data = status
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        set_return_data(&data);
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let raffle_program_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let coordinator_state_info = next_account_info(account_info_iter)?;
        let subscription_info = next_account_info(account_info_iter)?;
        let request_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if raffle_program_info.key != program_id {
            msg!("Expected the raffle program account");
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut raffle = load_raffle(program_id, raffle_info)?;
        if *coordinator_info.key != raffle.config.coordinator_program {
            msg!("Coordinator {} is not configured", coordinator_info.key);
            return Err(RaffleError::InvalidCoordinator.into());
        }

        let bump = [raffle.bump];
        let raffle_seeds: &[&[u8]] = &[RAFFLE_SEED, &bump];
        let mut coordinator = CoordinatorClient {
            coordinator_program: coordinator_info,
            consumer: raffle_info,
            consumer_program: raffle_program_info,
            coordinator_state: coordinator_state_info,
            subscription: subscription_info,
            request: request_info,
            payer: keeper_info,
            system_program: system_program_info,
            consumer_seeds: raffle_seeds,
        };

        let now = Clock::get()?.unix_timestamp;
        raffle.request_draw(now, &mut coordinator, &mut ProgramLogSink)?;
        raffle.save(&mut raffle_info.data.borrow_mut())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u128],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut raffle = load_raffle(program_id, raffle_info)?;

        let (coordinator_authority, _) = find_authority_address(&raffle.config.coordinator_program);
        if !authority_info.is_signer || *authority_info.key != coordinator_authority {
            msg!("Fulfillment must be signed by the coordinator authority");
            return Err(RaffleError::UnauthorizedFulfillment.into());
        }

        let mut payout = LamportPayout {
            raffle_info,
            winner_info,
            rent: Rent::get()?,
        };
        let now = Clock::get()?.unix_timestamp;
        raffle.fulfill(request_id, random_words, now, &mut payout, &mut ProgramLogSink)?;
        raffle.save(&mut raffle_info.data.borrow_mut())
    }
}

/// Pays the prize straight out of the raffle PDA
struct LamportPayout<'a, 'b> {
    raffle_info: &'b AccountInfo<'a>,
    winner_info: &'b AccountInfo<'a>,
    rent: Rent,
}

impl<'a, 'b> PrizeTransfer for LamportPayout<'a, 'b> {
    fn transfer(&mut self, winner: &Pubkey, amount: u64) -> ProgramResult {
        if self.winner_info.key != winner {
            msg!("Winner account {} is not {}", self.winner_info.key, winner);
            return Err(RaffleError::WinnerAccountMismatch.into());
        }
        if !self.winner_info.is_writable {
            msg!("Winner account is not writable");
            return Err(RaffleError::PayoutFailed.into());
        }

        let min_balance = self.rent.minimum_balance(self.raffle_info.data_len());
        let remaining = self
            .raffle_info
            .lamports()
            .checked_sub(amount)
            .filter(|remaining| *remaining >= min_balance)
            .ok_or_else(|| {
                msg!("Raffle cannot pay {} and stay rent exempt", amount);
                RaffleError::PayoutFailed
            })?;
        let credited = self
            .winner_info
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::PayoutFailed)?;

        **self.raffle_info.try_borrow_mut_lamports()? = remaining;
        **self.winner_info.try_borrow_mut_lamports()? = credited;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAFFLE_DATA_LEN: usize = 16;

    fn payout_with<'a, 'b>(
        raffle_info: &'b AccountInfo<'a>,
        winner_info: &'b AccountInfo<'a>,
    ) -> LamportPayout<'a, 'b> {
        LamportPayout {
            raffle_info,
            winner_info,
            rent: Rent::default(),
        }
    }

    #[test]
    fn test_payout_moves_lamports() {
        let program_id = Pubkey::new_unique();
        let raffle_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let system_id = Pubkey::default();
        let min_balance = Rent::default().minimum_balance(RAFFLE_DATA_LEN);

        let mut raffle_lamports = min_balance + 500;
        let mut raffle_data = vec![0u8; RAFFLE_DATA_LEN];
        let mut winner_lamports = 10;
        let mut winner_data: Vec<u8> = Vec::new();
        let raffle_info = AccountInfo::new(
            &raffle_key,
            false,
            true,
            &mut raffle_lamports,
            &mut raffle_data,
            &program_id,
            false,
            0,
        );
        let winner_info = AccountInfo::new(
            &winner_key,
            false,
            true,
            &mut winner_lamports,
            &mut winner_data,
            &system_id,
            false,
            0,
        );

        payout_with(&raffle_info, &winner_info)
            .transfer(&winner_key, 500)
            .unwrap();
        assert_eq!(raffle_info.lamports(), min_balance);
        assert_eq!(winner_info.lamports(), 510);
    }

    #[test]
    fn test_payout_rejects_other_winner() {
        let program_id = Pubkey::new_unique();
        let raffle_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let system_id = Pubkey::default();

        let mut raffle_lamports = Rent::default().minimum_balance(RAFFLE_DATA_LEN) + 500;
        let mut raffle_data = vec![0u8; RAFFLE_DATA_LEN];
        let mut winner_lamports = 0;
        let mut winner_data: Vec<u8> = Vec::new();
        let raffle_info = AccountInfo::new(
            &raffle_key,
            false,
            true,
            &mut raffle_lamports,
            &mut raffle_data,
            &program_id,
            false,
            0,
        );
        let winner_info = AccountInfo::new(
            &winner_key,
            false,
            true,
            &mut winner_lamports,
            &mut winner_data,
            &system_id,
            false,
            0,
        );

        let result = payout_with(&raffle_info, &winner_info).transfer(&Pubkey::new_unique(), 500);
        assert_eq!(result, Err(RaffleError::WinnerAccountMismatch.into()));
        assert_eq!(winner_info.lamports(), 0);
    }

    #[test]
    fn test_payout_fails_for_read_only_winner() {
        let program_id = Pubkey::new_unique();
        let raffle_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let system_id = Pubkey::default();
        let starting = Rent::default().minimum_balance(RAFFLE_DATA_LEN) + 500;

        let mut raffle_lamports = starting;
        let mut raffle_data = vec![0u8; RAFFLE_DATA_LEN];
        let mut winner_lamports = 0;
        let mut winner_data: Vec<u8> = Vec::new();
        let raffle_info = AccountInfo::new(
            &raffle_key,
            false,
            true,
            &mut raffle_lamports,
            &mut raffle_data,
            &program_id,
            false,
            0,
        );
        let winner_info = AccountInfo::new(
            &winner_key,
            false,
            false,
            &mut winner_lamports,
            &mut winner_data,
            &system_id,
            false,
            0,
        );

        let result = payout_with(&raffle_info, &winner_info).transfer(&winner_key, 500);
        assert_eq!(result, Err(RaffleError::PayoutFailed.into()));
        assert_eq!(raffle_info.lamports(), starting);
        assert_eq!(winner_info.lamports(), 0);
    }

    #[test]
    fn test_payout_fails_below_rent_exemption() {
        let program_id = Pubkey::new_unique();
        let raffle_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let system_id = Pubkey::default();
        let starting = Rent::default().minimum_balance(RAFFLE_DATA_LEN) + 500;

        let mut raffle_lamports = starting;
        let mut raffle_data = vec![0u8; RAFFLE_DATA_LEN];
        let mut winner_lamports = 0;
        let mut winner_data: Vec<u8> = Vec::new();
        let raffle_info = AccountInfo::new(
            &raffle_key,
            false,
            true,
            &mut raffle_lamports,
            &mut raffle_data,
            &program_id,
            false,
            0,
        );
        let winner_info = AccountInfo::new(
            &winner_key,
            false,
            true,
            &mut winner_lamports,
            &mut winner_data,
            &system_id,
            false,
            0,
        );

        let result = payout_with(&raffle_info, &winner_info).transfer(&winner_key, 501);
        assert_eq!(result, Err(RaffleError::PayoutFailed.into()));
        assert_eq!(raffle_info.lamports(), starting);
        assert_eq!(winner_info.lamports(), 0);
    }
}
