// Autoraffle - Utils
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
};

use crate::{constants::RAFFLE_SEED, error::RaffleError, state::Raffle};

/// Find the raffle account of a deployment
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Load the raffle after checking the account is this program's PDA
pub fn load_raffle(program_id: &Pubkey, raffle_info: &AccountInfo) -> Result<Raffle, ProgramError> {
    let (expected_raffle, _) = find_raffle_address(program_id);
    if *raffle_info.key != expected_raffle {
        msg!("Invalid raffle account address");
        return Err(RaffleError::InvalidRaffleAccount.into());
    }
    if raffle_info.owner != program_id {
        msg!("Raffle account must be owned by this program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Raffle::load(&raffle_info.data.borrow())
}

/// Create a rent exempt PDA owned by `program_id`.
///
/// `create_account` refuses an address that already holds lamports, so a
/// funded address is topped up, allocated and assigned instead.
pub fn create_pda_account<'a>(
    payer_info: &AccountInfo<'a>,
    new_account_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    rent: &Rent,
    space: usize,
    program_id: &Pubkey,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required_lamports = rent.minimum_balance(space);
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

    msg!("Account {} is pre-funded with {} lamports", new_account_info.key, current_lamports);
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
