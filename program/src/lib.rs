// Autoraffle
// A fixed-fee raffle that draws a winner on its own once the round interval
// has passed, using randomness from a VRF coordinator program.

pub mod constants;
pub mod draw;
pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod upkeep;
pub mod utils;
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
