// Autoraffle - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Deployment parameters are zero or outside the coordinator limits
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Raffle account does not match the program address")]
    InvalidRaffleAccount,

    #[error("Coordinator program does not match the raffle configuration")]
    InvalidCoordinator,

    #[error("Entry amount is below the entrance fee")]
    InsufficientFee,

    #[error("Raffle is not open")]
    RoundNotOpen,

    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfillment token does not match the outstanding request
    #[error("Unknown randomness request")]
    UnknownRequest,

    #[error("No participants in the current round")]
    NoParticipants,

    #[error("Prize transfer to the winner failed")]
    PayoutFailed,

    #[error("Participant index out of range")]
    IndexOutOfRange,

    #[error("Fulfillment was not signed by the coordinator")]
    UnauthorizedFulfillment,

    #[error("Winner account does not match the selected participant")]
    WinnerAccountMismatch,

    #[error("Raffle has reached its participant capacity")]
    RaffleFull,

    #[error("Fulfillment carried no random words")]
    MissingRandomWord,

    #[error("Amount overflow")]
    AmountOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
