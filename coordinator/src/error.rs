// VRF Coordinator - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the coordinator program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Coordinator already initialized")]
    AlreadyInitialized,

    /// A PDA passed in does not match its expected seeds
    #[error("Account address does not match the expected PDA")]
    InvalidAccountAddress,

    #[error("Only the subscription owner can perform this action")]
    NotSubscriptionOwner,

    #[error("Subscription already holds the maximum number of consumers")]
    TooManyConsumers,

    #[error("Consumer is not registered on the subscription")]
    InvalidConsumer,

    #[error("Number of random words is out of range")]
    InvalidNumWords,

    #[error("Request confirmations are out of range")]
    InvalidRequestConfirmations,

    #[error("Callback gas limit is too high")]
    InvalidCallbackGasLimit,

    #[error("Request has already been fulfilled")]
    AlreadyFulfilled,

    #[error("Subscription balance is too low to pay for the fulfillment")]
    InsufficientBalance,

    /// Override words do not match the number of words requested
    #[error("Random words do not match the request")]
    InvalidRandomWords,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<CoordinatorError> for ProgramError {
    fn from(e: CoordinatorError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for CoordinatorError {
    fn type_of() -> &'static str {
        "Coordinator Error"
    }
}

impl PrintProgramError for CoordinatorError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
