// Autoraffle - Constants
// Compile-time parameters of the raffle program

/// Seed of the raffle account PDA
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Entries the raffle account has room for in a single round
pub const MAX_PARTICIPANTS: usize = 250;

/// Random words requested per drawing
pub const NUM_WORDS: u32 = 1;

// Development defaults
pub const DEFAULT_ENTRANCE_FEE: u64 = 10_000_000; // 0.01 SOL
pub const DEFAULT_INTERVAL: i64 = 30;
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
pub const DEFAULT_REQUEST_CONFIRMATIONS: u16 = 1;
