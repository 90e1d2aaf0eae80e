// Autoraffle - Draw
// Two-phase drawing: request randomness, then consume it exactly once
use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    error::RaffleError,
    events::{EventSink, RaffleEvent},
    state::{Raffle, RaffleState},
};

/// Parameters of a randomness request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Source of verifiable randomness
pub trait RandomnessCoordinator {
    /// Submit a request and return the token its fulfillment will carry
    fn request_random_words(&mut self, request: &DrawRequest) -> Result<u64, ProgramError>;
}

/// Moves the prize to the winner
pub trait PrizeTransfer {
    fn transfer(&mut self, winner: &Pubkey, amount: u64) -> ProgramResult;
}

/// Map a random word onto a participant index
pub fn winner_index(random_word: u128, participant_count: usize) -> usize {
    (random_word % participant_count as u128) as usize
}

impl Raffle {
    fn draw_request(&self) -> DrawRequest {
        DrawRequest {
            key_hash: self.config.key_hash,
            subscription_id: self.config.subscription_id,
            request_confirmations: self.config.request_confirmations,
            callback_gas_limit: self.config.callback_gas_limit,
            num_words: self.num_words(),
        }
    }

    /// Start a drawing if one is due. Returns the request token.
    pub fn request_draw(
        &mut self,
        now: UnixTimestamp,
        coordinator: &mut impl RandomnessCoordinator,
        events: &mut impl EventSink,
    ) -> Result<u64, ProgramError> {
        if self.state != RaffleState::Open {
            msg!("Raffle is already drawing");
            return Err(RaffleError::RoundNotOpen.into());
        }

        let status = self.check_upkeep(now);
        if !status.needed {
            msg!(
                "Upkeep not needed: balance={}, players={}, state={:?}, reason={:?}",
                self.pool_balance,
                self.participants.len(),
                self.state,
                status.reason
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        let request_id = coordinator.request_random_words(&self.draw_request())?;

        self.state = RaffleState::Drawing;
        self.pending_request = Some(request_id);
        events.emit(RaffleEvent::DrawRequested { request_id });
        Ok(request_id)
    }

    /// Resolve the winner for a fulfillment without changing any state
    pub fn select_winner(
        &self,
        request_id: u64,
        random_words: &[u128],
    ) -> Result<Pubkey, RaffleError> {
        if self.pending_request != Some(request_id) {
            msg!(
                "Fulfillment for request {} does not match {:?}",
                request_id,
                self.pending_request
            );
            return Err(RaffleError::UnknownRequest);
        }
        let random_word = *random_words.first().ok_or(RaffleError::MissingRandomWord)?;
        if self.participants.is_empty() {
            return Err(RaffleError::NoParticipants);
        }
        self.participant(winner_index(random_word, self.participants.len()))
    }

    /// Pay the winner selected by `random_words` and open the next round.
    /// Nothing changes unless the payout succeeds.
    pub fn fulfill(
        &mut self,
        request_id: u64,
        random_words: &[u128],
        now: UnixTimestamp,
        payout: &mut impl PrizeTransfer,
        events: &mut impl EventSink,
    ) -> Result<Pubkey, ProgramError> {
        let winner = self.select_winner(request_id, random_words)?;
        let prize = self.pool_balance;

        payout.transfer(&winner, prize)?;

        let round = self.round;
        self.recent_winner = Some(winner);
        self.pending_request = None;
        self.reset_round(now);

        events.emit(RaffleEvent::WinnerPicked {
            winner,
            prize,
            round,
        });
        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RaffleConfig;

    const FEE: u64 = 10_000_000;
    const INTERVAL: i64 = 30;
    const START: UnixTimestamp = 1_000;

    struct FakeCoordinator {
        next_id: u64,
        requests: Vec<DrawRequest>,
        fail: bool,
    }

    impl FakeCoordinator {
        fn new() -> Self {
            Self {
                next_id: 7,
                requests: Vec::new(),
                fail: false,
            }
        }
    }

    impl RandomnessCoordinator for FakeCoordinator {
        fn request_random_words(&mut self, request: &DrawRequest) -> Result<u64, ProgramError> {
            if self.fail {
                return Err(ProgramError::Custom(999));
            }
            self.requests.push(request.clone());
            let id = self.next_id;
            self.next_id += 1;
            Ok(id)
        }
    }

    #[derive(Default)]
    struct FakePayout {
        paid: Vec<(Pubkey, u64)>,
        reject: bool,
    }

    impl PrizeTransfer for FakePayout {
        fn transfer(&mut self, winner: &Pubkey, amount: u64) -> ProgramResult {
            if self.reject {
                return Err(RaffleError::PayoutFailed.into());
            }
            self.paid.push((*winner, amount));
            Ok(())
        }
    }

    fn no_events() -> Vec<RaffleEvent> {
        Vec::new()
    }

    fn raffle() -> Raffle {
        let mut config = RaffleConfig::development(Pubkey::new_unique(), 1);
        config.entrance_fee = FEE;
        config.interval = INTERVAL;
        Raffle::new(254, config, START)
    }

    fn raffle_with_players(count: usize) -> (Raffle, Vec<Pubkey>) {
        let mut raffle = raffle();
        let mut events: Vec<RaffleEvent> = Vec::new();
        let players: Vec<Pubkey> = (0..count).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            raffle.deposit(*player, FEE, &mut events).unwrap();
        }
        (raffle, players)
    }

    fn drawing_raffle(count: usize) -> (Raffle, Vec<Pubkey>, u64) {
        let (mut raffle, players) = raffle_with_players(count);
        let request_id = raffle
            .request_draw(
                START + INTERVAL,
                &mut FakeCoordinator::new(),
                &mut no_events(),
            )
            .unwrap();
        (raffle, players, request_id)
    }

    #[test]
    fn test_request_draw_when_due() {
        let (mut raffle, _) = raffle_with_players(2);
        let mut coordinator = FakeCoordinator::new();
        let mut events: Vec<RaffleEvent> = Vec::new();

        let request_id = raffle
            .request_draw(START + INTERVAL, &mut coordinator, &mut events)
            .unwrap();

        assert_eq!(request_id, 7);
        assert_eq!(raffle.state(), RaffleState::Drawing);
        assert_eq!(raffle.pending_request(), Some(7));
        assert_eq!(events, vec![RaffleEvent::DrawRequested { request_id: 7 }]);
        assert_eq!(
            coordinator.requests,
            vec![DrawRequest {
                key_hash: [0; 32],
                subscription_id: 1,
                request_confirmations: 1,
                callback_gas_limit: 500_000,
                num_words: 1,
            }]
        );
    }

    #[test]
    fn test_second_request_fails_round_not_open() {
        let (mut raffle, _, request_id) = drawing_raffle(2);
        let mut coordinator = FakeCoordinator::new();

        assert_eq!(
            raffle.request_draw(START + 10 * INTERVAL, &mut coordinator, &mut no_events()),
            Err(RaffleError::RoundNotOpen.into())
        );
        assert!(coordinator.requests.is_empty());
        assert_eq!(raffle.pending_request(), Some(request_id));
    }

    #[test]
    fn test_request_draw_before_interval() {
        let (mut raffle, _) = raffle_with_players(2);
        let before = raffle.clone();
        let mut coordinator = FakeCoordinator::new();

        assert_eq!(
            raffle.request_draw(START + INTERVAL - 1, &mut coordinator, &mut no_events()),
            Err(RaffleError::UpkeepNotNeeded.into())
        );
        assert_eq!(raffle, before);
        assert!(coordinator.requests.is_empty());
    }

    #[test]
    fn test_request_draw_without_participants() {
        let mut raffle = raffle();
        let mut coordinator = FakeCoordinator::new();

        assert_eq!(
            raffle.request_draw(START + 100 * INTERVAL, &mut coordinator, &mut no_events()),
            Err(RaffleError::UpkeepNotNeeded.into())
        );
        assert_eq!(raffle.state(), RaffleState::Open);
    }

    #[test]
    fn test_request_draw_matches_check_upkeep() {
        for (players, now) in [(0, START), (0, START + INTERVAL), (3, START), (3, START + INTERVAL)] {
            let (mut raffle, _) = raffle_with_players(players);
            let due = raffle.check_upkeep(now).needed;
            let result = raffle.request_draw(now, &mut FakeCoordinator::new(), &mut no_events());
            assert_eq!(result.is_ok(), due);
        }
    }

    #[test]
    fn test_coordinator_failure_keeps_round_open() {
        let (mut raffle, _) = raffle_with_players(1);
        let before = raffle.clone();
        let mut coordinator = FakeCoordinator::new();
        coordinator.fail = true;
        let mut events: Vec<RaffleEvent> = Vec::new();

        assert_eq!(
            raffle.request_draw(START + INTERVAL, &mut coordinator, &mut events),
            Err(ProgramError::Custom(999))
        );
        assert_eq!(raffle, before);
        assert!(events.is_empty());
    }

    #[test]
    fn test_fulfill_unknown_request() {
        let (mut raffle, _, request_id) = drawing_raffle(3);
        let before = raffle.clone();
        let mut payout = FakePayout::default();
        let mut events: Vec<RaffleEvent> = Vec::new();

        assert_eq!(
            raffle.fulfill(request_id + 1, &[5], START + 60, &mut payout, &mut events),
            Err(RaffleError::UnknownRequest.into())
        );
        assert_eq!(raffle, before);
        assert!(payout.paid.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_fulfill_while_open() {
        let (mut raffle, _) = raffle_with_players(2);

        assert_eq!(
            raffle.fulfill(7, &[5], START, &mut FakePayout::default(), &mut no_events()),
            Err(RaffleError::UnknownRequest.into())
        );
    }

    #[test]
    fn test_fulfill_round_trip() {
        let (mut raffle, players, request_id) = drawing_raffle(4);
        let mut payout = FakePayout::default();
        let mut events: Vec<RaffleEvent> = Vec::new();
        let now = START + 45;

        let winner = raffle
            .fulfill(request_id, &[37], now, &mut payout, &mut events)
            .unwrap();

        assert_eq!(winner, players[1]);
        assert_eq!(payout.paid, vec![(players[1], 4 * FEE)]);
        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.participant_count(), 0);
        assert_eq!(raffle.pool_balance(), 0);
        assert_eq!(raffle.recent_winner(), Some(players[1]));
        assert_eq!(raffle.last_round_start(), now);
        assert_eq!(raffle.pending_request(), None);
        assert_eq!(raffle.round(), 2);
        assert_eq!(
            events,
            vec![RaffleEvent::WinnerPicked {
                winner: players[1],
                prize: 4 * FEE,
                round: 1,
            }]
        );
    }

    #[test]
    fn test_fulfill_twice_is_rejected() {
        let (mut raffle, _, request_id) = drawing_raffle(2);
        let mut payout = FakePayout::default();

        raffle
            .fulfill(request_id, &[1], START + 40, &mut payout, &mut no_events())
            .unwrap();
        assert_eq!(
            raffle.fulfill(request_id, &[1], START + 41, &mut payout, &mut no_events()),
            Err(RaffleError::UnknownRequest.into())
        );
        assert_eq!(payout.paid.len(), 1);
    }

    #[test]
    fn test_fulfill_uses_first_word_modulo_count() {
        for word in [0u128, 1, 2, 4, 5, 99, u64::MAX as u128, u128::MAX] {
            let (mut raffle, players, request_id) = drawing_raffle(5);
            let winner = raffle
                .fulfill(
                    request_id,
                    &[word, 3],
                    START + 40,
                    &mut FakePayout::default(),
                    &mut no_events(),
                )
                .unwrap();
            assert_eq!(winner, players[(word % 5) as usize]);
        }
    }

    #[test]
    fn test_duplicate_entries_weight_the_draw() {
        let mut raffle = raffle();
        let mut events: Vec<RaffleEvent> = Vec::new();
        let whale = Pubkey::new_unique();
        let minnow = Pubkey::new_unique();
        raffle.deposit(whale, FEE, &mut events).unwrap();
        raffle.deposit(minnow, FEE, &mut events).unwrap();
        raffle.deposit(whale, FEE, &mut events).unwrap();

        assert_eq!(raffle.select_winner_for_test(&[0]), Ok(whale));
        assert_eq!(raffle.select_winner_for_test(&[1]), Ok(minnow));
        assert_eq!(raffle.select_winner_for_test(&[2]), Ok(whale));
    }

    #[test]
    fn test_winner_index_is_uniform() {
        const N: usize = 7;
        const SAMPLES: u64 = 70_000;
        let mut counts = [0u64; N];
        // splitmix64 over a fixed seed
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..SAMPLES {
            seed = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = seed;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            let word = ((z as u128) << 64) | (z.rotate_left(17) as u128);
            let index = winner_index(word, N);
            assert!(index < N);
            counts[index] += 1;
        }
        let expected = SAMPLES / N as u64;
        for count in counts {
            assert!(count > expected * 9 / 10 && count < expected * 11 / 10);
        }
    }

    #[test]
    fn test_fulfill_without_participants() {
        let mut raffle = raffle();
        raffle.state = RaffleState::Drawing;
        raffle.pending_request = Some(3);
        let before = raffle.clone();
        let mut payout = FakePayout::default();

        assert_eq!(
            raffle.fulfill(3, &[37], START + 40, &mut payout, &mut no_events()),
            Err(RaffleError::NoParticipants.into())
        );
        assert_eq!(raffle, before);
        assert!(payout.paid.is_empty());
    }

    #[test]
    fn test_fulfill_without_words() {
        let (mut raffle, _, request_id) = drawing_raffle(2);
        let before = raffle.clone();

        assert_eq!(
            raffle.fulfill(
                request_id,
                &[],
                START + 40,
                &mut FakePayout::default(),
                &mut no_events()
            ),
            Err(RaffleError::MissingRandomWord.into())
        );
        assert_eq!(raffle, before);
    }

    #[test]
    fn test_failed_payout_keeps_drawing() {
        let (mut raffle, _, request_id) = drawing_raffle(4);
        let before = raffle.clone();
        let mut payout = FakePayout {
            reject: true,
            ..FakePayout::default()
        };
        let mut events: Vec<RaffleEvent> = Vec::new();

        assert_eq!(
            raffle.fulfill(request_id, &[37], START + 40, &mut payout, &mut events),
            Err(RaffleError::PayoutFailed.into())
        );
        assert_eq!(raffle, before);
        assert_eq!(raffle.state(), RaffleState::Drawing);
        assert_eq!(raffle.pending_request(), Some(request_id));
        assert!(events.is_empty());

        // a retry with the same parameters goes through once the payout works
        payout.reject = false;
        raffle
            .fulfill(request_id, &[37], START + 40, &mut payout, &mut events)
            .unwrap();
        assert_eq!(raffle.state(), RaffleState::Open);
    }

    impl Raffle {
        fn select_winner_for_test(&self, words: &[u128]) -> Result<Pubkey, RaffleError> {
            let mut drawing = self.clone();
            drawing.state = RaffleState::Drawing;
            drawing.pending_request = Some(1);
            drawing.select_winner(1, words)
        }
    }
}
