// Autoraffle - Events
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

/// Observable raffle events, logged as borsh-encoded program data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    EntryAccepted { participant: Pubkey, amount: u64 },
    DrawRequested { request_id: u64 },
    WinnerPicked { winner: Pubkey, prize: u64, round: u64 },
}

/// Destination of raffle events
pub trait EventSink {
    fn emit(&mut self, event: RaffleEvent);
}

/// Writes events to the transaction log
pub struct ProgramLogSink;

impl EventSink for ProgramLogSink {
    fn emit(&mut self, event: RaffleEvent) {
        match &event {
            RaffleEvent::EntryAccepted {
                participant,
                amount,
            } => msg!("EntryAccepted: participant={}, amount={}", participant, amount),
            RaffleEvent::DrawRequested { request_id } => {
                msg!("DrawRequested: request_id={}", request_id)
            }
            RaffleEvent::WinnerPicked {
                winner,
                prize,
                round,
            } => msg!("WinnerPicked: winner={}, prize={}, round={}", winner, prize, round),
        }
        match event.try_to_vec() {
            Ok(data) => sol_log_data(&[data.as_slice()]),
            Err(e) => msg!("Failed to encode event: {}", e),
        }
    }
}

/// Collects events in memory, for off-chain replay and tests
impl EventSink for Vec<RaffleEvent> {
    fn emit(&mut self, event: RaffleEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_encodes_every_event() {
        let events = vec![
            RaffleEvent::EntryAccepted {
                participant: Pubkey::new_unique(),
                amount: 10,
            },
            RaffleEvent::DrawRequested { request_id: 7 },
            RaffleEvent::WinnerPicked {
                winner: Pubkey::new_unique(),
                prize: 30,
                round: 2,
            },
        ];
        for event in events {
            let data = event.try_to_vec().unwrap();
            assert_eq!(RaffleEvent::try_from_slice(&data).unwrap(), event);
            ProgramLogSink.emit(event);
        }
    }
}
