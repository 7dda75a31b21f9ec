//! Card-side protocol: REQA answers with ATQA, SELECT CL1 answers with the UID followed by SAK.

use crate::picc::{CardProfile, PiccCommand};
use crate::register::{Command, Register};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardState {
    Idle,
    Detected,
    Selected,
}

/// Progress through the current selection. Everything here is dropped when chip select rises.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub atqa_index: usize,
    // Counts UID bytes and then the SAK
    pub uid_index: usize,
    pub card_detected: bool,
    pub card_selected: bool,
    pub reading_fifo: bool,
}

/// The most recent register write, kept until a CommandReg write consumes it or another
/// register write replaces it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LastWrite {
    pub address: u8,
    pub payload: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Gate {
    /// The preceding write did not target FIFODataReg
    Unprimed,
    /// Primed, but the command is not Transceive
    NotTransceive(u8),
    /// Transceive the primed FIFO payload
    Open(u8),
}

impl Gate {
    /// Guard for a CommandReg write. Only the identity of the previously written register is
    /// checked; the payload is passed through for the sequencer to interpret.
    pub fn check(context: Option<LastWrite>, command: u8) -> Gate {
        match context {
            Some(last) if last.address == Register::FIFODataReg as u8 => {
                match Command::try_from(command) {
                    Ok(Command::Transceive) => Gate::Open(last.payload),
                    _ => Gate::NotTransceive(command),
                }
            }
            _ => Gate::Unprimed,
        }
    }
}

/// One byte taken out of the FIFO
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Drained {
    pub byte: u8,
    // Set on the final byte of the stage's response
    pub stage_done: bool,
}

#[derive(Debug)]
pub struct ProtocolSequencer {
    profile: CardProfile,
    cursor: Cursor,
}

impl ProtocolSequencer {
    pub fn new(profile: CardProfile) -> ProtocolSequencer {
        ProtocolSequencer {
            profile,
            cursor: Cursor::default(),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn state(&self) -> CardState {
        if self.cursor.card_selected {
            CardState::Selected
        } else if self.cursor.card_detected {
            CardState::Detected
        } else {
            CardState::Idle
        }
    }

    pub fn reset(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Runs a Transceive of `payload`. Returns the number of response bytes now in the FIFO, or
    /// `None` if the card does not answer in its current state.
    pub fn transceive(&mut self, payload: u8) -> Option<u8> {
        let state = self.state();

        match (PiccCommand::try_from(payload), state) {
            (Ok(PiccCommand::ReqA), CardState::Idle) => {
                self.cursor.card_detected = true;
                self.cursor.atqa_index = 0;
                self.cursor.reading_fifo = true;

                Some(self.profile.atqa().len() as u8)
            }
            (Ok(PiccCommand::SelCl1), CardState::Idle | CardState::Detected) => {
                self.cursor.card_detected = true;
                self.cursor.card_selected = true;
                self.cursor.uid_index = 0;
                self.cursor.reading_fifo = true;

                Some(self.profile.select_response_len())
            }
            _ => None,
        }
    }

    /// Next response byte for a FIFODataReg read, or `None` when the FIFO is empty
    pub fn next_fifo_byte(&mut self) -> Option<Drained> {
        if !self.cursor.reading_fifo {
            return None;
        }

        let (byte, remaining) = match self.state() {
            CardState::Idle => return None,
            CardState::Detected => {
                let atqa = self.profile.atqa();
                let byte = *atqa.get(self.cursor.atqa_index)?;

                self.cursor.atqa_index += 1;
                (byte, atqa.len() - self.cursor.atqa_index)
            }
            // Undrained ATQA bytes are skipped once the card is selected
            CardState::Selected => {
                let uid = self.profile.uid();
                let byte = match self.cursor.uid_index {
                    index if index < uid.len() => uid[index],
                    index if index == uid.len() => self.profile.sak(),
                    _ => return None,
                };

                self.cursor.uid_index += 1;
                (byte, uid.len() + 1 - self.cursor.uid_index)
            }
        };

        let stage_done = remaining == 0;

        if stage_done {
            self.cursor.reading_fifo = false;
        }

        Some(Drained { byte, stage_done })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fifo_write(payload: u8) -> Option<LastWrite> {
        Some(LastWrite {
            address: Register::FIFODataReg as u8,
            payload,
        })
    }

    fn drain(sequencer: &mut ProtocolSequencer) -> Vec<u8> {
        std::iter::from_fn(|| sequencer.next_fifo_byte().map(|drained| drained.byte)).collect()
    }

    #[test]
    fn gate_needs_fifo_write() {
        assert_eq!(Gate::check(None, 0x0e), Gate::Unprimed);
        assert_eq!(
            Gate::check(
                Some(LastWrite {
                    address: Register::BitFramingReg as u8,
                    payload: 0x0c
                }),
                0x0e
            ),
            Gate::Unprimed
        );
        assert_eq!(Gate::check(fifo_write(0x0c), 0x00), Gate::NotTransceive(0x00));
        assert_eq!(Gate::check(fifo_write(0x0c), 0x0e), Gate::Open(0x0c));
        // The payload is not inspected by the gate
        assert_eq!(Gate::check(fifo_write(0x77), 0x0e), Gate::Open(0x77));
    }

    #[test]
    fn reqa_then_atqa() {
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        assert_eq!(sequencer.transceive(0x0c), Some(2));
        assert_eq!(sequencer.state(), CardState::Detected);
        assert_eq!(
            sequencer.next_fifo_byte(),
            Some(Drained {
                byte: 0x04,
                stage_done: false
            })
        );
        assert_eq!(
            sequencer.next_fifo_byte(),
            Some(Drained {
                byte: 0x00,
                stage_done: true
            })
        );
        assert_eq!(sequencer.next_fifo_byte(), None);
    }

    #[test]
    fn reqa_only_from_idle() {
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        sequencer.transceive(0x0c);
        assert_eq!(sequencer.transceive(0x0c), None);
        assert_eq!(sequencer.cursor().atqa_index, 0);
    }

    #[test]
    fn select_returns_uid_then_sak_once() {
        let profile = CardProfile::new(&[1, 2, 3, 4, 5, 6, 7], 0x20).unwrap();
        let mut sequencer = ProtocolSequencer::new(profile);

        sequencer.transceive(0x0c);
        assert_eq!(sequencer.transceive(0x93), Some(8));
        assert_eq!(drain(&mut sequencer), vec![1, 2, 3, 4, 5, 6, 7, 0x20]);
        assert_eq!(sequencer.next_fifo_byte(), None);
        assert_eq!(sequencer.transceive(0x93), None);
    }

    #[test]
    fn select_skips_pending_atqa() {
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        sequencer.transceive(0x0c);
        sequencer.next_fifo_byte();
        sequencer.transceive(0x93);

        assert_eq!(sequencer.cursor().atqa_index, 1);
        assert_eq!(drain(&mut sequencer), vec![0xde, 0xad, 0xbe, 0xef, 0x08]);
        assert_eq!(sequencer.cursor().atqa_index, 1);
    }

    #[test]
    fn idle_fifo_is_empty() {
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        assert_eq!(sequencer.next_fifo_byte(), None);
        assert_eq!(sequencer.transceive(0x50), None);
        assert_eq!(sequencer.state(), CardState::Idle);
    }

    #[test]
    fn reset_forgets_progress() {
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        sequencer.transceive(0x93);
        sequencer.next_fifo_byte();
        sequencer.reset();
        sequencer.reset();

        assert_eq!(sequencer.cursor(), Cursor::default());
        assert_eq!(sequencer.state(), CardState::Idle);
    }
}
