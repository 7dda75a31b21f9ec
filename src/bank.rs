use crate::register::Register;
use crate::sequencer::ProtocolSequencer;

pub const VERSION: u8 = 0x91;
// See Section 9.3.1.5 - RxIRq in ComIrqReg
pub const RX_IRQ: u8 = 1 << 5;
// Returned for anything the chip does not model
pub const DEFAULT_BYTE: u8 = 0x00;

/// Values of the registers the chip answers for. FIFODataReg is not stored; reads of it are
/// served by the protocol sequencer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RegisterBank {
    com_irq: u8,
    div_irq: u8,
    fifo_level: u8,
}

impl RegisterBank {
    pub fn new() -> RegisterBank {
        RegisterBank::default()
    }

    pub fn version(&self) -> u8 {
        VERSION
    }

    pub fn com_irq(&self) -> u8 {
        self.com_irq
    }

    pub fn div_irq(&self) -> u8 {
        self.div_irq
    }

    pub fn fifo_level(&self) -> u8 {
        self.fifo_level
    }

    /// Value of a mapped register, `None` for registers the bank does not hold
    pub fn read(&self, register: Register) -> Option<u8> {
        match register {
            Register::VersionReg => Some(self.version()),
            Register::ComIrqReg => Some(self.com_irq()),
            Register::DivIrqReg => Some(self.div_irq()),
            Register::FIFOLevelReg => Some(self.fifo_level()),
            _ => None,
        }
    }

    /// A transceive produced `count` response bytes
    pub fn load_fifo(&mut self, count: u8) {
        self.fifo_level = count;
        self.com_irq |= RX_IRQ;
    }

    /// Serve a FIFODataReg read
    pub fn drain_fifo(&mut self, sequencer: &mut ProtocolSequencer) -> u8 {
        let Some(drained) = sequencer.next_fifo_byte() else {
            return DEFAULT_BYTE;
        };

        self.fifo_level = self.fifo_level.saturating_sub(1);

        if drained.stage_done {
            self.com_irq &= !RX_IRQ;
        }

        drained.byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picc::CardProfile;

    #[test]
    fn mapped_registers() {
        let bank = RegisterBank::new();

        assert_eq!(bank.read(Register::VersionReg), Some(0x91));
        assert_eq!(bank.read(Register::ComIrqReg), Some(0));
        assert_eq!(bank.read(Register::DivIrqReg), Some(0));
        assert_eq!(bank.read(Register::ErrorReg), None);
        assert_eq!(bank.read(Register::FIFODataReg), None);
    }

    #[test]
    fn drain_tracks_level_and_rx_flag() {
        let mut bank = RegisterBank::new();
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        let count = sequencer.transceive(0x0c).unwrap();
        bank.load_fifo(count);

        assert_eq!(bank.com_irq() & RX_IRQ, RX_IRQ);
        assert_eq!(bank.fifo_level(), 2);

        assert_eq!(bank.drain_fifo(&mut sequencer), 0x04);
        assert_eq!(bank.com_irq() & RX_IRQ, RX_IRQ);
        assert_eq!(bank.fifo_level(), 1);

        assert_eq!(bank.drain_fifo(&mut sequencer), 0x00);
        assert_eq!(bank.com_irq() & RX_IRQ, 0);
        assert_eq!(bank.fifo_level(), 0);

        assert_eq!(bank.drain_fifo(&mut sequencer), DEFAULT_BYTE);
        assert_eq!(bank.fifo_level(), 0);
    }

    #[test]
    fn empty_fifo_leaves_registers_alone() {
        let mut bank = RegisterBank::new();
        let mut sequencer = ProtocolSequencer::new(CardProfile::default());

        assert_eq!(bank.drain_fifo(&mut sequencer), DEFAULT_BYTE);
        assert_eq!(bank, RegisterBank::new());
    }
}
