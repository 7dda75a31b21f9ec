use crate::bank::{RegisterBank, DEFAULT_BYTE};
use crate::host::{Completion, Edge, PinLevel, SpiEventSink, SpiTransport, WatchedPin};
use crate::picc::CardProfile;
use crate::register::{Access, Register};
use crate::sequencer::{CardState, Cursor, Gate, LastWrite, ProtocolSequencer};
use crate::{debug, SimMfrc522Log};

// Where the next received byte belongs within the current frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Address,
    WriteData(u8),
}

/// Observable chip state, for diagnostics and tests
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChipSnapshot {
    pub state: CardState,
    pub cursor: Cursor,
    pub bank: RegisterBank,
    pub context: Option<LastWrite>,
    pub next_byte: u8,
}

/// SPI slave side of an MFRC522 with one card in its field.
///
/// Frames follow Section 8.1.2 of the data sheet with one byte per exchange: an address byte
/// with the MSB set is a read and its value is shifted out during the next exchange; an address
/// byte with the MSB clear is a write and the following byte is its data. The address byte 0x00
/// ends a read sequence and takes no data. The response byte of the exchange after a write
/// address, a data byte or 0x00 is always 0x00.
pub struct Mfrc522Chip<'a, P, T> {
    log: &'a dyn SimMfrc522Log,
    select: P,
    transport: T,
    buffer: [u8; 1],
    next_byte: u8,
    phase: Phase,
    bank: RegisterBank,
    sequencer: ProtocolSequencer,
    context: Option<LastWrite>,
}

impl<'a, P: WatchedPin, T: SpiTransport> Mfrc522Chip<'a, P, T> {
    pub fn new(
        log: &'a dyn SimMfrc522Log,
        mut select: P,
        transport: T,
        profile: CardProfile,
    ) -> Mfrc522Chip<'a, P, T> {
        select.watch(Edge::Both);

        debug!(log, "mfrc522: card UID {:02x?}", profile.uid());

        Mfrc522Chip {
            log,
            select,
            transport,
            buffer: [DEFAULT_BYTE],
            next_byte: DEFAULT_BYTE,
            phase: Phase::Address,
            bank: RegisterBank::new(),
            sequencer: ProtocolSequencer::new(profile),
            context: None,
        }
    }

    pub fn snapshot(&self) -> ChipSnapshot {
        ChipSnapshot {
            state: self.sequencer.state(),
            cursor: self.sequencer.cursor(),
            bank: self.bank,
            context: self.context,
            next_byte: self.next_byte,
        }
    }

    fn arm(&mut self) {
        self.buffer[0] = self.next_byte;
        self.transport.start(&self.buffer);
    }

    fn receive(&mut self, byte: u8) {
        self.next_byte = DEFAULT_BYTE;

        match self.phase {
            Phase::WriteData(address) => {
                self.phase = Phase::Address;
                self.write_register(address, byte);
            }
            Phase::Address => match Access::decode(byte) {
                Access::Read(address) => self.next_byte = self.read_register(address),
                Access::Write(0) => {}
                Access::Write(address) => self.phase = Phase::WriteData(address),
            },
        }
    }

    fn read_register(&mut self, address: u8) -> u8 {
        match Register::from_address(address) {
            Some(Register::FIFODataReg) => {
                let byte = self.bank.drain_fifo(&mut self.sequencer);

                debug!(
                    self.log,
                    "mfrc522: FIFO read {:#04x}, {} left",
                    byte,
                    self.bank.fifo_level()
                );
                byte
            }
            register => {
                let value = register.and_then(|register| self.bank.read(register));

                if value.is_none() {
                    debug!(self.log, "mfrc522: read of unmapped register {:#04x}", address);
                }

                value.unwrap_or(DEFAULT_BYTE)
            }
        }
    }

    fn write_register(&mut self, address: u8, value: u8) {
        match Register::from_address(address) {
            Some(Register::FIFODataReg) => {
                // Keep the first byte of a multi-byte FIFO payload, it carries the PICC command
                if !matches!(self.context, Some(last) if last.address == address) {
                    self.context = Some(LastWrite {
                        address,
                        payload: value,
                    });
                }
            }
            Some(Register::CommandReg) => {
                let gate = Gate::check(self.context.take(), value);

                self.run_command(gate);
            }
            _ => {
                debug!(
                    self.log,
                    "mfrc522: write {:#04x} to register {:#04x} ignored", value, address
                );
                self.context = None;
            }
        }
    }

    fn run_command(&mut self, gate: Gate) {
        match gate {
            Gate::Open(payload) => match self.sequencer.transceive(payload) {
                Some(count) => {
                    self.bank.load_fifo(count);
                    debug!(
                        self.log,
                        "mfrc522: transceive {:#04x} -> {:?}, {} bytes in FIFO",
                        payload,
                        self.sequencer.state(),
                        count
                    );
                }
                None => debug!(
                    self.log,
                    "mfrc522: no answer to {:#04x} in state {:?}",
                    payload,
                    self.sequencer.state()
                ),
            },
            Gate::NotTransceive(command) => {
                debug!(self.log, "mfrc522: command {:#04x} ignored", command)
            }
            Gate::Unprimed => debug!(self.log, "mfrc522: command write without FIFO payload"),
        }
    }
}

impl<P: WatchedPin, T: SpiTransport> SpiEventSink for Mfrc522Chip<'_, P, T> {
    fn on_select_edge(&mut self, level: PinLevel) {
        match level {
            PinLevel::Low => {
                debug!(self.log, "mfrc522: selected");
                self.arm();
            }
            PinLevel::High => {
                debug!(
                    self.log,
                    "mfrc522: released in state {:?}",
                    self.sequencer.state()
                );
                self.transport.stop();
                self.sequencer.reset();
                self.phase = Phase::Address;
                self.context = None;
            }
        }
    }

    fn on_transfer_complete(&mut self, completion: Completion) {
        let Completion::Byte(byte) = completion else {
            return;
        };

        self.receive(byte);

        if self.select.level() == PinLevel::Low {
            self.arm();
        }
    }
}
