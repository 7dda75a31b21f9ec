use crate::bus::SpiMaster;
use crate::host::SpiEventSink;
use crate::{picc::PiccCommand, register::*};
use std::fmt;
use thiserror::Error;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

// ComIrqReg reads before giving up on the card. There is no wall clock in the simulation, so
// the safety timer counts polls instead.
const SAFETY_POLLS: usize = 25;
// Max size of FIFO buffer
const MAX_FIFO_BYTES: usize = 64;

#[derive(Debug, Error)]
pub enum Mfrc522Error {
    #[error("error reading card")]
    Transceive(u8),
    #[error("safety timeout reading card")]
    SafetyTimeout,
    #[error("card returned no UID")]
    BadUidSize,
}

/// UID and SAK of a selected card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardId {
    pub uid: Vec<u8>,
    pub sak: u8,
}

impl CardId {
    pub fn as_u64(&self) -> u64 {
        self.uid.iter().fold(0u64, |uid, n| (uid << 8) | *n as u64)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{} (SAK {:#04x})", hex::encode(&self.uid), self.sak)
    }
}

/// Host-side driver for a reader on the simulated bus. Every public operation runs inside a
/// single chip-select frame.
pub struct Mfrc522<'a, D> {
    spi: &'a mut SpiMaster<D>,
}

impl<'a, D: SpiEventSink> Mfrc522<'a, D> {
    pub fn new(spi: &'a mut SpiMaster<D>) -> Mfrc522<'a, D> {
        Mfrc522 { spi }
    }

    fn write(&mut self, reg: Register, data: u8) -> Result<()> {
        // See Section 8.1.2.2 - address byte followed by the data byte
        self.spi.exchange(reg.write_address())?;
        self.spi.exchange(data)?;

        Ok(())
    }

    fn read(&mut self, reg: Register) -> Result<u8> {
        // See Section 8.1.2.1 - the value comes back while the terminating zero is clocked out
        self.spi.exchange(reg.read_address())?;

        Ok(self.spi.exchange(0)?)
    }

    fn read_write(&mut self, reg: Register, func: impl FnOnce(u8) -> u8) -> Result<()> {
        let value = self.read(reg)?;
        let new_value = func(value);
        self.write(reg, new_value)?;

        Ok(())
    }

    fn framed<T>(&mut self, func: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.spi.select();

        let result = func(self);

        self.spi.deselect();
        result
    }

    pub fn reset(&mut self) -> Result<()> {
        self.framed(|mfrc522| {
            // See Section 9.3.1.2 - soft reset the chip, setting all registers to defaults
            mfrc522.write(Register::CommandReg, Command::SoftReset.into())?;

            // See Section 9.3.3.10 - TAuto=1, prescaler 0xd3e for a ~2kHz timer tick
            mfrc522.write(Register::TModeReg, 0x8d)?;
            mfrc522.write(Register::TPrescalerReg, 0x3e)?;
            // 30 ticks ~= 15ms
            mfrc522.write(Register::TReloadRegLow, 30)?;
            mfrc522.write(Register::TReloadRegHigh, 0)?;

            // ForceASK100=1
            mfrc522.write(Register::TxASKReg, 0b0100_0000)?;
            // CRC preset 0x6363
            mfrc522.write(Register::ModeReg, 0b0011_1101)?;

            // Turn on the antenna
            mfrc522.read_write(Register::TxControlReg, |value| value | 0x03)
        })
    }

    pub fn get_version(&mut self) -> Result<u8> {
        self.framed(|mfrc522| mfrc522.read(Register::VersionReg))
    }

    pub fn read_card_id(&mut self) -> Result<CardId> {
        // Releasing chip select at the end puts the card back in the idle state, so no HLTA
        self.framed(|mfrc522| {
            // Section 9.3.1.14 - REQA is a 7 bit short frame
            mfrc522.write(Register::BitFramingReg, 0x07)?;
            mfrc522.transceive_with_card(&[PiccCommand::ReqA.into()])?;

            mfrc522.write(Register::BitFramingReg, 0)?;

            // Anticollision with NVB=0x20 returns the full UID
            let read_bytes = mfrc522.transceive_with_card(&[PiccCommand::SelCl1.into(), 0x20])?;

            match read_bytes.split_last() {
                Some((sak, uid)) if !uid.is_empty() => Ok(CardId {
                    uid: uid.to_vec(),
                    sak: *sak,
                }),
                _ => Err(Box::new(Mfrc522Error::BadUidSize) as Box<dyn std::error::Error>),
            }
        })
    }

    fn transceive_with_card(&mut self, send_data: &[u8]) -> Result<Vec<u8>> {
        // See Section 9.3.1.3 - enable all IRQ's except HiAlertlEn
        self.write(Register::ComlEnReg, 0b11110111)?;

        // See Section 9.3.1.5 - clear all IRQ bits
        self.read_write(Register::ComIrqReg, |value| value & !0x80)?;

        // See Section 9.3.1.11 - flush the FIFO buffer
        self.read_write(Register::FIFOLevelReg, |value| value | 0x80)?;

        // Idle, canceling outstanding commands
        self.write(Register::CommandReg, Command::Idle.into())?;

        if send_data.len() > MAX_FIFO_BYTES {
            return Err(Box::new(Mfrc522Error::Transceive(0)));
        }

        for byte in send_data {
            self.write(Register::FIFODataReg, *byte)?;
        }

        self.write(Register::CommandReg, Command::Transceive.into())?;

        // See Section 9.3.1.14 - StartSend
        self.read_write(Register::BitFramingReg, |value| value | 0x80)?;

        // Exit on RxIRq, IdleIRq or TimerIRq
        let mut answered = false;

        for _ in 0..SAFETY_POLLS {
            if self.read(Register::ComIrqReg)? & 0b0011_0001 != 0 {
                answered = true;
                break;
            }
        }

        self.read_write(Register::BitFramingReg, |value| value & !0x80)?;

        if !answered {
            return Err(Box::new(Mfrc522Error::SafetyTimeout));
        }

        let err = self.read(Register::ErrorReg)? & 0b0001_1011;

        if err != 0 {
            return Err(Box::new(Mfrc522Error::Transceive(err)));
        }

        let num_fifo_bytes = (self.read(Register::FIFOLevelReg)? as usize).clamp(1, MAX_FIFO_BYTES);
        let mut read_data = Vec::with_capacity(num_fifo_bytes);

        for _ in 0..num_fifo_bytes {
            read_data.push(self.read(Register::FIFODataReg)?);
        }

        Ok(read_data)
    }
}
