// See Section 9.2 of the MFRC522 data sheet for the register map. Only the registers the
// emulated chip or the reader driver touch are named here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Reserved00 = 0x00,
    CommandReg = 0x01,
    ComlEnReg = 0x02,
    ComIrqReg = 0x04,
    DivIrqReg = 0x05,
    ErrorReg = 0x06,
    FIFODataReg = 0x09,
    FIFOLevelReg = 0x0A,
    ControlReg = 0x0C,
    BitFramingReg = 0x0D,
    ModeReg = 0x11,
    TxControlReg = 0x14,
    TxASKReg = 0x15,
    TModeReg = 0x2A,
    TPrescalerReg = 0x2B,
    TReloadRegHigh = 0x2C,
    TReloadRegLow = 0x2D,
    VersionReg = 0x37,
}

impl Register {
    pub fn from_address(address: u8) -> Option<Register> {
        use Register::*;

        let register = match address {
            0x00 => Reserved00,
            0x01 => CommandReg,
            0x02 => ComlEnReg,
            0x04 => ComIrqReg,
            0x05 => DivIrqReg,
            0x06 => ErrorReg,
            0x09 => FIFODataReg,
            0x0A => FIFOLevelReg,
            0x0C => ControlReg,
            0x0D => BitFramingReg,
            0x11 => ModeReg,
            0x14 => TxControlReg,
            0x15 => TxASKReg,
            0x2A => TModeReg,
            0x2B => TPrescalerReg,
            0x2C => TReloadRegHigh,
            0x2D => TReloadRegLow,
            0x37 => VersionReg,
            _ => return None,
        };

        Some(register)
    }

    /// Address byte a host sends to read this register (Section 8.1.2.1)
    pub fn read_address(self) -> u8 {
        ((self as u8) << 1) | 0x80
    }

    /// Address byte a host sends to write this register (Section 8.1.2.2)
    pub fn write_address(self) -> u8 {
        ((self as u8) << 1) & 0x7e
    }
}

// See Section 10.3 - PCD commands written to CommandReg
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Idle = 0x00,
    Transceive = 0x0E,
    SoftReset = 0x0F,
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Command::Idle),
            0x0E => Ok(Command::Transceive),
            0x0F => Ok(Command::SoftReset),
            other => Err(other),
        }
    }
}

/// One decoded SPI address byte
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8),
}

impl Access {
    /// Classifies a received address byte. The MSB selects the direction, bits 6..1 carry the
    /// register address and bit 0 is ignored.
    pub fn decode(byte: u8) -> Access {
        let address = (byte >> 1) & 0x3f;

        if byte & 0x80 != 0 {
            Access::Read(address)
        } else {
            Access::Write(address)
        }
    }

    pub fn address(self) -> u8 {
        match self {
            Access::Read(address) | Access::Write(address) => address,
        }
    }

    pub fn register(self) -> Option<Register> {
        Register::from_address(self.address())
    }
}
