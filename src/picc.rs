use thiserror::Error;

// Command bytes a PCD places in the FIFO ahead of a Transceive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PiccCommand {
    ReqA = 0x0C,
    SelCl1 = 0x93,
}

impl From<PiccCommand> for u8 {
    fn from(command: PiccCommand) -> u8 {
        command as u8
    }
}

impl TryFrom<u8> for PiccCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0C => Ok(PiccCommand::ReqA),
            0x93 => Ok(PiccCommand::SelCl1),
            other => Err(other),
        }
    }
}

// Answer to REQA for a single-size UID MIFARE card
pub const ATQA: [u8; 2] = [0x04, 0x00];
pub const DEFAULT_UID: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];
pub const DEFAULT_SAK: u8 = 0x08;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("UID must be 4, 7 or 10 bytes, got {0}")]
    BadUidLength(usize),
}

/// The single card presented to the emulated reader. Fixed for the lifetime of a chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardProfile {
    atqa: [u8; 2],
    uid: Vec<u8>,
    sak: u8,
}

impl CardProfile {
    pub fn new(uid: &[u8], sak: u8) -> Result<CardProfile, ProfileError> {
        // ISO 14443-3 single, double and triple size UIDs
        if !matches!(uid.len(), 4 | 7 | 10) {
            return Err(ProfileError::BadUidLength(uid.len()));
        }

        Ok(CardProfile {
            atqa: ATQA,
            uid: uid.to_vec(),
            sak,
        })
    }

    pub fn atqa(&self) -> &[u8] {
        &self.atqa
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    pub fn sak(&self) -> u8 {
        self.sak
    }

    /// Bytes in the FIFO after a successful SELECT: the UID followed by the SAK
    pub fn select_response_len(&self) -> u8 {
        // At most 11, so the cast is lossless
        (self.uid.len() + 1) as u8
    }
}

impl Default for CardProfile {
    fn default() -> CardProfile {
        CardProfile {
            atqa: ATQA,
            uid: DEFAULT_UID.to_vec(),
            sak: DEFAULT_SAK,
        }
    }
}
