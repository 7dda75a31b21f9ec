mod bank;
pub mod bus;
mod cancellation_token;
mod chip;
pub mod host;
mod log_macros;
mod mfrc522;
mod picc;
mod register;
mod sequencer;
mod uart_echo;

pub use crate::bank::{RegisterBank, DEFAULT_BYTE, RX_IRQ, VERSION};
pub use crate::chip::{ChipSnapshot, Mfrc522Chip};
pub use crate::mfrc522::{CardId, Mfrc522, Mfrc522Error};
pub use crate::picc::{CardProfile, PiccCommand, ProfileError};
pub use crate::register::{Access, Command, Register};
pub use crate::sequencer::{CardState, Cursor, Drained, Gate, LastWrite, ProtocolSequencer};
pub use crate::uart_echo::UartEchoChip;
use bus::{SimBus, SimPin, SimUart};
use cancellation_token::CancellationToken;
use clap::Parser;
use core::fmt::Arguments;
use host::UartEventSink;
use std::collections::HashMap;
use std::error::Error;
use std::{thread, time};

pub trait SimMfrc522Log {
    fn output(self: &Self, args: Arguments);
    fn debug(self: &Self, args: Arguments);
    fn warning(self: &Self, args: Arguments);
    fn error(self: &Self, args: Arguments);
    /// Called once the command line is parsed
    fn configure(self: &Self, _color: bool, _verbose: bool) {}
}

pub struct SimMfrc522Tool<'a> {
    log: &'a dyn SimMfrc522Log,
}

#[derive(Clone)]
struct Uid(Vec<u8>);

fn parse_uid(s: &str) -> Result<Uid, String> {
    let digits = s.trim_start_matches("0x");

    hex::decode(digits).map(Uid).map_err(|err| err.to_string())
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|err| err.to_string())
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Disable colors in output
    #[arg(long = "no-color", short = 'n', env = "NO_CLI_COLOR")]
    no_color: bool,
    /// Show chip diagnostics
    #[arg(long = "verbose", short = 'v')]
    verbose: bool,
    /// UID of the card in the reader's field, in hex (4, 7 or 10 bytes)
    #[arg(long = "uid", short = 'u', value_parser = parse_uid, default_value = "deadbeef")]
    uid: Uid,
    /// SAK the card answers SELECT with, in hex
    #[arg(long = "sak", value_parser = parse_hex_u8, default_value = "08")]
    sak: u8,
    /// Number of card reads, 0 to read until Ctrl+C
    #[arg(long = "polls", short = 'p', default_value_t = 0)]
    polls: usize,
    /// Milliseconds between card reads
    #[arg(long = "interval", short = 'i', default_value_t = 500)]
    interval: u64,
    /// Feed these bytes to the UART echo chip instead of running the reader
    #[arg(long = "uart")]
    uart: Option<String>,
    /// Reply attribute for the UART echo chip
    #[arg(long = "reply", requires = "uart")]
    reply: Option<String>,
}

impl<'a> SimMfrc522Tool<'a> {
    pub fn new(log: &'a dyn SimMfrc522Log) -> SimMfrc522Tool<'a> {
        SimMfrc522Tool { log }
    }

    pub fn run(
        self: &mut Self,
        args: impl IntoIterator<Item = std::ffi::OsString>,
    ) -> Result<(), Box<dyn Error>> {
        let cli = match Cli::try_parse_from(args) {
            Ok(m) => m,
            Err(err) => {
                output!(self.log, "{}", err.to_string());
                return Ok(());
            }
        };

        self.log.configure(!cli.no_color, cli.verbose);

        match &cli.uart {
            Some(input) => self.run_uart(input.as_bytes(), cli.reply.clone()),
            None => self.run_reader(&cli),
        }
    }

    fn run_reader(&mut self, cli: &Cli) -> Result<(), Box<dyn Error>> {
        let profile = CardProfile::new(&cli.uid.0, cli.sak)?;
        let bus = SimBus::new();
        let chip = Mfrc522Chip::new(self.log, bus.select_pin(), bus.transport(), profile);
        let mut master = bus.attach(chip);
        let mut mfrc522 = Mfrc522::new(&mut master);

        mfrc522.reset()?;

        output!(self.log, "Reader Mfg Version: {:#04x}", mfrc522.get_version()?);

        let token = CancellationToken::new();

        // Only an endless run needs a way out
        if cli.polls == 0 {
            let token_clone = token.clone();

            ctrlc::set_handler(move || {
                eprintln!("Ctrl+C received, stopping...");
                token_clone.cancel();
            })?;
        }

        let mut polls = 0;

        loop {
            match mfrc522.read_card_id() {
                Ok(id) => output!(self.log, "{}", id),
                Err(err) => warning!(self.log, "{}", err),
            };

            polls += 1;

            if polls == cli.polls || token.is_canceled() {
                break;
            }

            thread::sleep(time::Duration::from_millis(cli.interval));

            if token.is_canceled() {
                break;
            }
        }

        Ok(())
    }

    fn run_uart(&mut self, input: &[u8], reply: Option<String>) -> Result<(), Box<dyn Error>> {
        let mut attrs = HashMap::new();

        if let Some(reply) = reply {
            attrs.insert("reply".to_string(), reply);
        }

        let uart = SimUart::new();
        let mut chip = UartEchoChip::new(self.log, SimPin::new(), uart.clone(), &attrs);

        for byte in input {
            chip.on_rx_data(*byte);
            output!(self.log, "TX: {}", String::from_utf8_lossy(&uart.take_sent()));
            chip.on_write_done();
        }

        Ok(())
    }
}
