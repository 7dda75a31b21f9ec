use core::fmt::Arguments;
use sim_mfrc522::{error, SimMfrc522Log, SimMfrc522Tool};
use std::cell::Cell;
use termion::color;

struct SimMfrc522Logger {
    color: Cell<bool>,
    verbose: Cell<bool>,
}

impl SimMfrc522Logger {
    fn new() -> SimMfrc522Logger {
        SimMfrc522Logger {
            color: Cell::new(true),
            verbose: Cell::new(false),
        }
    }

    fn paint<C: color::Color>(&self, fg: C) -> String {
        if self.color.get() {
            format!("{}", color::Fg(fg))
        } else {
            String::new()
        }
    }

    fn reset(&self) -> String {
        if self.color.get() {
            format!("{}", color::Fg(color::Reset))
        } else {
            String::new()
        }
    }
}

impl SimMfrc522Log for SimMfrc522Logger {
    fn output(self: &Self, args: Arguments) {
        println!("{}", args);
    }
    fn debug(self: &Self, args: Arguments) {
        if self.verbose.get() {
            eprintln!("{}{}{}", self.paint(color::LightBlack), args, self.reset());
        }
    }
    fn warning(self: &Self, args: Arguments) {
        eprintln!("{}warning: {}{}", self.paint(color::Yellow), args, self.reset());
    }
    fn error(self: &Self, args: Arguments) {
        eprintln!("{}error: {}{}", self.paint(color::Red), args, self.reset());
    }
    fn configure(self: &Self, color: bool, verbose: bool) {
        self.color.set(color);
        self.verbose.set(verbose);
    }
}

fn main() {
    let logger = SimMfrc522Logger::new();

    if let Err(error) = SimMfrc522Tool::new(&logger).run(std::env::args_os()) {
        error!(logger, "{}", error);
        std::process::exit(1);
    }
}
