//! Interfaces the circuit simulator provides to a chip.
//!
//! A chip never drives the simulation itself: it registers interest in pin edges and transport
//! completions, and the host calls back into it. Handlers run to completion before the host
//! delivers the next event.

use std::collections::HashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Does a transition to `level` fire a watch registered for this edge?
    pub fn fires_on(self, level: PinLevel) -> bool {
        match self {
            Edge::Both => true,
            Edge::Rising => level == PinLevel::High,
            Edge::Falling => level == PinLevel::Low,
        }
    }
}

/// Input pin with an edge watch
pub trait WatchedPin {
    fn level(&self) -> PinLevel;
    fn watch(&mut self, edge: Edge);
}

/// Byte-oriented, full-duplex, clocked transport (the slave side of an SPI bus)
pub trait SpiTransport {
    /// Shift out `tx` while shifting in the same number of bytes from the master
    fn start(&mut self, tx: &[u8]);
    /// Abort the exchange in flight, if any. The host reports it as a zero-length completion.
    fn stop(&mut self);
}

/// How an exchange started with [`SpiTransport::start`] ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    Byte(u8),
    Aborted,
}

impl Completion {
    /// Host callbacks report a buffer and a count; a zero count means the exchange was stopped
    pub fn from_buffer(buffer: &[u8], count: usize) -> Completion {
        match (count, buffer.first()) {
            (0, _) | (_, None) => Completion::Aborted,
            (_, Some(byte)) => Completion::Byte(*byte),
        }
    }
}

/// Callbacks of a chip that sits on an SPI bus behind a chip-select line
pub trait SpiEventSink {
    fn on_select_edge(&mut self, level: PinLevel);
    fn on_transfer_complete(&mut self, completion: Completion);
}

pub trait UartPort {
    /// Queue bytes for transmission. Returns false while a previous write is still in progress.
    fn write(&mut self, data: &[u8]) -> bool;
}

pub trait UartEventSink {
    fn on_rx_data(&mut self, byte: u8);
    fn on_write_done(&mut self);
    fn on_input_edge(&mut self, level: PinLevel);
}

/// Per-instance chip attributes set in the circuit description
pub trait AttrStore {
    fn attr(&self, name: &str) -> Option<&str>;
}

impl AttrStore for HashMap<String, String> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}
