//! In-process stand-in for the simulator: one SPI master, one chip-select line and a UART.
//!
//! Everything is single threaded. The chip gets cheap handles onto a shared [`Wire`] and the
//! master owns the chip, so every callback is delivered only after the previous one returned.

use crate::host::{Completion, Edge, PinLevel, SpiEventSink, SpiTransport, UartPort, WatchedPin};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("chip select is not asserted")]
    NotSelected,
    #[error("device has no transfer armed")]
    NotArmed,
}

#[derive(Debug)]
struct Wire {
    select: PinLevel,
    watch: Option<Edge>,
    // Byte the device will shift out on the next clocked exchange
    armed: Option<u8>,
    aborted: bool,
}

#[derive(Clone)]
pub struct SimSelectPin(Rc<RefCell<Wire>>);

impl WatchedPin for SimSelectPin {
    fn level(&self) -> PinLevel {
        self.0.borrow().select
    }

    fn watch(&mut self, edge: Edge) {
        self.0.borrow_mut().watch = Some(edge);
    }
}

#[derive(Clone)]
pub struct SimTransport(Rc<RefCell<Wire>>);

impl SpiTransport for SimTransport {
    fn start(&mut self, tx: &[u8]) {
        self.0.borrow_mut().armed = tx.first().copied();
    }

    fn stop(&mut self) {
        let mut wire = self.0.borrow_mut();

        if wire.armed.take().is_some() {
            wire.aborted = true;
        }
    }
}

/// A bus with nothing attached yet. Hand its pin and transport to a chip, then `attach` it.
pub struct SimBus {
    wire: Rc<RefCell<Wire>>,
}

impl SimBus {
    pub fn new() -> SimBus {
        SimBus {
            wire: Rc::new(RefCell::new(Wire {
                select: PinLevel::High,
                watch: None,
                armed: None,
                aborted: false,
            })),
        }
    }

    pub fn select_pin(&self) -> SimSelectPin {
        SimSelectPin(self.wire.clone())
    }

    pub fn transport(&self) -> SimTransport {
        SimTransport(self.wire.clone())
    }

    pub fn attach<D: SpiEventSink>(self, device: D) -> SpiMaster<D> {
        SpiMaster {
            wire: self.wire,
            device,
        }
    }
}

impl Default for SimBus {
    fn default() -> SimBus {
        SimBus::new()
    }
}

pub struct SpiMaster<D> {
    wire: Rc<RefCell<Wire>>,
    device: D,
}

impl<D: SpiEventSink> SpiMaster<D> {
    /// Drive chip select low (active)
    pub fn select(&mut self) {
        self.set_select(PinLevel::Low);
    }

    /// Drive chip select high, ending the frame
    pub fn deselect(&mut self) {
        self.set_select(PinLevel::High);
    }

    pub fn is_selected(&self) -> bool {
        self.wire.borrow().select == PinLevel::Low
    }

    /// Is the device waiting for the next clocked byte?
    pub fn is_armed(&self) -> bool {
        self.wire.borrow().armed.is_some()
    }

    /// Clock one byte each way and return what the device shifted out
    pub fn exchange(&mut self, mosi: u8) -> Result<u8, BusError> {
        let miso = {
            let mut wire = self.wire.borrow_mut();

            if wire.select != PinLevel::Low {
                return Err(BusError::NotSelected);
            }

            wire.armed.take().ok_or(BusError::NotArmed)?
        };

        self.device
            .on_transfer_complete(Completion::from_buffer(&[mosi], 1));

        Ok(miso)
    }

    pub fn transfer(&mut self, mosi: &[u8]) -> Result<Vec<u8>, BusError> {
        mosi.iter().map(|byte| self.exchange(*byte)).collect()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn set_select(&mut self, level: PinLevel) {
        let fires = {
            let mut wire = self.wire.borrow_mut();

            if wire.select == level {
                return;
            }

            wire.select = level;
            wire.watch.is_some_and(|edge| edge.fires_on(level))
        };

        if fires {
            self.device.on_select_edge(level);
        }

        // A stop issued from the edge handler completes with zero bytes, after the handler returned
        let aborted = std::mem::take(&mut self.wire.borrow_mut().aborted);

        if aborted {
            self.device.on_transfer_complete(Completion::from_buffer(&[], 0));
        }
    }
}

#[derive(Debug)]
struct PinState {
    level: PinLevel,
    watch: Option<Edge>,
}

/// Stand-alone input pin, starting low (pull-down)
#[derive(Clone)]
pub struct SimPin(Rc<RefCell<PinState>>);

impl SimPin {
    pub fn new() -> SimPin {
        SimPin(Rc::new(RefCell::new(PinState {
            level: PinLevel::Low,
            watch: None,
        })))
    }

    /// Drive the pin from outside. Returns true when the owner's watch fires and the host must
    /// deliver the edge.
    pub fn drive(&self, level: PinLevel) -> bool {
        let mut state = self.0.borrow_mut();

        if state.level == level {
            return false;
        }

        state.level = level;
        state.watch.is_some_and(|edge| edge.fires_on(level))
    }
}

impl Default for SimPin {
    fn default() -> SimPin {
        SimPin::new()
    }
}

impl WatchedPin for SimPin {
    fn level(&self) -> PinLevel {
        self.0.borrow().level
    }

    fn watch(&mut self, edge: Edge) {
        self.0.borrow_mut().watch = Some(edge);
    }
}

/// UART that accepts every write and keeps what was sent
#[derive(Clone, Default)]
pub struct SimUart {
    sent: Rc<RefCell<Vec<u8>>>,
}

impl SimUart {
    pub fn new() -> SimUart {
        SimUart::default()
    }

    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

impl UartPort for SimUart {
    fn write(&mut self, data: &[u8]) -> bool {
        self.sent.borrow_mut().extend_from_slice(data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shifts back whatever it last received and counts callbacks
    struct Loopback {
        pin: SimSelectPin,
        transport: SimTransport,
        next: u8,
        edges: Vec<PinLevel>,
        aborts: usize,
    }

    impl SpiEventSink for Loopback {
        fn on_select_edge(&mut self, level: PinLevel) {
            self.edges.push(level);

            match level {
                PinLevel::Low => self.transport.start(&[self.next]),
                PinLevel::High => self.transport.stop(),
            }
        }

        fn on_transfer_complete(&mut self, completion: Completion) {
            match completion {
                Completion::Aborted => self.aborts += 1,
                Completion::Byte(byte) => {
                    self.next = byte;

                    if self.pin.level() == PinLevel::Low {
                        self.transport.start(&[self.next]);
                    }
                }
            }
        }
    }

    fn loopback(edge: Edge) -> SpiMaster<Loopback> {
        let bus = SimBus::new();
        let mut pin = bus.select_pin();

        pin.watch(edge);

        let device = Loopback {
            pin,
            transport: bus.transport(),
            next: 0xa5,
            edges: vec![],
            aborts: 0,
        };

        bus.attach(device)
    }

    #[test]
    fn exchange_requires_select() {
        let mut master = loopback(Edge::Both);

        assert_eq!(master.exchange(0x01), Err(BusError::NotSelected));
    }

    #[test]
    fn bytes_shift_one_exchange_late() {
        let mut master = loopback(Edge::Both);

        master.select();

        assert_eq!(master.transfer(&[0x01, 0x02, 0x03]).unwrap(), vec![0xa5, 0x01, 0x02]);
    }

    #[test]
    fn deselect_aborts_armed_transfer() {
        let mut master = loopback(Edge::Both);

        master.select();
        master.deselect();
        master.deselect();

        assert_eq!(master.device().edges, vec![PinLevel::Low, PinLevel::High]);
        assert_eq!(master.device().aborts, 1);
        assert!(!master.is_armed());
    }

    #[test]
    fn unwatched_edge_is_not_delivered() {
        let mut master = loopback(Edge::Rising);

        master.select();

        assert!(master.device().edges.is_empty());
        assert_eq!(master.exchange(0x01), Err(BusError::NotArmed));
    }

    #[test]
    fn pin_reports_watched_edges_only() {
        let pin = SimPin::new();
        let mut owner = pin.clone();

        assert!(!pin.drive(PinLevel::High));

        owner.watch(Edge::Falling);

        assert!(pin.drive(PinLevel::Low));
        assert!(!pin.drive(PinLevel::Low));
        assert!(!pin.drive(PinLevel::High));
        assert_eq!(owner.level(), PinLevel::High);
    }

    #[test]
    fn uart_keeps_sent_bytes() {
        let mut uart = SimUart::new();

        assert!(uart.write(b"ok"));
        assert_eq!(uart.take_sent(), b"ok".to_vec());
        assert!(uart.take_sent().is_empty());
    }
}
