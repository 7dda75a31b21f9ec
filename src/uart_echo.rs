use crate::host::{AttrStore, Edge, PinLevel, UartEventSink, UartPort, WatchedPin};
use crate::{output, warning, SimMfrc522Log};

pub const DEFAULT_REPLY: &str = "TUPM-20-2829";
pub const DEFAULT_BAUD: u32 = 9600;

/// Answers every byte received on RX with a fixed identifier string
pub struct UartEchoChip<'a, P, U> {
    log: &'a dyn SimMfrc522Log,
    input: P,
    uart: U,
    reply: String,
    baud_rate: u32,
}

impl<'a, P: WatchedPin, U: UartPort> UartEchoChip<'a, P, U> {
    /// Attributes: `reply` (string sent back) and `baud` (informational, the host clocks the line).
    /// Only rising edges on the IN pin are reported.
    pub fn new(
        log: &'a dyn SimMfrc522Log,
        mut input: P,
        uart: U,
        attrs: &dyn AttrStore,
    ) -> UartEchoChip<'a, P, U> {
        let reply = attrs.attr("reply").unwrap_or(DEFAULT_REPLY).to_string();
        let baud_rate = match attrs.attr("baud").map(str::parse::<u32>) {
            None => DEFAULT_BAUD,
            Some(Ok(baud_rate)) => baud_rate,
            Some(Err(err)) => {
                warning!(log, "uart: bad baud attribute ({}), using {}", err, DEFAULT_BAUD);
                DEFAULT_BAUD
            }
        };

        input.watch(Edge::Rising);

        UartEchoChip {
            log,
            input,
            uart,
            reply,
            baud_rate,
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl<P: WatchedPin, U: UartPort> UartEventSink for UartEchoChip<'_, P, U> {
    fn on_rx_data(&mut self, byte: u8) {
        output!(self.log, "Incoming UART data: {}", byte);

        if !self.uart.write(self.reply.as_bytes()) {
            warning!(self.log, "uart: transmitter busy, reply to {:#04x} dropped", byte);
        }
    }

    fn on_write_done(&mut self) {
        output!(self.log, "UART done");
    }

    fn on_input_edge(&mut self, level: PinLevel) {
        // Falling edges are not watched
        if level == PinLevel::Low {
            return;
        }

        output!(self.log, "IN pin rising edge, now {:?}", self.input.level());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SimPin, SimUart};
    use crate::test_log::TestLogger;
    use std::collections::HashMap;

    struct BusyUart;

    impl UartPort for BusyUart {
        fn write(&mut self, _data: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn replies_to_every_byte() {
        let log = TestLogger::new();
        let uart = SimUart::new();
        let attrs = HashMap::<String, String>::new();
        let mut chip = UartEchoChip::new(&log, SimPin::new(), uart.clone(), &attrs);

        chip.on_rx_data(b'a');
        chip.on_write_done();
        chip.on_rx_data(b'b');

        assert_eq!(uart.take_sent(), b"TUPM-20-2829TUPM-20-2829".to_vec());
        assert_eq!(chip.baud_rate(), 9600);
        assert!(log.lines().contains(&"Incoming UART data: 97".to_string()));
        assert!(log.lines().contains(&"UART done".to_string()));
    }

    #[test]
    fn attributes_override_defaults() {
        let log = TestLogger::new();
        let attrs = HashMap::from([
            ("reply".to_string(), "hello".to_string()),
            ("baud".to_string(), "115200".to_string()),
        ]);
        let uart = SimUart::new();
        let mut chip = UartEchoChip::new(&log, SimPin::new(), uart.clone(), &attrs);

        chip.on_rx_data(0);

        assert_eq!(uart.take_sent(), b"hello".to_vec());
        assert_eq!(chip.baud_rate(), 115200);
    }

    #[test]
    fn bad_baud_falls_back() {
        let log = TestLogger::new();
        let attrs = HashMap::from([("baud".to_string(), "fast".to_string())]);
        let chip = UartEchoChip::new(&log, SimPin::new(), SimUart::new(), &attrs);

        assert_eq!(chip.baud_rate(), DEFAULT_BAUD);
        assert!(log.lines()[0].starts_with("warning: uart: bad baud attribute"));
    }

    #[test]
    fn busy_transmitter_is_reported() {
        let log = TestLogger::new();
        let attrs = HashMap::<String, String>::new();
        let mut chip = UartEchoChip::new(&log, SimPin::new(), BusyUart, &attrs);

        chip.on_rx_data(0x41);

        assert_eq!(
            log.lines().last().unwrap(),
            "warning: uart: transmitter busy, reply to 0x41 dropped"
        );
    }

    #[test]
    fn only_rising_input_edges_are_reported() {
        let log = TestLogger::new();
        let pin = SimPin::new();
        let attrs = HashMap::<String, String>::new();
        let mut chip = UartEchoChip::new(&log, pin.clone(), SimUart::new(), &attrs);

        for level in [PinLevel::High, PinLevel::Low, PinLevel::High] {
            if pin.drive(level) {
                chip.on_input_edge(level);
            }
        }

        // Delivered directly, a low level is still ignored
        chip.on_input_edge(PinLevel::Low);

        assert_eq!(
            log.lines(),
            vec![
                "IN pin rising edge, now High".to_string(),
                "IN pin rising edge, now High".to_string(),
            ]
        );
    }
}
