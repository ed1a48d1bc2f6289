//! Trait adapters over a [`Uart`]
//!
//! [`Stream`] lets generic code (`core::write!`, `embedded-io` consumers)
//! talk through the transport. All calls block the same way the inherent
//! `Uart` methods do, so the error type is [`Infallible`].

use core::convert::Infallible;
use core::fmt;

use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};
use seriq_hal::SerialPort;

use crate::uart::{RxObserver, Uart};

/// Borrowed I/O handle, see [`Uart::stream`]
pub struct Stream<'a, P, const RX: usize, const TX: usize, M>
where
    P: SerialPort,
    M: RxObserver,
{
    uart: &'a Uart<P, RX, TX, M>,
}

impl<'a, P, const RX: usize, const TX: usize, M> Stream<'a, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    pub(crate) fn new(uart: &'a Uart<P, RX, TX, M>) -> Self {
        Self { uart }
    }
}

/// Text output; `\n` goes out as CRLF
impl<P, const RX: usize, const TX: usize, M> fmt::Write for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) => self.uart.sendln(body.as_bytes()),
                None => self.uart.send(line.as_bytes()),
            }
        }
        Ok(())
    }
}

impl<P, const RX: usize, const TX: usize, M> ErrorType for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    type Error = Infallible;
}

impl<P, const RX: usize, const TX: usize, M> Read for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    /// Waits for the first byte, then takes whatever else is already buffered
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        *first = self.uart.recv_byte();
        let mut count = 1;
        for slot in rest {
            match self.uart.pop_rx() {
                Some(byte) => *slot = byte,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }
}

impl<P, const RX: usize, const TX: usize, M> ReadReady for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.available() > 0)
    }
}

impl<P, const RX: usize, const TX: usize, M> Write for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    /// Waits for room for the first byte, then queues as much as fits
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let Some((&first, rest)) = buf.split_first() else {
            return Ok(0);
        };
        self.uart.send_byte(first);
        let queued = rest
            .iter()
            .take_while(|&&byte| self.uart.push_tx(byte))
            .count();
        Ok(1 + queued)
    }

    /// Returns once the TX buffer has been handed to the hardware
    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.drain_tx();
        Ok(())
    }
}

impl<P, const RX: usize, const TX: usize, M> WriteReady for Stream<'_, P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.tx_free() > 0)
    }
}
