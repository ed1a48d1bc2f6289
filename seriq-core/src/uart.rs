//! Buffered, interrupt-driven UART transport
//!
//! [`Uart`] owns the two ring buffers and, optionally, an observer that sees
//! every received byte (the pattern matcher). One instance exists per
//! peripheral, normally in a `static`, and is used through `&self` from both
//! foreground code and the interrupt handlers:
//!
//! ```text
//!  foreground                          interrupt
//!  ──────────                          ─────────
//!  send_* ──push──▶ [ TX ring ] ──pop──▶ on_tx_ready ──▶ data register
//!  recv_* ◀──pop─── [ RX ring ] ◀─push── on_rx_complete ◀── data register
//!  check_match ◀─── [ matcher ] ◀─feed──┘
//! ```
//!
//! Foreground mutations run under an [`IrqMask`] on the line that owns the
//! state. Blocking calls spin with the line unmasked between attempts, so
//! the handler can make progress. Nothing here times out.

use core::hint;

use seriq_hal::{SerialPort, UartConfig};

use crate::irq::{IrqCell, IrqMask, IsrContext, Line, RxLine, TxLine};
use crate::matcher::{MatchError, MatchHandler, MatchTable};
use crate::ring::RingBuffer;
use crate::stream::Stream;
use crate::text::{Decimal, FixedPoint, CLEAR_SCREEN, NEWLINE};

/// Hook run on every received byte inside the receive interrupt
///
/// Implementations must be short, must not block and must not allocate.
pub trait RxObserver {
    fn observe(&mut self, byte: u8);
}

/// No observer: pattern matching disabled
impl RxObserver for () {
    fn observe(&mut self, _byte: u8) {}
}

/// Receive-side state, all guarded by the RX line
struct RxSide<const N: usize, M> {
    ring: RingBuffer<N>,
    overruns: u32,
    observer: M,
}

/// UART transport with `RX` bytes of receive and `TX` bytes of transmit
/// buffering
pub struct Uart<P, const RX: usize, const TX: usize, M = ()>
where
    P: SerialPort,
    M: RxObserver,
{
    port: P,
    rx: IrqCell<RxSide<RX, M>, RxLine>,
    tx: IrqCell<RingBuffer<TX>, TxLine>,
}

impl<P: SerialPort, const RX: usize, const TX: usize> Uart<P, RX, TX> {
    /// Transport without pattern matching
    pub const fn new(port: P) -> Self {
        Self::with_observer(port, ())
    }
}

impl<P, const RX: usize, const TX: usize, C, const N: usize, const L: usize>
    Uart<P, RX, TX, MatchTable<C, N, L>>
where
    P: SerialPort,
    C: Copy,
{
    /// Transport with an empty pattern match table
    pub const fn with_matching(port: P) -> Self {
        Self::with_observer(port, MatchTable::new())
    }

    /// Watch the input for `pattern`
    ///
    /// Patterns longer than `L` are truncated. On success `handler` runs with
    /// `context` from [`check_match`](Self::check_match) after each completed
    /// occurrence.
    pub fn register_match(
        &self,
        pattern: &[u8],
        handler: MatchHandler<C>,
        context: C,
    ) -> Result<(), MatchError> {
        let mask = self.mask::<RxLine>();
        let result = self
            .rx
            .lock(&mask)
            .observer
            .register(pattern, handler, context);
        result
    }

    /// Stop watching for `pattern`; returns `false` if it was not registered
    pub fn deregister_match(&self, pattern: &[u8]) -> bool {
        let mask = self.mask::<RxLine>();
        let removed = self.rx.lock(&mask).observer.deregister(pattern);
        removed
    }

    /// Dispatch sweep: run the handler of every pattern matched since the
    /// previous sweep
    ///
    /// Foreground only. Handlers run with interrupts unmasked and may use the
    /// blocking API. Several matches of one pattern between sweeps fire once.
    pub fn check_match(&self) {
        let ready = {
            let mask = self.mask::<RxLine>();
            let ready = self.rx.lock(&mask).observer.take_triggered();
            ready
        };
        for (handler, context) in ready {
            handler(context);
        }
    }
}

impl<P, const RX: usize, const TX: usize, M> Uart<P, RX, TX, M>
where
    P: SerialPort,
    M: RxObserver,
{
    /// Transport with a custom receive observer
    pub const fn with_observer(port: P, observer: M) -> Self {
        Self {
            port,
            rx: IrqCell::new(RxSide {
                ring: RingBuffer::new(),
                overruns: 0,
                observer,
            }),
            tx: IrqCell::new(RingBuffer::new()),
        }
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Program the line settings, enable the peripheral and empty both buffers
    pub fn setup(&self, config: &UartConfig) {
        self.port.set_baud(config.effective_baudrate());
        self.port
            .set_frame(config.data_bits, config.stop_bits, config.parity);
        self.port.enable();
        self.flush();
    }

    /// Receive interrupt entry: store the incoming byte
    ///
    /// The observer sees the byte first. A full RX buffer drops its oldest
    /// byte and counts an overrun; the handler never waits.
    pub fn on_rx_complete(&self, cx: &IsrContext) {
        let byte = self.port.read_data();
        let mut guard = self.rx.isr(cx);
        let rx = &mut *guard;
        rx.observer.observe(byte);
        if rx.ring.push_overwrite(byte) {
            rx.overruns = rx.overruns.saturating_add(1);
        }
    }

    /// Transmit interrupt entry: move one byte to the data register
    ///
    /// Masks its own interrupt once the TX buffer is empty.
    pub fn on_tx_ready(&self, cx: &IsrContext) {
        let mut tx = self.tx.isr(cx);
        if let Some(byte) = tx.pop() {
            self.port.write_data(byte);
        }
        if tx.is_empty() {
            self.port.disable_tx_interrupt();
        }
    }

    /// Discard everything received so far
    pub fn flush_rx(&self) {
        let mask = self.mask::<RxLine>();
        self.rx.lock(&mask).ring.reset();
    }

    /// Wait for queued output to reach the hardware, then reset the TX buffer
    pub fn flush_tx(&self) {
        self.drain_tx();
        let mask = self.mask::<TxLine>();
        self.tx.lock(&mask).reset();
    }

    /// [`flush_rx`](Self::flush_rx) followed by [`flush_tx`](Self::flush_tx)
    pub fn flush(&self) {
        self.flush_rx();
        self.flush_tx();
    }

    /// Bytes waiting in the RX buffer
    pub fn available(&self) -> usize {
        let mask = self.mask::<RxLine>();
        let len = self.rx.lock(&mask).ring.len();
        len
    }

    /// Bytes of free space in the TX buffer
    pub fn tx_free(&self) -> usize {
        let mask = self.mask::<TxLine>();
        let free = self.tx.lock(&mask).free();
        free
    }

    /// Received bytes lost to a full RX buffer since start
    pub fn rx_overruns(&self) -> u32 {
        let mask = self.mask::<RxLine>();
        let overruns = self.rx.lock(&mask).overruns;
        overruns
    }

    /// Next received byte without consuming it, or 0 if none
    ///
    /// A received NUL is indistinguishable from an empty buffer here; use
    /// [`available`](Self::available) when that matters.
    pub fn peek_byte(&self) -> u8 {
        let mask = self.mask::<RxLine>();
        let byte = self.rx.lock(&mask).ring.peek();
        byte.unwrap_or(0)
    }

    /// Wait for a byte and consume it
    pub fn recv_byte(&self) -> u8 {
        loop {
            if let Some(byte) = self.pop_rx() {
                return byte;
            }
            hint::spin_loop();
        }
    }

    /// Consume a byte if one is waiting, otherwise return 0
    ///
    /// Same NUL ambiguity as [`peek_byte`](Self::peek_byte).
    pub fn try_recv_byte(&self) -> u8 {
        self.pop_rx().unwrap_or(0)
    }

    /// Wait until `buf` can be filled, then copy without consuming
    ///
    /// The request is clamped to the RX capacity. Returns the number of
    /// bytes copied.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let wanted = buf.len().min(RX);
        loop {
            {
                let mask = self.mask::<RxLine>();
                let rx = self.rx.lock(&mask);
                if rx.ring.len() >= wanted {
                    return rx.ring.peek_into(&mut buf[..wanted]);
                }
            }
            hint::spin_loop();
        }
    }

    /// Fill `buf` with received bytes, waiting as long as it takes
    pub fn recv(&self, buf: &mut [u8]) -> usize {
        for slot in buf.iter_mut() {
            *slot = self.recv_byte();
        }
        buf.len()
    }

    /// Queue a byte, waiting for space if the TX buffer is full
    pub fn send_byte(&self, byte: u8) {
        while !self.push_tx(byte) {
            hint::spin_loop();
        }
    }

    /// Queue a byte if there is space; returns whether it was queued
    pub fn try_send_byte(&self, byte: u8) -> bool {
        self.push_tx(byte)
    }

    /// Queue every byte of `data`, waiting for space as needed
    pub fn send(&self, data: &[u8]) {
        for &byte in data {
            self.send_byte(byte);
        }
    }

    /// Queue a constant string kept in read-only storage
    ///
    /// Stops at the first NUL byte, so C-style terminated tables work as is.
    pub fn send_static(&self, data: &'static [u8]) {
        for &byte in data.iter().take_while(|&&byte| byte != 0) {
            self.send_byte(byte);
        }
    }

    /// [`send`](Self::send) followed by CRLF
    pub fn sendln(&self, data: &[u8]) {
        self.send(data);
        self.newline();
    }

    /// Send `value` as decimal text
    pub fn send_uint(&self, value: u32) {
        self.send(Decimal::unsigned(value).as_bytes());
    }

    /// Send `value` as decimal text with a leading `-` when negative
    pub fn send_int(&self, value: i32) {
        self.send(Decimal::signed(value).as_bytes());
    }

    /// Send `value` with `fraction_digits` truncated decimals (at most 4)
    pub fn send_float(&self, value: f32, fraction_digits: u8) {
        self.send(FixedPoint::new(value, fraction_digits).as_bytes());
    }

    pub fn newline(&self) {
        self.send(NEWLINE);
    }

    /// Clear an ANSI terminal and home the cursor
    pub fn clear_screen(&self) {
        self.send(CLEAR_SCREEN);
    }

    /// Borrowed handle implementing `core::fmt::Write` and `embedded-io`
    pub fn stream(&self) -> Stream<'_, P, RX, TX, M> {
        Stream::new(self)
    }

    pub(crate) fn pop_rx(&self) -> Option<u8> {
        let mask = self.mask::<RxLine>();
        let byte = self.rx.lock(&mask).ring.pop();
        byte
    }

    /// Push under the TX mask, then unmask the TX interrupt so it drains
    pub(crate) fn push_tx(&self, byte: u8) -> bool {
        let pushed = {
            let mask = self.mask::<TxLine>();
            let pushed = self.tx.lock(&mask).push(byte);
            pushed
        };
        if pushed {
            self.port.enable_tx_interrupt();
        }
        pushed
    }

    /// Spin until the interrupt handler has emptied the TX buffer
    pub(crate) fn drain_tx(&self) {
        loop {
            let empty = {
                let mask = self.mask::<TxLine>();
                let empty = self.tx.lock(&mask).is_empty();
                empty
            };
            if empty {
                return;
            }
            hint::spin_loop();
        }
    }

    fn mask<Ln: Line>(&self) -> IrqMask<'_, P, Ln> {
        IrqMask::new(&self.port)
    }
}
