//! Host-side stand-in for a UART peripheral
//!
//! Interrupts are simulated: [`deliver`] plays receive interrupts and
//! [`pump_tx`] plays transmit interrupts for as long as the port keeps the
//! transmit line unmasked.
//!
//! [`SharedPort`] is the threaded variant for the blocking calls: a second
//! thread runs [`run_interrupts`] while the test thread waits inside the
//! transport. Masking a line from the foreground waits out a handler that
//! is already running, the way a real interrupt completes before the mask
//! takes effect.

use core::cell::{Cell, Ref, RefCell};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;

use heapless::Vec;
use seriq_hal::{DataBits, Parity, SerialPort, StopBits};

use crate::irq::IsrContext;
use crate::uart::{RxObserver, Uart};

#[derive(Default)]
pub struct MockPort {
    baud: Cell<u32>,
    frame: Cell<Option<(DataBits, StopBits, Parity)>>,
    enabled: Cell<bool>,
    rx_irq: Cell<bool>,
    tx_irq: Cell<bool>,
    rx_masks: Cell<usize>,
    rx_data: Cell<u8>,
    sent: RefCell<Vec<u8, 256>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baud(&self) -> u32 {
        self.baud.get()
    }

    pub fn frame(&self) -> Option<(DataBits, StopBits, Parity)> {
        self.frame.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// How many times the receive interrupt has been masked
    pub fn rx_mask_count(&self) -> usize {
        self.rx_masks.get()
    }

    /// Everything written to the data register so far
    pub fn sent(&self) -> Ref<'_, Vec<u8, 256>> {
        self.sent.borrow()
    }

    fn latch_rx(&self, byte: u8) {
        self.rx_data.set(byte);
    }
}

impl SerialPort for MockPort {
    fn set_baud(&self, baudrate: u32) {
        self.baud.set(baudrate);
    }

    fn set_frame(&self, data_bits: DataBits, stop_bits: StopBits, parity: Parity) {
        self.frame.set(Some((data_bits, stop_bits, parity)));
    }

    fn enable(&self) {
        self.enabled.set(true);
        self.rx_irq.set(true);
    }

    fn enable_tx_interrupt(&self) {
        self.tx_irq.set(true);
    }

    fn disable_tx_interrupt(&self) {
        self.tx_irq.set(false);
    }

    fn tx_interrupt_enabled(&self) -> bool {
        self.tx_irq.get()
    }

    fn enable_rx_interrupt(&self) {
        self.rx_irq.set(true);
    }

    fn disable_rx_interrupt(&self) {
        self.rx_masks.set(self.rx_masks.get() + 1);
        self.rx_irq.set(false);
    }

    fn rx_interrupt_enabled(&self) -> bool {
        self.rx_irq.get()
    }

    fn read_data(&self) -> u8 {
        self.rx_data.get()
    }

    fn write_data(&self, byte: u8) {
        self.sent
            .borrow_mut()
            .push(byte)
            .expect("mock transmit log full");
    }
}

/// Run one receive interrupt per byte of `bytes`
pub fn deliver<const RX: usize, const TX: usize, M: RxObserver>(
    uart: &Uart<MockPort, RX, TX, M>,
    bytes: &[u8],
) {
    for &byte in bytes {
        uart.port().latch_rx(byte);
        uart.on_rx_complete(&IsrContext::for_test());
    }
}

/// Run transmit interrupts while the line is unmasked, at most `limit` times
///
/// Returns the number of bytes that reached the data register.
pub fn pump_tx<const RX: usize, const TX: usize, M: RxObserver>(
    uart: &Uart<MockPort, RX, TX, M>,
    limit: usize,
) -> usize {
    let before = uart.port().sent().len();
    let mut runs = 0;
    while runs < limit && uart.port().tx_interrupt_enabled() {
        uart.on_tx_ready(&IsrContext::for_test());
        runs += 1;
    }
    uart.port().sent().len() - before
}

std::thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
}

/// Port whose interrupts are played by another thread
#[derive(Default)]
pub struct SharedPort {
    rx_irq: AtomicBool,
    tx_irq: AtomicBool,
    rx_data: AtomicU8,
    rx_masks: AtomicUsize,
    tx_masks: AtomicUsize,
    // Held for the duration of one simulated handler
    gate: Mutex<()>,
    sent: Mutex<Vec<u8, 256>>,
}

impl SharedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreground masks of the receive line so far
    pub fn rx_mask_count(&self) -> usize {
        self.rx_masks.load(Ordering::SeqCst)
    }

    /// Foreground masks of the transmit line so far
    pub fn tx_mask_count(&self) -> usize {
        self.tx_masks.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> MutexGuard<'_, Vec<u8, 256>> {
        self.sent.lock().unwrap()
    }

    fn mask_line(&self, line: &AtomicBool, count: &AtomicUsize) {
        if IN_ISR.with(Cell::get) {
            line.store(false, Ordering::SeqCst);
        } else {
            let _gate = self.gate.lock().unwrap();
            line.store(false, Ordering::SeqCst);
            count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl SerialPort for SharedPort {
    // Line settings are not modelled
    fn set_baud(&self, _baudrate: u32) {}

    fn set_frame(&self, _data_bits: DataBits, _stop_bits: StopBits, _parity: Parity) {}

    fn enable(&self) {
        self.rx_irq.store(true, Ordering::SeqCst);
    }

    fn enable_tx_interrupt(&self) {
        self.tx_irq.store(true, Ordering::SeqCst);
    }

    fn disable_tx_interrupt(&self) {
        self.mask_line(&self.tx_irq, &self.tx_masks);
    }

    fn tx_interrupt_enabled(&self) -> bool {
        self.tx_irq.load(Ordering::SeqCst)
    }

    fn enable_rx_interrupt(&self) {
        self.rx_irq.store(true, Ordering::SeqCst);
    }

    fn disable_rx_interrupt(&self) {
        self.mask_line(&self.rx_irq, &self.rx_masks);
    }

    fn rx_interrupt_enabled(&self) -> bool {
        self.rx_irq.load(Ordering::SeqCst)
    }

    fn read_data(&self) -> u8 {
        self.rx_data.load(Ordering::SeqCst)
    }

    fn write_data(&self, byte: u8) {
        self.sent
            .lock()
            .unwrap()
            .push(byte)
            .expect("mock transmit log full");
    }
}

/// Play interrupts until `stop` is set
///
/// Each round runs the transmit handler if its line is unmasked, then feeds
/// the next byte of `incoming` if the receive line is unmasked.
pub fn run_interrupts<const RX: usize, const TX: usize, M: RxObserver>(
    uart: &Uart<SharedPort, RX, TX, M>,
    incoming: &[u8],
    stop: &AtomicBool,
) {
    let port = uart.port();
    let mut incoming = incoming.iter();
    while !stop.load(Ordering::SeqCst) {
        {
            let _gate = port.gate.lock().unwrap();
            IN_ISR.with(|flag| flag.set(true));
            if port.tx_interrupt_enabled() {
                uart.on_tx_ready(&IsrContext::for_test());
            }
            if port.rx_interrupt_enabled() {
                if let Some(&byte) = incoming.next() {
                    port.rx_data.store(byte, Ordering::SeqCst);
                    uart.on_rx_complete(&IsrContext::for_test());
                }
            }
            IN_ISR.with(|flag| flag.set(false));
        }
        thread::yield_now();
    }
}

/// Spin until `count` moves past `base`
pub fn wait_until_masked(count: impl Fn() -> usize, base: usize) {
    while count() == base {
        thread::yield_now();
    }
}
