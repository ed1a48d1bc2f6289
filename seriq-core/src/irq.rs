//! Interrupt-masking critical sections
//!
//! Foreground code and the UART interrupt handlers share the ring buffers
//! and the match table. Exclusion comes from masking the one interrupt line
//! that touches a piece of state, never from a general lock:
//!
//! - [`IrqMask`] masks a line for its lifetime and restores the previous
//!   enable state on drop, on every exit path.
//! - [`IrqCell`] only hands out its contents to a holder of an [`IrqMask`]
//!   for the same line, or to interrupt code holding an [`IsrContext`].
//!
//! The interrupt handlers of one UART never preempt each other, and the
//! foreground runs as a single execution context.

#![allow(unsafe_code)]

use core::cell::{RefCell, RefMut};
use core::marker::PhantomData;

use seriq_hal::SerialPort;

/// An interrupt line of the UART that guards shared state
pub trait Line {
    fn mask<P: SerialPort>(port: &P);
    fn unmask<P: SerialPort>(port: &P);
    fn is_unmasked<P: SerialPort>(port: &P) -> bool;
}

/// Receive-complete interrupt: guards the RX buffer and the match table
pub enum RxLine {}

/// Transmit-ready interrupt: guards the TX buffer
pub enum TxLine {}

impl Line for RxLine {
    fn mask<P: SerialPort>(port: &P) {
        port.disable_rx_interrupt();
    }

    fn unmask<P: SerialPort>(port: &P) {
        port.enable_rx_interrupt();
    }

    fn is_unmasked<P: SerialPort>(port: &P) -> bool {
        port.rx_interrupt_enabled()
    }
}

impl Line for TxLine {
    fn mask<P: SerialPort>(port: &P) {
        port.disable_tx_interrupt();
    }

    fn unmask<P: SerialPort>(port: &P) {
        port.enable_tx_interrupt();
    }

    fn is_unmasked<P: SerialPort>(port: &P) -> bool {
        port.tx_interrupt_enabled()
    }
}

/// Scoped mask of one interrupt line
///
/// Dropping the guard re-enables the line only if it was enabled when the
/// guard was created.
#[must_use = "the line is unmasked again as soon as the guard is dropped"]
pub struct IrqMask<'a, P: SerialPort, L: Line> {
    port: &'a P,
    was_unmasked: bool,
    _line: PhantomData<L>,
}

impl<'a, P: SerialPort, L: Line> IrqMask<'a, P, L> {
    /// Mask line `L` on `port`
    pub fn new(port: &'a P) -> Self {
        let was_unmasked = L::is_unmasked(port);
        L::mask(port);
        Self {
            port,
            was_unmasked,
            _line: PhantomData,
        }
    }
}

impl<P: SerialPort, L: Line> Drop for IrqMask<'_, P, L> {
    fn drop(&mut self) {
        if self.was_unmasked {
            L::unmask(self.port);
        }
    }
}

/// Proof of running inside a UART interrupt handler
pub struct IsrContext {
    _private: (),
}

impl IsrContext {
    /// # Safety
    ///
    /// Only create this at the entry of the UART's interrupt handler, and
    /// drop it before the handler returns. No other handler that touches the
    /// same transport may run while it exists.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Stand-in for an interrupt entry in host tests, where nothing preempts
    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        Self { _private: () }
    }
}

/// State shared between foreground code and the handler for line `L`
pub struct IrqCell<T, L: Line> {
    inner: RefCell<T>,
    _line: PhantomData<L>,
}

// SAFETY: every borrow requires either an `IrqMask` for line `L`, which keeps
// the only other accessor (the interrupt handler) from running, or an
// `IsrContext`, whose constructor promises the handler is not preempted by
// another accessor. The inner `RefCell` turns accidental re-entry into a
// panic instead of aliasing.
unsafe impl<T: Send, L: Line> Sync for IrqCell<T, L> {}

impl<T, L: Line> IrqCell<T, L> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
            _line: PhantomData,
        }
    }

    /// Foreground access while the line is masked
    pub fn lock<'a, P: SerialPort>(&'a self, _mask: &'a IrqMask<'_, P, L>) -> RefMut<'a, T> {
        self.inner.borrow_mut()
    }

    /// Interrupt-context access
    pub fn isr<'a>(&'a self, _cx: &'a IsrContext) -> RefMut<'a, T> {
        self.inner.borrow_mut()
    }
}
