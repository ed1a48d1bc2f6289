//! Buffered, interrupt-driven UART transport
//!
//! This crate contains everything between the application and the
//! [`SerialPort`](seriq_hal::SerialPort) of a chip crate:
//!
//! - Fixed-capacity ring buffers for both directions
//! - Interrupt-mask critical sections for state shared with the handlers
//! - Blocking and non-blocking send/receive, numeric text senders
//! - Pattern matching on received bytes with deferred handler dispatch
//! - `core::fmt` and `embedded-io` adapters
//!
//! Nothing here allocates. Capacities are const generics fixed at build time.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod irq;
pub mod matcher;
pub mod ring;
pub mod stream;
pub mod text;
pub mod uart;

#[cfg(test)]
mod mock;

pub use irq::IsrContext;
pub use matcher::{MatchError, MatchHandler, MatchTable};
pub use ring::RingBuffer;
pub use stream::Stream;
pub use uart::{RxObserver, Uart};

/// Receive buffer size used when a board has no reason to pick another
pub const DEFAULT_RX_CAPACITY: usize = 64;

/// Transmit buffer size used when a board has no reason to pick another
pub const DEFAULT_TX_CAPACITY: usize = 64;

/// Pattern slots in a default match table
pub const DEFAULT_MAX_PATTERNS: usize = 8;

/// Longest pattern a default match table stores
pub const DEFAULT_MAX_SEQ_LEN: usize = 8;

/// Transport with the default buffer sizes and no pattern matching
pub type DefaultUart<P> = Uart<P, DEFAULT_RX_CAPACITY, DEFAULT_TX_CAPACITY>;

/// Transport with the default buffer sizes and a default match table
pub type DefaultMatchingUart<P, C> = Uart<
    P,
    DEFAULT_RX_CAPACITY,
    DEFAULT_TX_CAPACITY,
    MatchTable<C, DEFAULT_MAX_PATTERNS, DEFAULT_MAX_SEQ_LEN>,
>;
