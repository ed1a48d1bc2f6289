//! Seriq Hardware Abstraction Layer
//!
//! This crate defines the contract between the buffered UART transport in
//! `seriq-core` and the chip that actually moves the bits. A chip crate
//! implements [`SerialPort`] on top of its registers; the transport never
//! touches hardware any other way.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (seriq-firmware, etc.)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  seriq-core (buffers, matching, API)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  seriq-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!            ┌─────────────────┐
//!            │ seriq-hal-rp2040│
//!            └─────────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod uart;

pub use uart::{ConfigError, DataBits, Parity, SerialPort, StopBits, UartConfig, DEFAULT_BAUDRATE};
