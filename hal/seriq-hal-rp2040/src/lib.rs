//! RP2040-specific serial port adapter
//!
//! Implements [`seriq_hal::SerialPort`] directly on the PL011 registers so
//! the transport in `seriq-core` owns buffering and interrupt handling:
//!
//! - UART peripheral identification and GPIO pin mapping
//! - Reset release and pin routing
//! - Baud divisor and frame format programming
//! - Interrupt mask and status access

#![no_std]
#![deny(unsafe_code)]

pub mod uart;

pub use uart::{gpio_to_uart, PinError, PinRole, UartEvents, UartId, UartPort};
