//! UART port abstraction
//!
//! [`SerialPort`] is the small register-level surface the interrupt-driven
//! transport consumes: line setup, two interrupt enables, and the data
//! register. Everything takes `&self` because the same port is shared by the
//! foreground code and the interrupt handlers.

use core::fmt;

/// Baud rate used when a configuration asks for 0
pub const DEFAULT_BAUDRATE: u32 = 9600;

/// Register-level access to one UART peripheral
///
/// The interrupt toggles must be idempotent. They double as the critical
/// section primitive of the transport, so they have to take effect before
/// the call returns.
pub trait SerialPort {
    /// Program the baud rate divisor
    fn set_baud(&self, baudrate: u32);

    /// Program character size, stop bits and parity
    fn set_frame(&self, data_bits: DataBits, stop_bits: StopBits, parity: Parity);

    /// Enable the transmitter, the receiver and the receive-complete interrupt
    fn enable(&self);

    /// Unmask the "transmit data register empty" interrupt
    fn enable_tx_interrupt(&self);

    /// Mask the "transmit data register empty" interrupt
    fn disable_tx_interrupt(&self);

    /// Whether the transmit interrupt is currently unmasked
    fn tx_interrupt_enabled(&self) -> bool;

    /// Unmask the "receive complete" interrupt
    fn enable_rx_interrupt(&self);

    /// Mask the "receive complete" interrupt
    fn disable_rx_interrupt(&self);

    /// Whether the receive interrupt is currently unmasked
    fn rx_interrupt_enabled(&self) -> bool;

    /// Read the received byte. Only called from the receive interrupt.
    fn read_data(&self) -> u8;

    /// Load a byte for transmission. Only called from the transmit interrupt.
    fn write_data(&self, byte: u8);
}

/// UART line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UartConfig {
    /// Baud rate in bits per second, 0 selects [`DEFAULT_BAUDRATE`]
    pub baudrate: u32,
    /// Number of data bits per character
    pub data_bits: DataBits,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Parity mode
    pub parity: Parity,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl UartConfig {
    /// Baud rate to program, with 0 replaced by the default
    pub fn effective_baudrate(&self) -> u32 {
        if self.baudrate == 0 {
            DEFAULT_BAUDRATE
        } else {
            self.baudrate
        }
    }
}

/// Invalid line configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Character size outside 5..=9
    InvalidDataBits(u8),
    /// Stop bits other than 1 or 2
    InvalidStopBits(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDataBits(n) => write!(f, "data bits must be 5-9, got {}", n),
            ConfigError::InvalidStopBits(n) => write!(f, "stop bits must be 1 or 2, got {}", n),
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
    Nine,
}

impl DataBits {
    /// Character size in bits
    pub const fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            9 => Ok(DataBits::Nine),
            other => Err(ConfigError::InvalidDataBits(other)),
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    /// Stop bit count
    pub const fn count(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = ConfigError;

    fn try_from(count: u8) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(ConfigError::InvalidStopBits(other)),
        }
    }
}
