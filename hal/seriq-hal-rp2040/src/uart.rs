//! PL011 UART port
//!
//! RP2040 has two PL011 UARTs (UART0 and UART1). [`UartPort`] drives one of
//! them with the FIFOs disabled, so every byte raises its own receive
//! interrupt and the transmit interrupt stays asserted while the holding
//! register is empty, the same one-byte-at-a-time model the transport's
//! handlers expect.
//!
//! Register access goes through the PAC that `embassy-rp` re-exports. The
//! port keeps no state of its own beyond which UART it is, so it can live in
//! a `static` and be shared by foreground code and the interrupt handler.

use embassy_rp::interrupt::Interrupt;
use embassy_rp::pac;
use seriq_hal::{DataBits, Parity, SerialPort, StopBits, DEFAULT_BAUDRATE};

/// GPIO function select value for UART
const FUNCSEL_UART: u8 = 2;

/// UART peripheral identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartId {
    Uart0,
    Uart1,
}

impl UartId {
    /// NVIC line shared by all events of this UART
    pub fn interrupt(self) -> Interrupt {
        match self {
            UartId::Uart0 => Interrupt::UART0_IRQ,
            UartId::Uart1 => Interrupt::UART1_IRQ,
        }
    }
}

/// Role of a GPIO pin within a UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    Tx,
    Rx,
}

/// Determine which UART, and in which role, can use a given GPIO pin
///
/// Pins that only carry CTS/RTS return `None`; flow control is not used.
pub fn gpio_to_uart(gpio: u8) -> Option<(UartId, PinRole)> {
    // UART0: GPIO 0/1, 12/13, 16/17, 28/29
    // UART1: GPIO 4/5, 8/9, 20/21, 24/25
    let id = match gpio {
        0 | 1 | 12 | 13 | 16 | 17 | 28 | 29 => UartId::Uart0,
        4 | 5 | 8 | 9 | 20 | 21 | 24 | 25 => UartId::Uart1,
        _ => return None,
    };
    let role = if gpio % 2 == 0 { PinRole::Tx } else { PinRole::Rx };
    Some((id, role))
}

/// Pin assignment rejected by [`UartPort::power_up`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// GPIO cannot be the TX pin of this UART
    NotTx(u8),
    /// GPIO cannot be the RX pin of this UART
    NotRx(u8),
}

/// Interrupt causes currently asserted and unmasked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartEvents {
    /// A received byte is waiting in the data register
    pub rx: bool,
    /// The transmit holding register is empty
    pub tx: bool,
}

/// [`SerialPort`] over one RP2040 UART
///
/// The caller must own the matching `embassy_rp` UART and pin peripherals
/// and never hand them to another driver.
pub struct UartPort {
    id: UartId,
}

impl UartPort {
    pub const fn new(id: UartId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> UartId {
        self.id
    }

    /// Take the UART out of reset and route `tx`/`rx` to it
    ///
    /// Must run before any [`SerialPort`] call; the registers do not respond
    /// while the block is held in reset.
    pub fn power_up(&self, tx: u8, rx: u8) -> Result<(), PinError> {
        if gpio_to_uart(tx) != Some((self.id, PinRole::Tx)) {
            return Err(PinError::NotTx(tx));
        }
        if gpio_to_uart(rx) != Some((self.id, PinRole::Rx)) {
            return Err(PinError::NotRx(rx));
        }

        let resets = pac::RESETS;
        resets.reset().modify(|w| match self.id {
            UartId::Uart0 => w.set_uart0(false),
            UartId::Uart1 => w.set_uart1(false),
        });
        while !self.out_of_reset() {}

        pac::IO_BANK0
            .gpio(tx as usize)
            .ctrl()
            .write(|w| w.set_funcsel(FUNCSEL_UART));
        pac::IO_BANK0
            .gpio(rx as usize)
            .ctrl()
            .write(|w| w.set_funcsel(FUNCSEL_UART));
        pac::PADS_BANK0.gpio(rx as usize).modify(|w| w.set_ie(true));
        Ok(())
    }

    /// Which unmasked events are pending, for routing in the interrupt handler
    pub fn pending(&self) -> UartEvents {
        let mis = self.regs().uartmis().read();
        UartEvents {
            rx: mis.rxmis(),
            tx: mis.txmis(),
        }
    }

    fn out_of_reset(&self) -> bool {
        let done = pac::RESETS.reset_done().read();
        match self.id {
            UartId::Uart0 => done.uart0(),
            UartId::Uart1 => done.uart1(),
        }
    }

    fn regs(&self) -> pac::uart::Uart {
        match self.id {
            UartId::Uart0 => pac::UART0,
            UartId::Uart1 => pac::UART1,
        }
    }
}

// IMSC updates below are read-modify-write. The interrupt handler only ever
// clears TXIM, so a foreground write racing it can at worst leave TXIM set on
// an empty buffer; the next transmit interrupt finds nothing and clears it.
impl SerialPort for UartPort {
    fn set_baud(&self, baudrate: u32) {
        let (ibrd, fbrd) = baud_divisor(embassy_rp::clocks::clk_peri_freq(), baudrate);
        let r = self.regs();
        r.uartibrd().write(|w| w.set_baud_divint(ibrd));
        r.uartfbrd().write(|w| w.set_baud_divfrac(fbrd));
        // Divisors only latch on an LCR_H write
        r.uartlcr_h().modify(|_| {});
    }

    fn set_frame(&self, data_bits: DataBits, stop_bits: StopBits, parity: Parity) {
        let wlen = word_length(data_bits).unwrap_or_else(|| {
            #[cfg(feature = "defmt")]
            defmt::warn!("PL011 has no {} bit mode, using 8", data_bits.bits());
            word_length(DataBits::Eight).unwrap_or(0b11)
        });
        self.regs().uartlcr_h().write(|w| {
            w.set_wlen(wlen);
            w.set_stp2(stop_bits == StopBits::Two);
            w.set_pen(parity != Parity::None);
            w.set_eps(parity == Parity::Even);
            w.set_fen(false);
        });
    }

    fn enable(&self) {
        let r = self.regs();
        r.uartcr().write(|w| {
            w.set_uarten(true);
            w.set_txe(true);
            w.set_rxe(true);
        });
        self.enable_rx_interrupt();
    }

    fn enable_tx_interrupt(&self) {
        self.regs().uartimsc().modify(|w| w.set_txim(true));
    }

    fn disable_tx_interrupt(&self) {
        self.regs().uartimsc().modify(|w| w.set_txim(false));
    }

    fn tx_interrupt_enabled(&self) -> bool {
        self.regs().uartimsc().read().txim()
    }

    fn enable_rx_interrupt(&self) {
        self.regs().uartimsc().modify(|w| w.set_rxim(true));
    }

    fn disable_rx_interrupt(&self) {
        self.regs().uartimsc().modify(|w| w.set_rxim(false));
    }

    fn rx_interrupt_enabled(&self) -> bool {
        self.regs().uartimsc().read().rxim()
    }

    fn read_data(&self) -> u8 {
        // Reading DR clears the receive interrupt
        self.regs().uartdr().read().data()
    }

    fn write_data(&self, byte: u8) {
        // Writing DR clears the transmit interrupt
        self.regs().uartdr().write(|w| w.set_data(byte));
    }
}

/// Integer and fractional baud divisors for `baudrate` at `clk_peri` Hz
///
/// Same rounding as the Pico SDK; out-of-range rates clamp to the slowest
/// or fastest divisor. A rate of 0 selects [`DEFAULT_BAUDRATE`].
fn baud_divisor(clk_peri: u32, baudrate: u32) -> (u16, u8) {
    let baudrate = if baudrate == 0 {
        DEFAULT_BAUDRATE
    } else {
        baudrate
    };
    let div = 8 * u64::from(clk_peri) / u64::from(baudrate);
    let ibrd = div >> 7;
    if ibrd == 0 {
        (1, 0)
    } else if ibrd >= 0xffff {
        (0xffff, 0)
    } else {
        (ibrd as u16, (((div & 0x7f) + 1) / 2) as u8)
    }
}

/// LCR_H.WLEN encoding, `None` for sizes the PL011 cannot frame
fn word_length(data_bits: DataBits) -> Option<u8> {
    match data_bits {
        DataBits::Five => Some(0b00),
        DataBits::Six => Some(0b01),
        DataBits::Seven => Some(0b10),
        DataBits::Eight => Some(0b11),
        DataBits::Nine => None,
    }
}
