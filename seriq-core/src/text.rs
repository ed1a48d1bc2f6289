//! Number-to-text conversion and terminal control sequences
//!
//! Small fixed buffers only, no `core::fmt` machinery on the hot path.

/// Carriage return + line feed
pub const NEWLINE: &[u8] = b"\r\n";

/// Cursor home followed by erase display
pub const CLEAR_SCREEN: &[u8] = b"\x1b[H\x1b[2J";

/// Most fractional digits [`FixedPoint`] will produce
pub const MAX_FRACTION_DIGITS: u8 = 4;

const POW10: [u32; MAX_FRACTION_DIGITS as usize + 1] = [1, 10, 100, 1000, 10000];

/// Decimal rendering of an integer
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    // Sign plus the ten digits of u32::MAX
    buf: [u8; 11],
    start: usize,
}

impl Decimal {
    pub fn unsigned(value: u32) -> Self {
        Self::render(value, false)
    }

    pub fn signed(value: i32) -> Self {
        Self::render(value.unsigned_abs(), value < 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    fn render(mut value: u32, negative: bool) -> Self {
        let mut buf = [0u8; 11];
        let mut start = buf.len();
        loop {
            start -= 1;
            buf[start] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        if negative {
            start -= 1;
            buf[start] = b'-';
        }
        Self { buf, start }
    }
}

/// Fixed-point rendering of a float with up to four truncated fraction digits
///
/// The integer part saturates at `u32::MAX`; NaN renders as zero.
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint {
    // Sign, ten integer digits, point, four fraction digits
    buf: [u8; 16],
    len: usize,
}

impl FixedPoint {
    pub fn new(value: f32, fraction_digits: u8) -> Self {
        let digits = fraction_digits.min(MAX_FRACTION_DIGITS) as usize;
        let mut buf = [0u8; 16];
        let mut len = 0;

        let negative = value < 0.0;
        let magnitude = if negative { -value } else { value };
        let integer = magnitude as u32;

        let fraction = if integer == u32::MAX {
            // Saturated: the remainder is meaningless
            0
        } else {
            let scaled = ((magnitude - integer as f32) * POW10[digits] as f32) as u32;
            // Rounding error in the subtraction can land exactly on the next power
            scaled.min(POW10[digits] - 1)
        };

        if negative && (integer != 0 || fraction != 0) {
            buf[len] = b'-';
            len += 1;
        }

        let integer = Decimal::unsigned(integer);
        let integer = integer.as_bytes();
        buf[len..len + integer.len()].copy_from_slice(integer);
        len += integer.len();

        if digits > 0 {
            buf[len] = b'.';
            len += 1;
            let mut rest = fraction;
            for slot in buf[len..len + digits].iter_mut().rev() {
                *slot = b'0' + (rest % 10) as u8;
                rest /= 10;
            }
            len += digits;
        }

        Self { buf, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}
