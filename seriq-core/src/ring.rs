//! Fixed-capacity circular byte buffer
//!
//! Backing storage for both directions of the transport. The capacity is a
//! const generic, chosen once at build time; buffers never grow or shrink.
//!
//! The buffer itself is plain data. Sharing it between an interrupt handler
//! and foreground code is the job of [`crate::irq::IrqCell`].

/// Circular FIFO of `N` bytes
///
/// Invariants: `len <= N`, both indices stay below `N`, and `len` equals the
/// number of pushes minus pops since the last reset (clamped to `N` by
/// [`push_overwrite`](Self::push_overwrite)).
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    /// Next slot to write
    write: usize,
    /// Next slot to read
    read: usize,
    len: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    const NON_EMPTY: () = assert!(N > 0, "ring buffer capacity must be non-zero");

    /// Create an empty buffer
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;
        Self {
            data: [0; N],
            write: 0,
            read: 0,
            len: 0,
        }
    }

    /// Total capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Number of bytes that can be pushed before the buffer is full
    pub fn free(&self) -> usize {
        N - self.len
    }

    /// Append a byte
    ///
    /// Returns `false` and leaves the buffer untouched when it is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.write] = byte;
        self.write = Self::next(self.write);
        self.len += 1;
        true
    }

    /// Append a byte, discarding the oldest one if the buffer is full
    ///
    /// Returns `true` if a byte was discarded.
    pub fn push_overwrite(&mut self, byte: u8) -> bool {
        let overwrite = self.is_full();
        if overwrite {
            self.read = Self::next(self.read);
            self.len -= 1;
        }
        self.data[self.write] = byte;
        self.write = Self::next(self.write);
        self.len += 1;
        overwrite
    }

    /// Remove and return the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.read];
        self.read = Self::next(self.read);
        self.len -= 1;
        Some(byte)
    }

    /// Return the oldest byte without removing it
    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.data[self.read])
        }
    }

    /// Copy the oldest bytes into `buf` without removing them
    ///
    /// Copies `min(buf.len(), self.len())` bytes and returns that count.
    pub fn peek_into(&self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.len);
        let mut index = self.read;
        for slot in &mut buf[..count] {
            *slot = self.data[index];
            index = Self::next(index);
        }
        count
    }

    /// Drop all contents
    pub fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
        self.len = 0;
    }

    #[inline]
    fn next(index: usize) -> usize {
        if index + 1 == N {
            0
        } else {
            index + 1
        }
    }
}
