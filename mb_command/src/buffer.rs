//! Command stream buffer.
//!
//! Fixed-capacity FIFO of not-yet-executed wire bytes. The external fill
//! loop checks [`CommandBuffer::remaining_capacity`] before every push; the
//! command loop checks [`CommandBuffer::len`] against the opcode's required
//! length before every pop. Handlers never pop speculatively: a command is
//! either consumed whole or left untouched for the next tick.
//!
//! A command longer than the buffer can never be buffered whole. It is
//! dropped with [`CommandBuffer::discard`], which also swallows the part
//! of it the host has not sent yet.

use heapless::Deque;
use mb_common::consts::COMMAND_BUFFER_SIZE;
use static_assertions::const_assert;

const_assert!(COMMAND_BUFFER_SIZE.is_power_of_two());

/// Byte FIFO sized for the target board.
#[derive(Debug, Clone)]
pub struct CommandBuffer<const N: usize = COMMAND_BUFFER_SIZE> {
    bytes: Deque<u8, N>,
    /// Bytes still to be thrown away as they arrive.
    discard_pending: usize,
}

impl<const N: usize> Default for CommandBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CommandBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
            discard_pending: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        N - self.bytes.len()
    }

    /// Bytes of a discarded command the host has yet to send.
    #[inline]
    pub const fn discard_pending(&self) -> usize {
        self.discard_pending
    }

    /// Append one byte. Returns the byte back if the buffer is full.
    /// Bytes owed to a [`discard`](Self::discard) are accepted and dropped.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        if self.discard_pending > 0 {
            self.discard_pending -= 1;
            return Ok(());
        }
        self.bytes.push_back(byte)
    }

    /// Byte at `index` from the front, without consuming it.
    #[inline]
    pub fn peek(&self, index: usize) -> Option<u8> {
        self.bytes.iter().nth(index).copied()
    }

    /// Little-endian `u16` starting at `index`, without consuming it.
    pub fn peek_u16(&self, index: usize) -> Option<u16> {
        Some(u16::from_le_bytes([self.peek(index)?, self.peek(index + 1)?]))
    }

    /// Position of the first NUL at or after `from`.
    pub fn find_nul(&self, from: usize) -> Option<usize> {
        self.bytes
            .iter()
            .skip(from)
            .position(|&b| b == 0)
            .map(|p| p + from)
    }

    /// Remove one byte.
    ///
    /// Callers verify `len()` first; popping an empty buffer yields 0 and
    /// is a caller bug.
    #[inline]
    pub fn pop8(&mut self) -> u8 {
        debug_assert!(!self.bytes.is_empty(), "pop8 on empty command buffer");
        self.bytes.pop_front().unwrap_or(0)
    }

    #[inline]
    pub fn pop16(&mut self) -> u16 {
        let lo = self.pop8();
        let hi = self.pop8();
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub fn pop32(&mut self) -> u32 {
        let b0 = self.pop8();
        let b1 = self.pop8();
        let b2 = self.pop8();
        let b3 = self.pop8();
        u32::from_le_bytes([b0, b1, b2, b3])
    }

    #[inline]
    pub fn pop_i16(&mut self) -> i16 {
        self.pop16() as i16
    }

    #[inline]
    pub fn pop_i32(&mut self) -> i32 {
        self.pop32() as i32
    }

    #[inline]
    pub fn pop_f32(&mut self) -> f32 {
        f32::from_bits(self.pop32())
    }

    /// Drop `count` bytes from the front.
    pub fn skip(&mut self, count: usize) {
        for _ in 0..count.min(self.bytes.len()) {
            self.bytes.pop_front();
        }
    }

    /// Drop `count` bytes from the front, including any that have not
    /// arrived yet.
    pub fn discard(&mut self, count: usize) {
        let have = count.min(self.bytes.len());
        self.skip(have);
        self.discard_pending = count - have;
    }

    /// Discard everything buffered.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.discard_pending = 0;
    }
}
