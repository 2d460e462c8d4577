// trfnfc/src/hci/ring.rs
//! Receive ring for bytes arriving from the BLE module's UART.
//!
//! Indices wrap at the capacity and `count` tracks the fill level, so
//! `count % capacity == (write - read) mod capacity` at all times. Bytes
//! pushed into a full ring are dropped and reported.

use log::warn;

use crate::constants::{HCI_MIN_FRAME_LEN, HCI_RING_SIZE};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxRing {
    buf: [u8; HCI_RING_SIZE],
    read: usize,
    write: usize,
    count: usize,
}

impl Default for RxRing {
    fn default() -> Self {
        Self::new()
    }
}

impl RxRing {
    pub const CAPACITY: usize = HCI_RING_SIZE;

    pub fn new() -> Self {
        Self {
            buf: [0; HCI_RING_SIZE],
            read: 0,
            write: 0,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == Self::CAPACITY
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.is_full() {
            warn!("hci rx ring full, byte {:#04x} dropped", byte);
            return Err(Error::CapacityExceeded {
                capacity: Self::CAPACITY,
            });
        }
        self.buf[self.write] = byte;
        self.write = (self.write + 1) % Self::CAPACITY;
        self.count += 1;
        Ok(())
    }

    /// Push as many bytes as fit; returns how many were taken.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&b| self.push(b).is_ok()).count()
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let b = self.buf[self.read];
        self.read = (self.read + 1) % Self::CAPACITY;
        self.count -= 1;
        Some(b)
    }

    /// Byte `offset` positions after the read index, without consuming.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        (offset < self.count).then(|| self.buf[(self.read + offset) % Self::CAPACITY])
    }

    /// Take one whole HCI message out of the ring once it is buffered:
    /// at least the minimum frame length and `3 + length` bytes in total.
    pub fn message_complete(&mut self) -> Option<Vec<u8>> {
        if self.count < HCI_MIN_FRAME_LEN {
            return None;
        }
        let len = 3 + self.peek(2)? as usize;
        if self.count < len {
            return None;
        }
        Some((0..len).filter_map(|_| self.pop()).collect())
    }
}
