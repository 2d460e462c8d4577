// trfnfc/src/transport/link.rs
//! Frame-level seams between the transceiver driver and the protocol
//! engines. Reader engines use [`Transceiver`]; the peer-to-peer and
//! card-emulation layers use [`FrameLink`].

use crate::Result;
use crate::device::irq::IrqStatus;
use crate::device::mode::{Frequency, TrfMode};
use crate::transport::registers::{DirectCommand, Register};

/// CRC handling for one reader exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrcMode {
    /// Append CRC on transmit.
    pub tx: bool,
    /// Check and strip CRC on receive.
    pub rx: bool,
}

impl CrcMode {
    pub const NONE: Self = Self { tx: false, rx: false };
    pub const BOTH: Self = Self { tx: true, rx: true };
}

/// Bytes received for one exchange plus the collision position reported by
/// the transceiver, in NVB format (`0x20 + bytes << 4 + bits`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RxFrame {
    pub bytes: Vec<u8>,
    pub collision: Option<u8>,
}

impl RxFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            collision: None,
        }
    }

    pub fn with_collision(bytes: Vec<u8>, position: u8) -> Self {
        Self {
            bytes,
            collision: Some(position),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Half-duplex reader exchange used by the ISO14443/15693 engines.
pub trait Transceiver {
    /// Send `tx` and collect up to `rx_capacity` response bytes.
    ///
    /// `tx_bits` is the number of valid bits in the last byte of `tx`
    /// (0 = all eight). An empty response is not an error: callers treat it
    /// as "no card".
    fn transceive(
        &mut self,
        tx: &[u8],
        tx_bits: u8,
        rx_capacity: usize,
        crc: CrcMode,
    ) -> Result<RxFrame>;

    /// Wait once more for a response without transmitting.
    fn receive(&mut self, rx_capacity: usize) -> Result<RxFrame>;

    fn write_register(&mut self, reg: Register, value: u8) -> Result<()>;

    fn read_register(&mut self, reg: Register) -> Result<u8>;

    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()>;

    fn delay_ms(&mut self, ms: u64);

    /// Close the current ISO15693 slot and listen in the next one.
    fn next_slot(&mut self, rx_capacity: usize) -> Result<RxFrame> {
        self.direct_command(DirectCommand::StopDecoders)?;
        self.direct_command(DirectCommand::RunDecoders)?;
        self.direct_command(DirectCommand::ResetFifo)?;
        self.direct_command(DirectCommand::TransmitNextSlot)?;
        self.receive(rx_capacity)
    }
}

/// Interrupt-driven frame exchange used by NFC-F, NFC-DEP and card
/// emulation. Received frames start with their own length byte.
pub trait FrameLink {
    /// Program the transceiver for `mode` at `frequency`.
    fn init_for_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()>;

    /// Switch bit rate without re-initialising.
    fn set_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()>;

    fn disable_transmitter(&mut self) -> Result<()>;

    /// Write a whole frame to the FIFO and wait for the end of transmission.
    fn write_frame(&mut self, frame: &[u8], crc: bool) -> Result<()>;

    /// Wait for the next interrupt and classify it.
    fn wait_event(&mut self, timeout_ms: u64) -> Result<IrqStatus>;

    /// The most recently received frame.
    fn received(&self) -> &[u8];
}
