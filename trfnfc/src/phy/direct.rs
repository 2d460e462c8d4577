// trfnfc/src/phy/direct.rs

use derive_more::Display;
use log::{debug, trace};

use crate::constants::{ISO_CONTROL_DIR_MODE, STATUS_CTRL_DIRECT};
use crate::transport::link::Transceiver;
use crate::transport::registers::{DirectCommand, Register};
use crate::utils::units_to_hex;
use crate::{Error, Result};

use super::decoder::{DirectFrame, ManchesterDecoder};
use super::hal::{DirectModeHal, with_interrupts_disabled};
use super::sequence::{DirectFormat, encode_frame};

/// Polls of the edge detector while waiting for the first subcarrier edge.
pub const RECEIVE_TIMEOUT_SPINS: u32 = 30_000;

/// Direct mode flavour selected in the ISO control register.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectKind {
    /// Raw subcarrier on the RX pin, no framing by the chip.
    #[default]
    Mode0,
    /// Bit stream with the chip's own framing.
    Mode1,
}

/// ISO14443-A bit-banging PHY used when the native framer has to be
/// bypassed, e.g. for frames with custom parity or bit lengths.
///
/// While enabled, no other TRF79x0 access may happen: the SPI session stays
/// open and the chip's IRQ is unusable.
pub struct DirectMode<H: DirectModeHal> {
    hal: H,
    enabled: bool,
}

impl<H: DirectModeHal> DirectMode<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn into_inner(self) -> H {
        self.hal
    }

    /// Enter direct mode. Does nothing when already enabled.
    pub fn enable<T: Transceiver + ?Sized>(&mut self, trf: &mut T, kind: DirectKind) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let status = trf.read_register(Register::ChipStatusControl)?;
        let iso = trf.read_register(Register::IsoControl)?;
        let iso = match kind {
            DirectKind::Mode0 => iso & !ISO_CONTROL_DIR_MODE,
            DirectKind::Mode1 => iso | ISO_CONTROL_DIR_MODE,
        };
        trf.write_register(Register::IsoControl, iso)?;

        // the write below is never terminated; `disable` closes it
        self.hal.open_session(status | STATUS_CTRL_DIRECT)?;
        self.enabled = true;
        debug!("direct mode {} enabled", kind);
        Ok(())
    }

    /// Leave direct mode. Does nothing when not enabled.
    ///
    /// The TRF7960 receive path is unreliable after direct mode, so the chip
    /// is soft-initialised and left configured for ISO14443-A with the field
    /// on.
    pub fn disable<T: Transceiver + ?Sized>(&mut self, trf: &mut T) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        with_interrupts_disabled(&mut self.hal, |hal| -> Result<()> {
            hal.close_session()?;
            trf.direct_command(DirectCommand::ResetFifo)
        })?;
        self.enabled = false;

        trf.direct_command(DirectCommand::SoftInit)?;
        crate::reader::iso14443a::setup_registers(trf)?;
        crate::reader::power_on(trf)?;
        debug!("direct mode disabled");
        Ok(())
    }

    /// Send `tx` and listen for the answer, with interrupts masked for the
    /// whole exchange.
    ///
    /// `tx_bits` is the number of valid bits of the last unit (0 = whole
    /// unit). `rx_capacity` is the receive buffer size in units. A card that
    /// does not answer yields an empty frame.
    pub fn transceive(
        &mut self,
        format: DirectFormat,
        tx: &[u16],
        tx_bits: u8,
        rx_capacity: usize,
    ) -> Result<DirectFrame> {
        if !self.enabled {
            return Err(Error::InvalidState("direct mode not enabled"));
        }

        let (full, tail) = match (tx_bits, tx.split_last()) {
            (0, _) | (_, None) => (tx, None),
            (bits, Some((last, rest))) => (rest, Some((*last, bits))),
        };
        trace!("direct tx {} (+{} bits)", units_to_hex(full), tx_bits);

        let frame = with_interrupts_disabled(&mut self.hal, |hal| {
            send(hal, format, full, tail);
            receive(hal, format, rx_capacity)
        });

        if !frame.is_empty() {
            trace!(
                "direct rx {} (+{} bits)",
                units_to_hex(&frame.units),
                frame.tail_bits
            );
        }
        Ok(frame)
    }
}

fn send<H: DirectModeHal>(
    hal: &mut H,
    format: DirectFormat,
    units: &[u16],
    tail: Option<(u16, u8)>,
) {
    hal.set_modulation(false);
    hal.start_quarter_timer();
    for seq in encode_frame(format.send, units, tail) {
        seq.play(hal);
    }
    hal.stop_quarter_timer();
}

fn receive<H: DirectModeHal>(hal: &mut H, format: DirectFormat, rx_capacity: usize) -> DirectFrame {
    let mut dec = ManchesterDecoder::new(format.recv, rx_capacity);
    if dec.is_done() {
        return dec.finish();
    }

    // the line idles low until the card starts answering
    hal.clear_rx_edge();
    let mut spins = RECEIVE_TIMEOUT_SPINS;
    while !hal.rx_edge() && spins > 0 {
        spins -= 1;
    }

    hal.start_eighth_timer();
    hal.clear_rx_edge();
    loop {
        hal.wait_eighth_bit();
        let sample = hal.rx_edge();
        hal.clear_rx_edge();
        if !dec.feed(sample) {
            break;
        }
    }
    hal.stop_eighth_timer();
    dec.finish()
}
