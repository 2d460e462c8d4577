// trfnfc/src/reader/mod.rs
//! Reader personalities: ISO14443-A/B card discovery, ISO14443-4 activation
//! and ISO15693 inventory. Every engine works on any [`Transceiver`].

pub mod anticol;
pub mod iso14443_4;
pub mod iso14443a;
#[cfg(feature = "iso14443b")]
pub mod iso14443b;
#[cfg(feature = "iso15693")]
pub mod iso15693;

use crate::Result;
use crate::constants::{RF_SETTLE_MS, STATUS_CTRL_RF_ON};
use crate::transport::link::Transceiver;
use crate::transport::registers::Register;

pub use anticol::AnticolState;
pub use iso14443a::{Iso14443a, Selection, WakeCommand};

/// Switch the RF field on and wait for cards to power up.
pub fn power_on<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    let status = trf.read_register(Register::ChipStatusControl)?;
    trf.write_register(Register::ChipStatusControl, status | STATUS_CTRL_RF_ON)?;
    trf.delay_ms(RF_SETTLE_MS);
    Ok(())
}

/// Switch the RF field off.
pub fn power_off<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    let status = trf.read_register(Register::ChipStatusControl)?;
    trf.write_register(Register::ChipStatusControl, status & !STATUS_CTRL_RF_ON)?;
    trf.delay_ms(RF_SETTLE_MS);
    Ok(())
}

/// Shared 106 kbit/s register setup of both ISO14443 flavours.
pub(crate) fn setup_iso14443<T: Transceiver + ?Sized>(
    trf: &mut T,
    iso_control: u8,
    modulator: u8,
) -> Result<()> {
    use crate::constants::{REGULATOR_CTRL_AUTO_REG, RX_SP_SET_M848};

    trf.write_register(Register::IsoControl, iso_control)?;
    trf.write_register(Register::TxPulseLength, 0x20)?;
    trf.write_register(Register::RxNoResponseWait, 0x0E)?;
    trf.write_register(Register::RxWaitTime, 0x07)?;
    trf.write_register(Register::ModulatorControl, modulator)?;
    let rx = trf.read_register(Register::RxSpecialSettings)?;
    trf.write_register(Register::RxSpecialSettings, (rx & 0x0F) | RX_SP_SET_M848)?;
    trf.write_register(Register::TestSetting1, 0x20)?;
    trf.write_register(Register::RegulatorControl, REGULATOR_CTRL_AUTO_REG)?;
    Ok(())
}
