// trfnfc/src/p2p/emulation.rs
//! Type 4A / Type 4B card emulation: target register programming and the
//! ATQB answer sent in Type 4B mode.

use log::debug;

use crate::constants::{
    MOD_CTRL_MOD_OOK_100, REGULATOR_CTRL_AUTO_REG, REGULATOR_CTRL_VRS_2_8V,
    STATUS_CTRL_5V_OPERATION, STATUS_CTRL_RF_ON,
};
use crate::transport::link::{CrcMode, Transceiver};
use crate::transport::registers::{DirectCommand, Register};
use crate::transport::traits::RegisterBus;
use crate::types::{Atqb, Pupi};
use crate::Result;

/// NFCID1 loaded for Type 4A emulation when the caller sets none.
pub const TYPE4A_DEFAULT_NFCID: [u8; 4] = [0x08, 0x12, 0x34, 0x56];
/// PUPI loaded for Type 4B emulation when the caller sets none.
pub const TYPE4B_DEFAULT_PUPI: [u8; 4] = [0x80, 0x12, 0x34, 0x56];

const ISO_CONTROL_CE_TYPE_A: u8 = 0x24;
const ISO_CONTROL_CE_TYPE_B: u8 = 0x25;

fn start_target<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    bus.direct_command(DirectCommand::SoftInit)?;
    bus.direct_command(DirectCommand::Idle)
}

fn run_target<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    bus.write_register(
        Register::ChipStatusControl,
        STATUS_CTRL_RF_ON | STATUS_CTRL_5V_OPERATION,
    )?;
    bus.direct_command(DirectCommand::ResetFifo)?;
    bus.direct_command(DirectCommand::StopDecoders)?;
    bus.direct_command(DirectCommand::RunDecoders)
}

/// Program the transceiver as an ISO14443-4 Type A target answering with
/// the 4-byte `nfcid`.
pub fn setup_type4a<B: RegisterBus + ?Sized>(bus: &mut B, nfcid: &[u8; 4]) -> Result<()> {
    start_target(bus)?;
    bus.write_register(Register::ModulatorControl, MOD_CTRL_MOD_OOK_100)?;
    bus.write_register(Register::IsoControl, ISO_CONTROL_CE_TYPE_A)?;
    bus.write_register(Register::RegulatorControl, REGULATOR_CTRL_AUTO_REG)?;
    bus.write_register(Register::RxSpecialSettings, 0x30)?;
    bus.write_register(Register::NfcTargetLevel, 0x27)?;
    bus.write_continuous(Register::NfcId, nfcid)?;
    bus.write_register(Register::NfcLowFieldLevel, 0x83)?;
    bus.write_register(Register::Iso14443BOptions, 0x01)?;
    bus.write_register(Register::Iso14443AOptions, 0x00)?;
    bus.write_register(Register::TestSetting1, 0x40)?;
    run_target(bus)?;
    bus.delay_ms(2);
    debug!("type 4a emulation with nfcid {}", crate::utils::bytes_to_hex(nfcid));
    Ok(())
}

/// Program the transceiver as an ISO14443-4 Type B target with `pupi`.
pub fn setup_type4b<B: RegisterBus + ?Sized>(bus: &mut B, pupi: &[u8; 4]) -> Result<()> {
    start_target(bus)?;
    bus.write_register(Register::ModulatorControl, MOD_CTRL_MOD_OOK_100)?;
    bus.write_register(Register::IsoControl, ISO_CONTROL_CE_TYPE_B)?;
    bus.write_register(Register::RegulatorControl, REGULATOR_CTRL_VRS_2_8V)?;
    bus.write_register(Register::RxSpecialSettings, 0x3C)?;
    bus.write_register(Register::NfcTargetLevel, 0x07)?;
    bus.write_continuous(Register::NfcId, pupi)?;
    bus.write_register(Register::NfcLowFieldLevel, 0x03)?;
    bus.write_register(Register::Iso14443BOptions, 0x00)?;
    run_target(bus)?;
    debug!("type 4b emulation with pupi {}", crate::utils::bytes_to_hex(pupi));
    Ok(())
}

/// Protocol fields of the ATQB sent by an emulated Type 4B card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtqbParams {
    pub afi: u8,
    pub bit_rate: u8,
    /// Maximum frame size code (FSCI).
    pub max_frame_size: u8,
    pub protocol_type: u8,
    /// Frame waiting time integer.
    pub fwi: u8,
    pub adc: u8,
    pub fo: u8,
}

impl Default for AtqbParams {
    fn default() -> Self {
        Self {
            afi: 0x00,
            bit_rate: 0x00,
            max_frame_size: 0x08,
            protocol_type: 0x01,
            fwi: 0x07,
            adc: 0x00,
            fo: 0x01,
        }
    }
}

impl AtqbParams {
    /// `50 PUPI[4] AFI E2 AF 11 BR FS|PT FWI|ADC|FO`
    pub fn encode(&self, pupi: &Pupi) -> [u8; 12] {
        let mut atqb = [0u8; 12];
        atqb[0] = Atqb::CODE;
        atqb[1..5].copy_from_slice(pupi.as_bytes());
        atqb[5] = self.afi;
        atqb[6..9].copy_from_slice(&[0xE2, 0xAF, 0x11]);
        atqb[9] = self.bit_rate;
        atqb[10] = (self.max_frame_size & 0x0F) << 4 | (self.protocol_type & 0x0F);
        atqb[11] = (self.fwi & 0x0F) << 4 | (self.adc & 0x03) << 2 | (self.fo & 0x03);
        atqb
    }
}

/// Answer a REQB/WUPB. The transceiver appends the CRC; no reply is
/// awaited.
pub fn send_atqb<T: Transceiver + ?Sized>(
    trf: &mut T,
    pupi: &Pupi,
    params: &AtqbParams,
) -> Result<()> {
    trf.transceive(&params.encode(pupi), 0, 0, CrcMode { tx: true, rx: false })?;
    Ok(())
}
