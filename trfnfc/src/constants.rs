// trfnfc/src/constants.rs
//! Compile-time configuration and shared protocol constants.

/// Maximum number of bytes the TRF79x0 FIFO accepts in one write.
pub const FIFO_CHUNK_MAX: usize = 127;

/// Size of the receive FIFO mirror filled by the IRQ handler.
pub const RX_BUFFER_SIZE: usize = 255;

/// First FIFO chunk written by the reader transmit path; the rest is
/// refilled from the FIFO-level interrupt.
pub const TX_FIRST_CHUNK: usize = 12;

/// Chip id read back from the modulator register after soft init.
pub const TRF7970_DEFAULT_ID: u8 = 0x91;

/// Reader transceive TX/RX completion timeout.
pub const RX_TIMEOUT_MS: u64 = 10;
/// Card-emulation Type A FIFO refill poll interval.
pub const FIFO_REFILL_POLL_TYPE_A_MS: u64 = 10;
/// FIFO refill poll interval for every other mode.
pub const FIFO_REFILL_POLL_MS: u64 = 100;
/// Delay after switching the RF field on or off.
pub const RF_SETTLE_MS: u64 = 5;
/// Guard time after enabling the initiator field.
pub const INITIATOR_GUARD_MS: u64 = 30;

/// Initiator wait for SENSF_RES.
pub const SENSF_TIMEOUT_MS: u64 = 20;
/// Target poll window while waiting for activation.
pub const TARGET_POLL_TIMEOUT_MS: u64 = 495;
/// ATR/PSL response window, also the target DEP_REQ window.
pub const ATR_TIMEOUT_MS: u64 = 1000;

// ISO control register values
pub const ISO_CONTROL_RX_CRC_N: u8 = 0x80;
pub const ISO_CONTROL_DIR_MODE: u8 = 0x40;
pub const ISO_CONTROL_14443A_106K: u8 = 0x08;
pub const ISO_CONTROL_14443B_106K: u8 = 0x0C;
pub const ISO_CONTROL_15693_HIGH_1SUB_1OUT4: u8 = 0x02;

// Chip status control bits
pub const STATUS_CTRL_DIRECT: u8 = 0x40;
pub const STATUS_CTRL_RF_ON: u8 = 0x20;
pub const STATUS_CTRL_RF_PWR_FULL: u8 = 0x00;
pub const STATUS_CTRL_5V_OPERATION: u8 = 0x01;

// Modulator control
pub const MOD_CTRL_SYS_CLK_6_78MHZ: u8 = 0x20;
pub const MOD_CTRL_MOD_OOK_100: u8 = 0x01;
pub const MOD_CTRL_MOD_ASK_10: u8 = 0x00;

pub const RX_SP_SET_M848: u8 = 0x20;
pub const REGULATOR_CTRL_AUTO_REG: u8 = 0x80;
pub const REGULATOR_CTRL_VRS_2_8V: u8 = 0x01;

/// ISO14443A cascade tag.
pub const CASCADE_TAG: u8 = 0x88;

/// LLCP magic number carried in ATR_REQ/ATR_RES general bytes.
pub const LLCP_MAGIC: [u8; 3] = [0x46, 0x66, 0x6D];
/// Largest LLCP information unit this stack accepts.
pub const LLCP_MIU_MAX: u16 = 248;
/// Default LLCP MIU before negotiation.
pub const LLCP_MIU_DEFAULT: u16 = 128;
/// MIUX value advertised in TLVs.
pub const LLCP_MIUX_ADVERTISED: u8 = 120;

/// SNEP protocol version 1.0.
pub const SNEP_VERSION: u8 = 0x10;
/// Largest SNEP object accepted from a peer.
pub const SNEP_MAX_PAYLOAD: u32 = 20000;
/// Largest SNEP fragment size.
pub const SNEP_MAX_BUFFER: u16 = 248;
/// Request/response header length.
pub const SNEP_HEADER_LEN: usize = 6;

/// NDEF type and ID fields are clamped to this size.
pub const NDEF_TYPE_MAXSIZE: usize = 10;
pub const NDEF_ID_MAXSIZE: usize = 10;
/// Text record language codes are clamped to this size.
pub const NDEF_LANG_MAXSIZE: usize = 5;

/// ISO15693 found-card table capacity.
pub const ISO15693_MAX_CARDS: usize = 16;

/// BLE companion link: UART receive ring size.
pub const HCI_RING_SIZE: usize = 128;
/// BLE companion link: smallest complete event frame.
pub const HCI_MIN_FRAME_LEN: usize = 7;
/// BLE companion link: discovered device slots.
pub const BLE_MAX_SLAVES: usize = 3;
