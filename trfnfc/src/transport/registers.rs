// trfnfc/src/transport/registers.rs
//! TRF79x0 register map, direct commands and the SPI command byte layout.
//!
//! Command byte: bit7 = direct command, bit6 = read, bit5 = continuous,
//! bits 4..0 = register address or command code.

use derive_more::Display;

const CONTROL_CMD: u8 = 0x80;
const REG_READ: u8 = 0x40;
const REG_CONTINUOUS: u8 = 0x20;
const ADDRESS_MASK: u8 = 0x1F;

/// Register addresses 0x00..=0x1F.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    ChipStatusControl = 0x00,
    IsoControl = 0x01,
    Iso14443BOptions = 0x02,
    Iso14443AOptions = 0x03,
    TxTimerEpcHigh = 0x04,
    TxTimerEpcLow = 0x05,
    TxPulseLength = 0x06,
    RxNoResponseWait = 0x07,
    RxWaitTime = 0x08,
    ModulatorControl = 0x09,
    RxSpecialSettings = 0x0A,
    RegulatorControl = 0x0B,
    IrqStatus = 0x0C,
    IrqMask = 0x0D,
    CollisionPosition = 0x0E,
    RssiLevel = 0x0F,
    SpecialFunction1 = 0x10,
    SpecialFunction2 = 0x11,
    FifoIrqLevel = 0x14,
    NfcLowFieldLevel = 0x16,
    NfcId = 0x17,
    NfcTargetLevel = 0x18,
    NfcTargetProtocol = 0x19,
    TestSetting1 = 0x1A,
    TestSetting2 = 0x1B,
    FifoStatus = 0x1C,
    TxLength1 = 0x1D,
    TxLength2 = 0x1E,
    Fifo = 0x1F,
}

impl Register {
    const ALL: [Register; 29] = [
        Register::ChipStatusControl,
        Register::IsoControl,
        Register::Iso14443BOptions,
        Register::Iso14443AOptions,
        Register::TxTimerEpcHigh,
        Register::TxTimerEpcLow,
        Register::TxPulseLength,
        Register::RxNoResponseWait,
        Register::RxWaitTime,
        Register::ModulatorControl,
        Register::RxSpecialSettings,
        Register::RegulatorControl,
        Register::IrqStatus,
        Register::IrqMask,
        Register::CollisionPosition,
        Register::RssiLevel,
        Register::SpecialFunction1,
        Register::SpecialFunction2,
        Register::FifoIrqLevel,
        Register::NfcLowFieldLevel,
        Register::NfcId,
        Register::NfcTargetLevel,
        Register::NfcTargetProtocol,
        Register::TestSetting1,
        Register::TestSetting2,
        Register::FifoStatus,
        Register::TxLength1,
        Register::TxLength2,
        Register::Fifo,
    ];

    pub fn address(self) -> u8 {
        self as u8
    }

    pub fn from_address(address: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.address() == address)
    }

    /// Register reached by the chip's auto-increment during a continuous
    /// access. The FIFO and the multi-byte NFC ID register do not advance.
    pub fn next(self) -> Self {
        if matches!(self, Register::Fifo | Register::NfcId) {
            return self;
        }
        let mut addr = self.address() + 1;
        while addr <= ADDRESS_MASK {
            if let Some(r) = Self::from_address(addr) {
                return r;
            }
            addr += 1;
        }
        Register::Fifo
    }

    pub fn write_byte(self) -> u8 {
        self.address() & ADDRESS_MASK
    }

    pub fn read_byte(self) -> u8 {
        REG_READ | (self.address() & ADDRESS_MASK)
    }

    pub fn write_continuous_byte(self) -> u8 {
        REG_CONTINUOUS | self.write_byte()
    }

    pub fn read_continuous_byte(self) -> u8 {
        REG_CONTINUOUS | self.read_byte()
    }
}

/// Direct commands (command byte bit7 set).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectCommand {
    Idle = 0x00,
    SoftInit = 0x03,
    InitialRfCollisionAvoid = 0x04,
    ResponseRfCollisionAvoid = 0x05,
    ResponseRfCollisionAvoidN0 = 0x06,
    ResetFifo = 0x0F,
    TransmitNoCrc = 0x10,
    TransmitCrc = 0x11,
    DelayTransmitNoCrc = 0x12,
    DelayTransmitCrc = 0x13,
    TransmitNextSlot = 0x14,
    CloseSlotSequence = 0x15,
    StopDecoders = 0x16,
    RunDecoders = 0x17,
    TestInternalRf = 0x18,
    TestExternalRf = 0x19,
    RxAdjustGain = 0x1A,
}

impl DirectCommand {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn command_byte(self) -> u8 {
        CONTROL_CMD | (self.code() & ADDRESS_MASK)
    }

    /// Transmit command matching the CRC option.
    pub fn transmit(crc: bool) -> Self {
        if crc {
            DirectCommand::TransmitCrc
        } else {
            DirectCommand::TransmitNoCrc
        }
    }
}
