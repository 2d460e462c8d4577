// trfnfc/src/device/irq.rs

use derive_more::Display;

/// Raw bits of the IRQ status register (0x0C).
pub mod flags {
    pub const COLLISION_ERROR: u8 = 0x01;
    pub const COLLISION_AVOID_FINISHED: u8 = 0x02;
    pub const RF_FIELD_CHANGE: u8 = 0x04;
    pub const SDD_COMPLETE: u8 = 0x08;
    pub const PROTOCOL_ERROR: u8 = 0x10;
    pub const FIFO_HIGH_OR_LOW: u8 = 0x20;
    pub const RX_COMPLETE: u8 = 0x40;
    pub const TX_COMPLETE: u8 = 0x80;
}

/// Coarse classification of one interrupt, as returned by the IRQ handler.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IrqStatus {
    #[default]
    Idle,
    CollisionError,
    CollisionAvoidFinished,
    RfFieldChange,
    SddComplete,
    ProtocolError,
    FifoHighOrLow,
    RxComplete,
    TxComplete,
    Timeout,
}

impl IrqStatus {
    /// Register encoding; `Timeout` has no register bit and maps to 0xFF.
    pub fn bits(self) -> u8 {
        match self {
            IrqStatus::Idle => 0x00,
            IrqStatus::CollisionError => flags::COLLISION_ERROR,
            IrqStatus::CollisionAvoidFinished => flags::COLLISION_AVOID_FINISHED,
            IrqStatus::RfFieldChange => flags::RF_FIELD_CHANGE,
            IrqStatus::SddComplete => flags::SDD_COMPLETE,
            IrqStatus::ProtocolError => flags::PROTOCOL_ERROR,
            IrqStatus::FifoHighOrLow => flags::FIFO_HIGH_OR_LOW,
            IrqStatus::RxComplete => flags::RX_COMPLETE,
            IrqStatus::TxComplete => flags::TX_COMPLETE,
            IrqStatus::Timeout => 0xFF,
        }
    }
}
