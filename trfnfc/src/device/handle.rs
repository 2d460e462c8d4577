// trfnfc/src/device/handle.rs

use std::marker::PhantomData;

use log::{debug, trace, warn};

use crate::constants::{
    FIFO_CHUNK_MAX, FIFO_REFILL_POLL_MS, FIFO_REFILL_POLL_TYPE_A_MS, INITIATOR_GUARD_MS,
    ISO_CONTROL_RX_CRC_N, RX_BUFFER_SIZE, RX_TIMEOUT_MS, STATUS_CTRL_5V_OPERATION,
    STATUS_CTRL_RF_ON, TRF7970_DEFAULT_ID, TX_FIRST_CHUNK,
};
use crate::device::irq::{IrqStatus, flags};
use crate::device::mode::{Frequency, TrfMode};
use crate::transport::link::{CrcMode, FrameLink, RxFrame, Transceiver};
use crate::transport::registers::{DirectCommand, Register};
use crate::transport::traits::RegisterBus;
use crate::utils::bytes_to_hex_spaced;
use crate::{Error, Result};

/// Type-state markers
pub struct Uninitialized;
pub struct Initialized;

/// Soft-init attempts before BOARD_INIT gives up on the chip id.
const BOARD_INIT_ATTEMPTS: usize = 10;

/// Consecutive idle IRQ waits tolerated while a FIFO write is in flight.
const TX_WAIT_ROUNDS: usize = 10;

/// Bit 1 of the IRQ status register flags a collision in reader modes.
const READER_COLLISION: u8 = flags::COLLISION_AVOID_FINISHED;

/// TRF79x0 driver handle. Initialization state is enforced at compile time.
pub struct Trf79x0<State = Uninitialized> {
    bus: Box<dyn RegisterBus>,
    mode: TrfMode,
    frequency: Frequency,
    rx: Vec<u8>,
    collision: Option<u8>,
    emulation_id: Option<[u8; 4]>,
    chip_id: u8,
    _state: PhantomData<State>,
}

impl<S> Trf79x0<S> {
    fn into_state<T>(self) -> Trf79x0<T> {
        Trf79x0 {
            bus: self.bus,
            mode: self.mode,
            frequency: self.frequency,
            rx: self.rx,
            collision: self.collision,
            emulation_id: self.emulation_id,
            chip_id: self.chip_id,
            _state: PhantomData,
        }
    }

    pub fn mode(&self) -> TrfMode {
        self.mode
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Modulator register value read back during `initialize`.
    pub fn chip_id(&self) -> u8 {
        self.chip_id
    }
}

impl Trf79x0<Uninitialized> {
    /// Create a driver from an existing bus. Tests usually pass a
    /// `MockBus` or `SharedBus`.
    pub fn new_with_bus(bus: Box<dyn RegisterBus>) -> Self {
        Self {
            bus,
            mode: TrfMode::BoardInit,
            frequency: Frequency::Standby,
            rx: Vec::with_capacity(RX_BUFFER_SIZE),
            collision: None,
            emulation_id: None,
            chip_id: 0,
            _state: PhantomData,
        }
    }

    /// NFC ID loaded by the card-emulation setups instead of the defaults.
    pub fn with_emulation_id(mut self, id: [u8; 4]) -> Self {
        self.emulation_id = Some(id);
        self
    }

    /// Soft init, chip id read-back and RX timeout IRQ enable.
    pub fn initialize(self) -> Result<Trf79x0<Initialized>> {
        let mut this = self;
        this.bus.delay_ms(2);
        this.bus.direct_command(DirectCommand::SoftInit)?;
        this.bus.direct_command(DirectCommand::Idle)?;

        this.chip_id = this.bus.read_register(Register::ModulatorControl)?;
        debug!("TRF79x0 modulator read-back {:#04x}", this.chip_id);
        this.bus.write_register(Register::ModulatorControl, 0x01)?;

        let mask = this.bus.read_register(Register::IrqMask)?;
        this.bus.write_register(Register::IrqMask, mask | 0x01)?;
        this.bus.delay_ms(4);

        Ok(this.into_state())
    }
}

impl Trf79x0<Initialized> {
    /// Program the transceiver for `mode` at `frequency`.
    ///
    /// The initiator personality refuses to start while an external field
    /// is present and returns [`Error::ExternalField`].
    pub fn init_for_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        self.mode = mode;
        self.frequency = frequency;
        debug!("init for {} at {}", mode, frequency);

        match mode {
            TrfMode::BoardInit => self.board_init(),
            TrfMode::P2pInitiator => self.initiator_init(frequency),
            TrfMode::P2pPassiveTarget | TrfMode::P2pActiveTarget => self.target_init(frequency),
            TrfMode::CardEmulationTypeA | TrfMode::CardEmulationTypeB => {
                self.card_emulation_init(mode)
            }
        }
    }

    fn board_init(&mut self) -> Result<()> {
        let mut attempts = 0;
        loop {
            self.bus.direct_command(DirectCommand::SoftInit)?;
            self.bus.direct_command(DirectCommand::Idle)?;
            self.bus.delay_ms(1);
            let id = self.bus.read_register(Register::ModulatorControl)?;
            if id == TRF7970_DEFAULT_ID {
                break;
            }
            attempts += 1;
            if attempts >= BOARD_INIT_ATTEMPTS {
                warn!("chip id {:#04x} after {} soft inits", id, attempts);
                return Err(Error::DeviceNotFound);
            }
        }

        self.bus.write_register(Register::ModulatorControl, 0x00)?;
        self.bus.write_register(Register::RegulatorControl, 0x87)?;
        self.bus.direct_command(DirectCommand::ResetFifo)?;
        self.bus
            .write_register(Register::ChipStatusControl, STATUS_CTRL_5V_OPERATION)?;
        self.bus.write_register(Register::IrqMask, 0x3E)?;
        // RX high 96 bytes, TX low 32 bytes
        self.bus.write_register(Register::FifoIrqLevel, 0x0F)?;
        Ok(())
    }

    fn initiator_init(&mut self, frequency: Frequency) -> Result<()> {
        self.bus.direct_command(DirectCommand::SoftInit)?;
        self.bus.direct_command(DirectCommand::Idle)?;
        self.bus
            .write_register(Register::ChipStatusControl, 0x02 | STATUS_CTRL_5V_OPERATION)?;

        self.bus.direct_command(DirectCommand::TestExternalRf)?;
        let rssi = self.bus.read_register(Register::RssiLevel)?;
        if rssi & 0x3F != 0 {
            self.bus
                .write_register(Register::ChipStatusControl, STATUS_CTRL_5V_OPERATION)?;
            debug!("external field present (rssi={:#04x}), initiator disabled", rssi);
            return Err(Error::ExternalField { rssi });
        }

        self.bus.write_register(Register::ModulatorControl, 0x00)?;
        self.bus.write_register(Register::RegulatorControl, 0x01)?;
        self.bus.write_register(Register::FifoIrqLevel, 0x0F)?;
        if let Some(iso) = frequency.initiator_setup_iso_control() {
            self.bus.write_register(Register::IsoControl, iso)?;
        }
        self.bus.write_register(Register::RxSpecialSettings, 0x2F)?;
        self.bus.write_register(Register::NfcLowFieldLevel, 0x83)?;
        self.bus.write_register(
            Register::ChipStatusControl,
            STATUS_CTRL_RF_ON | STATUS_CTRL_5V_OPERATION,
        )?;
        self.bus.delay_ms(INITIATOR_GUARD_MS);
        Ok(())
    }

    fn target_init(&mut self, frequency: Frequency) -> Result<()> {
        self.bus.direct_command(DirectCommand::SoftInit)?;
        self.bus.direct_command(DirectCommand::Idle)?;
        self.bus.direct_command(DirectCommand::StopDecoders)?;

        if let Some(iso) = frequency.target_iso_control() {
            self.bus.write_register(Register::IsoControl, iso)?;
        }
        self.bus.write_register(Register::ModulatorControl, 0x00)?;
        self.bus.write_register(Register::RegulatorControl, 0x01)?;
        self.bus.write_register(Register::FifoIrqLevel, 0x0F)?;
        self.bus.write_register(Register::NfcLowFieldLevel, 0x83)?;
        self.bus.write_register(Register::NfcTargetLevel, 0x07)?;
        self.bus.write_register(
            Register::ChipStatusControl,
            STATUS_CTRL_RF_ON | STATUS_CTRL_5V_OPERATION,
        )?;

        // clear stale IRQ and collision state
        let mut stale = [0u8; 2];
        self.bus.read_continuous(Register::IrqStatus, &mut stale)?;
        self.bus.direct_command(DirectCommand::RunDecoders)?;
        Ok(())
    }

    #[cfg(feature = "p2p")]
    fn card_emulation_init(&mut self, mode: TrfMode) -> Result<()> {
        use crate::p2p::emulation;

        if mode == TrfMode::CardEmulationTypeA {
            let id = self.emulation_id.unwrap_or(emulation::TYPE4A_DEFAULT_NFCID);
            emulation::setup_type4a(&mut *self.bus, &id)
        } else {
            let id = self.emulation_id.unwrap_or(emulation::TYPE4B_DEFAULT_PUPI);
            emulation::setup_type4b(&mut *self.bus, &id)
        }
    }

    #[cfg(not(feature = "p2p"))]
    fn card_emulation_init(&mut self, mode: TrfMode) -> Result<()> {
        Err(Error::UnsupportedOperation(format!(
            "{} needs the p2p feature",
            mode
        )))
    }

    /// Switch bit rate for the current P2P role without re-initialising.
    pub fn set_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        self.mode = mode;
        self.frequency = frequency;
        let iso = match mode {
            TrfMode::P2pPassiveTarget => frequency.target_iso_control(),
            TrfMode::P2pInitiator => frequency.initiator_iso_control(),
            _ => None,
        };
        if let Some(iso) = iso {
            self.bus.write_register(Register::IsoControl, iso)?;
        }
        Ok(())
    }

    pub fn disable_transmitter(&mut self) -> Result<()> {
        self.bus
            .write_register(Register::ChipStatusControl, STATUS_CTRL_5V_OPERATION)?;
        self.bus.direct_command(DirectCommand::ResetFifo)
    }

    pub fn reset_decoders(&mut self) -> Result<()> {
        self.bus.direct_command(DirectCommand::StopDecoders)?;
        self.bus.direct_command(DirectCommand::RunDecoders)
    }

    /// The 255-byte receive mirror filled by the IRQ handler.
    pub fn received(&self) -> &[u8] {
        &self.rx
    }

    /// Collision position of the last reader exchange, in NVB format.
    pub fn collision_position(&self) -> Option<u8> {
        self.collision
    }

    fn reinit(&mut self) {
        if let Err(e) = self.init_for_mode(self.mode, self.frequency) {
            warn!("re-init after irq error failed: {}", e);
        }
    }

    fn accepts_target_protocol(&self, protocol: u8) -> bool {
        match self.mode {
            TrfMode::CardEmulationTypeA => protocol == 0xC9,
            TrfMode::CardEmulationTypeB => protocol == 0xC5,
            TrfMode::P2pPassiveTarget | TrfMode::P2pActiveTarget => {
                self.frequency.target_protocol() == Some(protocol)
            }
            TrfMode::P2pInitiator => true,
            TrfMode::BoardInit => false,
        }
    }

    /// Wait up to `timeout_ms` for an interrupt and classify it. Received
    /// bytes land in [`received`](Self::received).
    pub fn irq_handler(&mut self, timeout_ms: u64) -> Result<IrqStatus> {
        let fired = self.bus.irq_pending()? || self.bus.wait_irq(timeout_ms)?;
        if !fired {
            return Ok(IrqStatus::Timeout);
        }

        let mut protocol = [0u8; 2];
        self.bus
            .read_continuous(Register::NfcTargetProtocol, &mut protocol)?;
        let mut irq = [0u8; 2];
        self.bus.read_continuous(Register::IrqStatus, &mut irq)?;
        let status = irq[0];
        trace!("irq {:#04x} target protocol {:#04x}", status, protocol[0]);
        #[cfg(feature = "diagnostics")]
        trace!(
            "irq regs {} / protocol regs {}",
            bytes_to_hex_spaced(&irq),
            bytes_to_hex_spaced(&protocol)
        );

        if status & flags::FIFO_HIGH_OR_LOW != 0 {
            if status & flags::RX_COMPLETE != 0 {
                self.drain_fifo()?;
                return Ok(IrqStatus::RxComplete);
            }
            if status & flags::TX_COMPLETE != 0 {
                return Ok(IrqStatus::FifoHighOrLow);
            }
            return Ok(IrqStatus::Idle);
        }

        if status == flags::RX_COMPLETE {
            let level = (self.bus.read_register(Register::FifoStatus)? & 0x7F) as usize;
            if level == 0 {
                self.reinit();
                return Ok(IrqStatus::Idle);
            }
            self.rx.clear();
            self.rx.resize(level, 0);
            self.bus.read_continuous(Register::Fifo, &mut self.rx)?;
            trace!("rx {}", bytes_to_hex_spaced(&self.rx));

            if self.accepts_target_protocol(protocol[0]) {
                if matches!(self.mode, TrfMode::P2pInitiator | TrfMode::P2pPassiveTarget) {
                    // TR0 guard before the reply
                    self.bus.delay_ms(1);
                }
                return Ok(IrqStatus::RxComplete);
            }
            debug!(
                "target protocol {:#04x} does not match {}, re-init",
                protocol[0], self.mode
            );
            self.reinit();
            return Ok(IrqStatus::Idle);
        }

        if status & flags::COLLISION_AVOID_FINISHED != 0 {
            return Ok(IrqStatus::CollisionAvoidFinished);
        }

        if status & flags::RX_COMPLETE != 0 {
            if status & flags::TX_COMPLETE != 0 {
                // 0xC0 in initiator mode, nothing to do
            } else if status & flags::PROTOCOL_ERROR != 0 {
                self.reinit();
            } else {
                self.bus.read_register(Register::FifoStatus)?;
                self.bus.direct_command(DirectCommand::ResetFifo)?;
            }
            return Ok(IrqStatus::Idle);
        }

        if status & (flags::PROTOCOL_ERROR | flags::COLLISION_ERROR) != 0 {
            warn!("transceiver protocol error (irq={:#04x})", status);
            self.reinit();
            return Ok(IrqStatus::ProtocolError);
        }

        if status & flags::TX_COMPLETE != 0 {
            self.bus.direct_command(DirectCommand::ResetFifo)?;
            return Ok(IrqStatus::TxComplete);
        }

        if status & flags::RF_FIELD_CHANGE != 0 {
            return Ok(IrqStatus::RfFieldChange);
        }

        Ok(IrqStatus::Idle)
    }

    fn drain_fifo(&mut self) -> Result<()> {
        self.rx.clear();
        let mut level = self.bus.read_register(Register::FifoStatus)? & 0x7F;

        while level > 0 && self.rx.len() < RX_BUFFER_SIZE {
            let start = self.rx.len();
            let n = (level as usize).min(RX_BUFFER_SIZE - start);
            self.rx.resize(start + n, 0);
            self.bus.read_continuous(Register::Fifo, &mut self.rx[start..])?;

            if self.mode.tracks_frame_length() {
                if self.rx[0] as usize == self.rx.len() {
                    break;
                }
                // poll again shortly so the FIFO cannot overflow
                self.bus.wait_irq(1)?;
            }

            let mut irq = [0u8; 2];
            self.bus.read_continuous(Register::IrqStatus, &mut irq)?;
            level = self.bus.read_register(Register::FifoStatus)? & 0x7F;
        }

        trace!("rx {}", bytes_to_hex_spaced(&self.rx));
        Ok(())
    }

    fn write_packet(&mut self, chunk: &[u8], crc: bool, total: usize, header: bool) -> Result<()> {
        if header {
            self.bus.direct_command(DirectCommand::ResetFifo)?;
            self.bus.direct_command(DirectCommand::transmit(crc))?;
            let mut buf = Vec::with_capacity(chunk.len() + 2);
            buf.push((total >> 4) as u8);
            buf.push(((total & 0x0F) << 4) as u8);
            buf.extend_from_slice(chunk);
            self.bus.write_continuous(Register::TxLength1, &buf)
        } else {
            self.bus.write_continuous(Register::Fifo, chunk)
        }
    }

    /// Write a whole frame, refilling the FIFO from FIFO-level interrupts
    /// until the chip reports the end of transmission.
    pub fn write_fifo(&mut self, frame: &[u8], crc: bool) -> Result<()> {
        if frame.len() > RX_BUFFER_SIZE {
            return Err(Error::InvalidLength {
                expected: RX_BUFFER_SIZE,
                actual: frame.len(),
            });
        }
        trace!("tx {}", bytes_to_hex_spaced(frame));

        if self.mode == TrfMode::P2pActiveTarget {
            if let Some(iso) = self.frequency.initiator_iso_control() {
                self.bus.write_register(Register::IsoControl, iso)?;
            }
        }

        if self.bus.irq_pending()? {
            let mut irq = [0u8; 2];
            self.bus.read_continuous(Register::IrqStatus, &mut irq)?;
        }

        let total = frame.len();
        let first = total.min(FIFO_CHUNK_MAX);
        self.write_packet(&frame[..first], crc, total, true)?;
        let mut sent = first;

        let poll = if self.mode == TrfMode::CardEmulationTypeA {
            FIFO_REFILL_POLL_TYPE_A_MS
        } else {
            FIFO_REFILL_POLL_MS
        };

        let mut idle_rounds = 0;
        loop {
            match self.irq_handler(poll)? {
                IrqStatus::ProtocolError => return Err(Error::TransceiverProtocol),
                IrqStatus::TxComplete => {
                    if self.mode == TrfMode::P2pActiveTarget {
                        if let Some(iso) = self.frequency.target_iso_control() {
                            self.bus.write_register(Register::IsoControl, iso)?;
                        }
                    }
                    return Ok(());
                }
                IrqStatus::FifoHighOrLow | IrqStatus::Timeout if sent < total => {
                    let level = (self.bus.read_register(Register::FifoStatus)? & 0x7F) as usize;
                    let n = (total - sent).min(FIFO_CHUNK_MAX.saturating_sub(level));
                    self.write_packet(&frame[sent..sent + n], crc, total, false)?;
                    sent += n;
                    idle_rounds = 0;
                }
                _ => {
                    idle_rounds += 1;
                    if idle_rounds >= TX_WAIT_ROUNDS {
                        warn!("no tx complete after {} waits", idle_rounds);
                        return Err(Error::Timeout);
                    }
                }
            }
        }
    }

    fn read_response(&mut self, rx_capacity: usize) -> Result<RxFrame> {
        let mut bytes = Vec::new();
        loop {
            if !self.bus.wait_irq(RX_TIMEOUT_MS)? {
                break;
            }
            let status = self.bus.read_register(Register::IrqStatus)?;

            if status & READER_COLLISION != 0 {
                let pos = self.bus.read_register(Register::CollisionPosition)?;
                self.collision = Some(pos);
            }

            if status & (flags::RX_COMPLETE | flags::FIFO_HIGH_OR_LOW | READER_COLLISION) != 0 {
                let level = (self.bus.read_register(Register::FifoStatus)? & 0x7F) as usize;
                let n = level.min(rx_capacity.saturating_sub(bytes.len()));
                if n > 0 {
                    let start = bytes.len();
                    bytes.resize(start + n, 0);
                    self.bus.read_continuous(Register::Fifo, &mut bytes[start..])?;
                }
            }

            if status & (flags::RX_COMPLETE | READER_COLLISION) != 0 || bytes.len() >= rx_capacity {
                break;
            }
            if status & (flags::FIFO_HIGH_OR_LOW | flags::TX_COMPLETE) != 0 {
                continue;
            }
            if status & flags::PROTOCOL_ERROR != 0 {
                debug!("reader rx protocol error (irq={:#04x})", status);
            }
            break;
        }

        if !bytes.is_empty() {
            trace!("rx {}", bytes_to_hex_spaced(&bytes));
        }
        Ok(RxFrame {
            bytes,
            collision: self.collision,
        })
    }
}

impl Transceiver for Trf79x0<Initialized> {
    fn transceive(
        &mut self,
        tx: &[u8],
        tx_bits: u8,
        rx_capacity: usize,
        crc: CrcMode,
    ) -> Result<RxFrame> {
        let iso = self.bus.read_register(Register::IsoControl)?;
        let iso = if crc.rx {
            iso & !ISO_CONTROL_RX_CRC_N
        } else {
            iso | ISO_CONTROL_RX_CRC_N
        };
        self.bus.write_register(Register::IsoControl, iso)?;

        self.bus.direct_command(DirectCommand::ResetFifo)?;
        self.bus.direct_command(DirectCommand::transmit(crc.tx))?;
        self.collision = None;

        let bits = tx_bits & 0x07;
        let full = if bits > 0 {
            tx.len().saturating_sub(1)
        } else {
            tx.len()
        };
        let mut len_low = ((full & 0x0F) << 4) as u8;
        if bits > 0 {
            len_low |= (bits << 1) | 1;
        }
        let first = tx.len().min(TX_FIRST_CHUNK);
        let mut buf = Vec::with_capacity(first + 2);
        buf.push((full >> 4) as u8);
        buf.push(len_low);
        buf.extend_from_slice(&tx[..first]);
        self.bus.write_continuous(Register::TxLength1, &buf)?;
        trace!("tx {} ({} bits)", bytes_to_hex_spaced(tx), bits);

        let mut sent = first;
        loop {
            if !self.bus.wait_irq(RX_TIMEOUT_MS)? {
                debug!("no tx end interrupt");
                break;
            }
            let status = self.bus.read_register(Register::IrqStatus)?;
            if status & flags::FIFO_HIGH_OR_LOW != 0 {
                if sent < tx.len() {
                    let level = (self.bus.read_register(Register::FifoStatus)? & 0x7F) as usize;
                    let n = (tx.len() - sent).min(FIFO_CHUNK_MAX.saturating_sub(level));
                    self.bus
                        .write_continuous(Register::Fifo, &tx[sent..sent + n])?;
                    sent += n;
                }
                continue;
            }
            if status & flags::TX_COMPLETE == 0 {
                debug!("unexpected irq {:#04x} while transmitting", status);
            }
            break;
        }

        let frame = if rx_capacity > 0 {
            self.read_response(rx_capacity)?
        } else {
            RxFrame::default()
        };
        self.bus.direct_command(DirectCommand::ResetFifo)?;
        Ok(frame)
    }

    fn receive(&mut self, rx_capacity: usize) -> Result<RxFrame> {
        self.collision = None;
        let frame = self.read_response(rx_capacity)?;
        self.bus.direct_command(DirectCommand::ResetFifo)?;
        Ok(frame)
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.bus.write_register(reg, value)
    }

    fn read_register(&mut self, reg: Register) -> Result<u8> {
        self.bus.read_register(reg)
    }

    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()> {
        self.bus.direct_command(cmd)
    }

    fn delay_ms(&mut self, ms: u64) {
        self.bus.delay_ms(ms)
    }
}

impl FrameLink for Trf79x0<Initialized> {
    fn init_for_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        Trf79x0::init_for_mode(self, mode, frequency)
    }

    fn set_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        Trf79x0::set_mode(self, mode, frequency)
    }

    fn disable_transmitter(&mut self) -> Result<()> {
        Trf79x0::disable_transmitter(self)
    }

    fn write_frame(&mut self, frame: &[u8], crc: bool) -> Result<()> {
        self.write_fifo(frame, crc)
    }

    fn wait_event(&mut self, timeout_ms: u64) -> Result<IrqStatus> {
        self.irq_handler(timeout_ms)
    }

    fn received(&self) -> &[u8] {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{BusOp, IrqEvent, SharedBus};

    fn device(bus: &SharedBus) -> Trf79x0<Initialized> {
        Trf79x0::new_with_bus(bus.boxed()).initialize().unwrap()
    }

    fn soft_inits(bus: &SharedBus) -> usize {
        bus.borrow()
            .commands()
            .iter()
            .filter(|c| **c == DirectCommand::SoftInit)
            .count()
    }

    #[test]
    fn initialize_reads_chip_id_and_enables_rx_timeout_irq() {
        let bus = SharedBus::new();
        let dev = device(&bus);
        assert_eq!(dev.chip_id(), 0x91);
        let b = bus.borrow();
        assert_eq!(b.register(Register::ModulatorControl), 0x01);
        assert_eq!(b.register(Register::IrqMask), 0x3F);
        assert_eq!(b.commands()[..2], [DirectCommand::SoftInit, DirectCommand::Idle]);
    }

    #[test]
    fn reset_decoders_stops_then_runs() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.reset_decoders().unwrap();
        let b = bus.borrow();
        let cmds = b.commands();
        assert_eq!(
            cmds[cmds.len() - 2..],
            [DirectCommand::StopDecoders, DirectCommand::RunDecoders]
        );
    }

    #[test]
    fn board_init_programs_defaults() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::BoardInit, Frequency::Standby)
            .unwrap();
        let b = bus.borrow();
        assert_eq!(b.register(Register::RegulatorControl), 0x87);
        assert_eq!(b.register(Register::IrqMask), 0x3E);
        assert_eq!(b.register(Register::FifoIrqLevel), 0x0F);
        assert_eq!(b.register(Register::ModulatorControl), 0x00);
    }

    #[test]
    fn board_init_gives_up_without_chip() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().chip_id = 0x00;
        let err = dev
            .init_for_mode(TrfMode::BoardInit, Frequency::Standby)
            .unwrap_err();
        assert_eq!(err, Error::DeviceNotFound);
        assert_eq!(soft_inits(&bus), 1 + BOARD_INIT_ATTEMPTS);
    }

    #[test]
    fn initiator_refuses_external_field() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().set_register(Register::RssiLevel, 0x45);
        let err = dev
            .init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps212)
            .unwrap_err();
        assert_eq!(err, Error::ExternalField { rssi: 0x45 });
        let b = bus.borrow();
        assert_eq!(b.register(Register::ChipStatusControl), 0x01);
        assert!(b.commands().contains(&DirectCommand::TestExternalRf));
    }

    #[test]
    fn initiator_setup_sequence() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps212)
            .unwrap();
        let b = bus.borrow();
        assert_eq!(b.register(Register::IsoControl), 0x1A);
        assert_eq!(b.register(Register::RxSpecialSettings), 0x2F);
        assert_eq!(b.register(Register::ChipStatusControl), 0x21);
        assert_eq!(b.ops.last(), Some(&BusOp::Delay(INITIATOR_GUARD_MS)));
    }

    #[test]
    fn passive_target_setup_sequence() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps424)
            .unwrap();
        let b = bus.borrow();
        assert_eq!(b.register(Register::IsoControl), 0x23);
        assert_eq!(b.register(Register::NfcTargetLevel), 0x07);
        assert_eq!(b.commands().last(), Some(&DirectCommand::RunDecoders));
    }

    #[test]
    fn set_mode_switches_iso_control() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.set_mode(TrfMode::P2pInitiator, Frequency::Kbps424)
            .unwrap();
        assert_eq!(bus.borrow().register(Register::IsoControl), 0x33);
        dev.set_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps212)
            .unwrap();
        assert_eq!(bus.borrow().register(Register::IsoControl), 0x22);
        assert_eq!(dev.frequency(), Frequency::Kbps212);
    }

    #[test]
    fn irq_handler_times_out() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        assert_eq!(dev.irq_handler(20).unwrap(), IrqStatus::Timeout);
        assert!(bus.borrow().ops.contains(&BusOp::WaitIrq(20)));
    }

    #[test]
    fn irq_handler_drains_fifo_until_frame_length() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps212)
            .unwrap();
        bus.borrow_mut()
            .push_event(IrqEvent::rx(0x60, vec![0x05, 0xD5, 0x07, 0x00, 0x00]));
        assert_eq!(dev.irq_handler(100).unwrap(), IrqStatus::RxComplete);
        assert_eq!(dev.received(), &[0x05, 0xD5, 0x07, 0x00, 0x00]);
    }

    #[test]
    fn irq_handler_checks_target_protocol() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps212)
            .unwrap();
        bus.borrow_mut().push_event(IrqEvent {
            irq_status: 0x40,
            fifo: vec![0x06, 0x00, 0xFF, 0xFF, 0x00, 0x03],
            target_protocol: 0xD2,
            collision_position: 0,
        });
        assert_eq!(dev.irq_handler(495).unwrap(), IrqStatus::RxComplete);
        assert_eq!(dev.received().len(), 6);

        let before = soft_inits(&bus);
        bus.borrow_mut().push_event(IrqEvent {
            irq_status: 0x40,
            fifo: vec![0x01],
            target_protocol: 0xC9,
            collision_position: 0,
        });
        assert_eq!(dev.irq_handler(495).unwrap(), IrqStatus::Idle);
        assert_eq!(soft_inits(&bus), before + 1);
    }

    #[test]
    fn irq_handler_protocol_error_reinitialises() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps424)
            .unwrap();
        let before = soft_inits(&bus);
        bus.borrow_mut().push_event(IrqEvent::status(0x10));
        assert_eq!(dev.irq_handler(10).unwrap(), IrqStatus::ProtocolError);
        assert_eq!(soft_inits(&bus), before + 1);
        assert_eq!(dev.mode(), TrfMode::P2pPassiveTarget);
    }

    #[test]
    fn irq_handler_field_change_and_collision_avoid() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().push_event(IrqEvent::status(0x04));
        bus.borrow_mut().push_event(IrqEvent::status(0x02));
        assert_eq!(dev.irq_handler(10).unwrap(), IrqStatus::RfFieldChange);
        assert_eq!(dev.irq_handler(10).unwrap(), IrqStatus::CollisionAvoidFinished);
    }

    #[test]
    fn write_fifo_short_frame() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps212)
            .unwrap();
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        let frame = [0x06, 0x00, 0xFF, 0xFF, 0x00, 0x03];
        dev.write_fifo(&frame, true).unwrap();

        let b = bus.borrow();
        assert_eq!(b.frames().last().unwrap(), &frame.to_vec());
        assert_eq!(b.register(Register::TxLength1), 0x00);
        assert_eq!(b.register(Register::TxLength2), 0x60);
        assert!(b.commands().contains(&DirectCommand::TransmitCrc));
    }

    #[test]
    fn write_fifo_refills_long_frame() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps424)
            .unwrap();
        bus.borrow_mut().push_event(IrqEvent::status(0xA0));
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        let frame: Vec<u8> = (0..200u16).map(|v| v as u8).collect();
        dev.write_fifo(&frame, true).unwrap();

        let b = bus.borrow();
        assert_eq!(b.frames().last().unwrap(), &frame);
        assert!(
            b.ops
                .contains(&BusOp::WriteContinuous(Register::Fifo, frame[127..].to_vec()))
        );
    }

    #[test]
    fn write_fifo_active_target_toggles_iso_control() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pActiveTarget, Frequency::Kbps212)
            .unwrap();
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        dev.write_fifo(&[0x03, 0xD5, 0x0B], true).unwrap();
        let writes = bus.borrow().writes_to(Register::IsoControl);
        assert_eq!(writes[writes.len() - 2..], [0x32, 0x22]);
    }

    #[test]
    fn write_fifo_protocol_error_and_timeout() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        dev.init_for_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps212)
            .unwrap();
        bus.borrow_mut().push_event(IrqEvent::status(0x10));
        assert_eq!(
            dev.write_fifo(&[0x03, 0xD5, 0x0B], true).unwrap_err(),
            Error::TransceiverProtocol
        );
        assert_eq!(
            dev.write_fifo(&[0x03, 0xD5, 0x0B], true).unwrap_err(),
            Error::Timeout
        );
    }

    #[test]
    fn transceive_bit_oriented_request() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().set_register(Register::IsoControl, 0x08);
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        bus.borrow_mut().push_event(IrqEvent::rx(0x40, vec![0x44, 0x00]));

        let rx = dev.transceive(&[0x26], 7, 2, CrcMode::NONE).unwrap();
        assert_eq!(rx.bytes, vec![0x44, 0x00]);
        assert_eq!(rx.collision, None);

        let b = bus.borrow();
        assert_eq!(b.frames().last().unwrap(), &vec![0x26]);
        assert_eq!(b.register(Register::TxLength1), 0x00);
        assert_eq!(b.register(Register::TxLength2), 0x0F);
        assert_eq!(b.register(Register::IsoControl), 0x88);
        assert!(b.commands().contains(&DirectCommand::TransmitNoCrc));
    }

    #[test]
    fn transceive_reports_collision_position() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        bus.borrow_mut().push_event(IrqEvent {
            irq_status: 0x42,
            fifo: vec![0x12, 0x04],
            target_protocol: 0,
            collision_position: 0x33,
        });
        let rx = dev.transceive(&[0x93, 0x20], 0, 5, CrcMode::NONE).unwrap();
        assert_eq!(rx.bytes, vec![0x12, 0x04]);
        assert_eq!(rx.collision, Some(0x33));
        assert_eq!(dev.collision_position(), Some(0x33));
    }

    #[test]
    fn transceive_without_answer_is_empty() {
        let bus = SharedBus::new();
        let mut dev = device(&bus);
        bus.borrow_mut().push_event(IrqEvent::status(0x80));
        let rx = dev.transceive(&[0x52], 7, 2, CrcMode::NONE).unwrap();
        assert!(rx.is_empty());
        assert_eq!(bus.borrow().commands().last(), Some(&DirectCommand::ResetFifo));
    }
}
