// trfnfc/src/transport/mock.rs

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::Result;
use crate::device::irq::IrqStatus;
use crate::device::mode::{Frequency, TrfMode};
use crate::transport::link::FrameLink;
use crate::transport::registers::{DirectCommand, Register};
use crate::transport::traits::RegisterBus;

/// One recorded bus access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write(Register, u8),
    Read(Register),
    WriteContinuous(Register, Vec<u8>),
    ReadContinuous(Register, usize),
    Command(DirectCommand),
    WaitIrq(u64),
    Delay(u64),
}

/// Register state loaded when a scripted interrupt fires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrqEvent {
    pub irq_status: u8,
    pub fifo: Vec<u8>,
    pub target_protocol: u8,
    pub collision_position: u8,
}

impl IrqEvent {
    pub fn status(irq_status: u8) -> Self {
        Self {
            irq_status,
            ..Self::default()
        }
    }

    pub fn rx(irq_status: u8, fifo: Vec<u8>) -> Self {
        Self {
            irq_status,
            fifo,
            ..Self::default()
        }
    }
}

/// Register-file model of a TRF79x0 for unit tests. Records every access
/// and fires scripted interrupts from `events`; an empty queue or a `None`
/// entry behaves like a timeout.
#[derive(Debug)]
pub struct MockBus {
    pub ops: Vec<BusOp>,
    /// Value the modulator register takes after a soft init.
    pub chip_id: u8,
    pub events: VecDeque<Option<IrqEvent>>,
    pub irq_line: bool,
    regs: [u8; 32],
    nfc_id: Vec<u8>,
    fifo: VecDeque<u8>,
    frames: Vec<Vec<u8>>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBus {
    pub fn new() -> Self {
        let mut bus = Self {
            ops: Vec::new(),
            chip_id: crate::constants::TRF7970_DEFAULT_ID,
            events: VecDeque::new(),
            irq_line: false,
            regs: [0; 32],
            nfc_id: Vec::new(),
            fifo: VecDeque::new(),
            frames: Vec::new(),
        };
        bus.load_defaults();
        bus
    }

    /// Power-on values of the registers the drivers read back.
    fn load_defaults(&mut self) {
        self.set_register(Register::ChipStatusControl, 0x01);
        self.set_register(Register::IsoControl, 0x21);
        self.set_register(Register::ModulatorControl, self.chip_id);
        self.set_register(Register::IrqMask, 0x3E);
    }

    pub fn push_event(&mut self, event: IrqEvent) {
        self.events.push_back(Some(event));
    }

    pub fn push_timeout(&mut self) {
        self.events.push_back(None);
    }

    pub fn set_register(&mut self, reg: Register, value: u8) {
        self.regs[reg.address() as usize] = value;
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg.address() as usize]
    }

    /// Direct commands in issue order.
    pub fn commands(&self) -> Vec<DirectCommand> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Values written to `reg` with single writes, in order.
    pub fn writes_to(&self, reg: Register) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write(r, v) if *r == reg => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Bytes written to the NFC ID register.
    pub fn nfc_id(&self) -> &[u8] {
        &self.nfc_id
    }

    /// Frames pushed through the FIFO, one entry per TX length header.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    fn read_internal(&mut self, reg: Register) -> u8 {
        match reg {
            Register::IrqStatus => {
                let v = self.regs[reg.address() as usize];
                self.regs[reg.address() as usize] = 0;
                v
            }
            Register::FifoStatus => self.fifo.len().min(0x7F) as u8,
            Register::Fifo => self.fifo.pop_front().unwrap_or(0),
            _ => self.regs[reg.address() as usize],
        }
    }

    fn write_internal(&mut self, reg: Register, value: u8) {
        match reg {
            Register::Fifo => match self.frames.last_mut() {
                Some(frame) => frame.push(value),
                None => self.frames.push(vec![value]),
            },
            Register::NfcId => self.nfc_id.push(value),
            _ => self.regs[reg.address() as usize] = value,
        }
    }
}

impl RegisterBus for MockBus {
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.ops.push(BusOp::Write(reg, value));
        self.write_internal(reg, value);
        Ok(())
    }

    fn read_register(&mut self, reg: Register) -> Result<u8> {
        self.ops.push(BusOp::Read(reg));
        Ok(self.read_internal(reg))
    }

    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()> {
        self.ops.push(BusOp::Command(cmd));
        match cmd {
            DirectCommand::ResetFifo => self.fifo.clear(),
            DirectCommand::SoftInit => {
                self.fifo.clear();
                self.load_defaults();
            }
            _ => {}
        }
        Ok(())
    }

    fn wait_irq(&mut self, timeout_ms: u64) -> Result<bool> {
        self.ops.push(BusOp::WaitIrq(timeout_ms));
        match self.events.pop_front() {
            Some(Some(ev)) => {
                self.set_register(Register::IrqStatus, ev.irq_status);
                self.set_register(Register::NfcTargetProtocol, ev.target_protocol);
                self.set_register(Register::CollisionPosition, ev.collision_position);
                self.fifo = ev.fifo.into_iter().collect();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delay_ms(&mut self, ms: u64) {
        self.ops.push(BusOp::Delay(ms));
    }

    fn irq_pending(&mut self) -> Result<bool> {
        Ok(self.irq_line)
    }

    fn write_continuous(&mut self, start: Register, data: &[u8]) -> Result<()> {
        self.ops.push(BusOp::WriteContinuous(start, data.to_vec()));
        match start {
            Register::TxLength1 => {
                let (len_regs, payload) = data.split_at(data.len().min(2));
                let mut reg = start;
                for &b in len_regs {
                    self.write_internal(reg, b);
                    reg = reg.next();
                }
                self.frames.push(payload.to_vec());
            }
            _ => {
                if start == Register::NfcId {
                    self.nfc_id.clear();
                }
                let mut reg = start;
                for &b in data {
                    self.write_internal(reg, b);
                    reg = reg.next();
                }
            }
        }
        Ok(())
    }

    fn read_continuous(&mut self, start: Register, buf: &mut [u8]) -> Result<()> {
        self.ops.push(BusOp::ReadContinuous(start, buf.len()));
        let mut reg = start;
        for b in buf.iter_mut() {
            *b = self.read_internal(reg);
            reg = reg.next();
        }
        Ok(())
    }
}

/// Clonable handle to a [`MockBus`] so a test can keep inspecting the bus
/// after a driver has taken ownership of it.
#[derive(Debug, Clone, Default)]
pub struct SharedBus(Rc<RefCell<MockBus>>);

impl SharedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn borrow(&self) -> Ref<'_, MockBus> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, MockBus> {
        self.0.borrow_mut()
    }

    pub fn boxed(&self) -> Box<dyn RegisterBus> {
        Box::new(self.clone())
    }
}

impl RegisterBus for SharedBus {
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.0.borrow_mut().write_register(reg, value)
    }
    fn read_register(&mut self, reg: Register) -> Result<u8> {
        self.0.borrow_mut().read_register(reg)
    }
    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()> {
        self.0.borrow_mut().direct_command(cmd)
    }
    fn wait_irq(&mut self, timeout_ms: u64) -> Result<bool> {
        self.0.borrow_mut().wait_irq(timeout_ms)
    }
    fn delay_ms(&mut self, ms: u64) {
        self.0.borrow_mut().delay_ms(ms)
    }
    fn irq_pending(&mut self) -> Result<bool> {
        self.0.borrow_mut().irq_pending()
    }
    fn write_continuous(&mut self, start: Register, data: &[u8]) -> Result<()> {
        self.0.borrow_mut().write_continuous(start, data)
    }
    fn read_continuous(&mut self, start: Register, buf: &mut [u8]) -> Result<()> {
        self.0.borrow_mut().read_continuous(start, buf)
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>>>;

/// Scripted [`FrameLink`] for peer-to-peer tests. Scripted events are
/// served first; after that, replies produced by the optional responder for
/// each written frame arrive as `RxComplete`.
pub struct MockLink {
    pub sent: Vec<Vec<u8>>,
    pub events: VecDeque<(IrqStatus, Vec<u8>)>,
    pub inits: Vec<(TrfMode, Frequency)>,
    pub mode_changes: Vec<(TrfMode, Frequency)>,
    pub waits: Vec<u64>,
    pub transmitter_disabled: usize,
    /// Number of upcoming `init_for_mode` calls that fail.
    pub init_failures: usize,
    replies: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    rx: Vec<u8>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            events: VecDeque::new(),
            inits: Vec::new(),
            mode_changes: Vec::new(),
            waits: Vec::new(),
            transmitter_disabled: 0,
            init_failures: 0,
            replies: VecDeque::new(),
            responder: None,
            rx: Vec::new(),
        }
    }

    pub fn push_rx(&mut self, frame: Vec<u8>) {
        self.events.push_back((IrqStatus::RxComplete, frame));
    }

    pub fn push_event(&mut self, status: IrqStatus) {
        self.events.push_back((status, Vec::new()));
    }

    /// Install a peer that answers every written frame.
    pub fn set_responder<F>(&mut self, f: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + 'static,
    {
        self.responder = Some(Box::new(f));
    }

    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(|v| v.as_slice())
    }
}

impl FrameLink for MockLink {
    fn init_for_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        self.inits.push((mode, frequency));
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(crate::Error::ExternalField { rssi: 0x3F });
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: TrfMode, frequency: Frequency) -> Result<()> {
        self.mode_changes.push((mode, frequency));
        Ok(())
    }

    fn disable_transmitter(&mut self) -> Result<()> {
        self.transmitter_disabled += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8], _crc: bool) -> Result<()> {
        self.sent.push(frame.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            if let Some(reply) = responder(frame) {
                self.replies.push_back(reply);
            }
        }
        Ok(())
    }

    fn wait_event(&mut self, timeout_ms: u64) -> Result<IrqStatus> {
        self.waits.push(timeout_ms);
        if let Some((status, frame)) = self.events.pop_front() {
            if status == IrqStatus::RxComplete {
                self.rx = frame;
            }
            return Ok(status);
        }
        match self.replies.pop_front() {
            Some(frame) => {
                self.rx = frame;
                Ok(IrqStatus::RxComplete)
            }
            None => Ok(IrqStatus::Timeout),
        }
    }

    fn received(&self) -> &[u8] {
        &self.rx
    }
}
