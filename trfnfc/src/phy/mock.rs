// trfnfc/src/phy/mock.rs

use std::collections::VecDeque;

use crate::Result;

use super::hal::DirectModeHal;

/// One recorded HAL call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalEvent {
    OpenSession(u8),
    CloseSession,
    Modulation(bool),
    QuarterTimer(bool),
    EighthTimer(bool),
    InterruptsMasked(bool),
}

/// Recording [`DirectModeHal`] for tests.
///
/// Every `wait_eighth_bit` consumes one entry of `rx_samples`; the edge
/// detector reports that sample until the next wait. Before the eighth-bit
/// timer runs, the detector reports an edge whenever samples are queued, so
/// the receiver's wait for the first subcarrier edge returns at once.
#[derive(Debug, Default)]
pub struct MockHal {
    pub events: Vec<HalEvent>,
    pub rx_samples: VecDeque<bool>,
    /// Modulation state after each quarter-bit wait.
    pub quarter_trace: Vec<bool>,
    pub edge_polls: usize,
    modulating: bool,
    eighth_running: bool,
    sample: bool,
    masked: bool,
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(samples: Vec<bool>) -> Self {
        Self {
            rx_samples: samples.into(),
            ..Self::default()
        }
    }

    pub fn interrupts_masked(&self) -> bool {
        self.masked
    }
}

impl DirectModeHal for MockHal {
    fn open_session(&mut self, chip_status: u8) -> Result<()> {
        self.events.push(HalEvent::OpenSession(chip_status));
        Ok(())
    }

    fn close_session(&mut self) -> Result<()> {
        self.events.push(HalEvent::CloseSession);
        Ok(())
    }

    fn set_modulation(&mut self, active: bool) {
        self.modulating = active;
        self.events.push(HalEvent::Modulation(active));
    }

    fn start_quarter_timer(&mut self) {
        self.events.push(HalEvent::QuarterTimer(true));
    }

    fn stop_quarter_timer(&mut self) {
        self.events.push(HalEvent::QuarterTimer(false));
    }

    fn wait_quarter_bit(&mut self) {
        self.quarter_trace.push(self.modulating);
    }

    fn start_eighth_timer(&mut self) {
        self.eighth_running = true;
        self.events.push(HalEvent::EighthTimer(true));
    }

    fn stop_eighth_timer(&mut self) {
        self.eighth_running = false;
        self.events.push(HalEvent::EighthTimer(false));
    }

    fn wait_eighth_bit(&mut self) {
        self.sample = self.rx_samples.pop_front().unwrap_or(false);
    }

    fn rx_edge(&mut self) -> bool {
        self.edge_polls += 1;
        if self.eighth_running {
            self.sample
        } else {
            !self.rx_samples.is_empty()
        }
    }

    fn clear_rx_edge(&mut self) {}

    fn disable_interrupts(&mut self) -> bool {
        let was = self.masked;
        self.masked = true;
        self.events.push(HalEvent::InterruptsMasked(true));
        was
    }

    fn enable_interrupts(&mut self) {
        self.masked = false;
        self.events.push(HalEvent::InterruptsMasked(false));
    }
}

/// Eighth-bit samples of a card answer carrying `bits`, starting with the
/// SOF and followed by silence. A 1 has the subcarrier in its first half,
/// a 0 in its second half.
#[doc(hidden)]
pub fn picc_samples(bits: &[bool]) -> Vec<bool> {
    let mut out = Vec::with_capacity((bits.len() + 1) * 8 + 24);
    for &bit in std::iter::once(&true).chain(bits) {
        out.extend([bit; 4]);
        out.extend([!bit; 4]);
    }
    out.extend([false; 24]);
    out
}
