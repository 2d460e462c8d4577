// trfnfc/src/transport/traits.rs

use crate::Result;
use crate::transport::registers::{DirectCommand, Register};

/// Register-level access to a TRF79x0 over SPI (or any other bus).
///
/// Implementations own chip select, the SPI peripheral and the IRQ line. The
/// protocol layers only ever talk to the chip through this trait.
pub trait RegisterBus {
    /// Write a single register.
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()>;

    /// Read a single register.
    fn read_register(&mut self, reg: Register) -> Result<u8>;

    /// Issue a direct command.
    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()>;

    /// Block until the IRQ line is raised or `timeout_ms` elapses.
    /// Returns `false` on timeout.
    fn wait_irq(&mut self, timeout_ms: u64) -> Result<bool>;

    /// Busy-wait for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u64);

    /// Whether the IRQ line is currently asserted. Defaults to `false` for
    /// buses without a readable IRQ pin.
    fn irq_pending(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Continuous write starting at `start`. The default falls back to
    /// single writes following the chip's auto-increment.
    fn write_continuous(&mut self, start: Register, data: &[u8]) -> Result<()> {
        let mut reg = start;
        for &b in data {
            self.write_register(reg, b)?;
            reg = reg.next();
        }
        Ok(())
    }

    /// Continuous read starting at `start` into `buf`. The default falls back
    /// to single reads following the chip's auto-increment.
    fn read_continuous(&mut self, start: Register, buf: &mut [u8]) -> Result<()> {
        let mut reg = start;
        for b in buf.iter_mut() {
            *b = self.read_register(reg)?;
            reg = reg.next();
        }
        Ok(())
    }
}
