// trfnfc/src/phy/hal.rs

use crate::Result;

/// Host-side hardware used while the TRF79x0 runs in direct mode 0.
///
/// Two periodic timers drive the bit-banging: one ticking every quarter bit
/// (fc/32, used to transmit) and one every eighth bit (fc/16, used to sample
/// the subcarrier). The waits block until the next tick of the respective
/// timer. The RX pin, normally SPI MISO, is sampled through an edge detector.
pub trait DirectModeHal {
    /// Assert chip select, start a continuous write at the chip status
    /// register with `chip_status`, clock eight dummy cycles and leave the
    /// session open. The RX pin becomes a plain GPIO input.
    fn open_session(&mut self, chip_status: u8) -> Result<()>;

    /// Give the RX pin back to the SPI peripheral and end the write session
    /// opened by [`open_session`](Self::open_session).
    fn close_session(&mut self) -> Result<()>;

    /// Drive the MOD pin. Active modulation means a pause in the field.
    fn set_modulation(&mut self, active: bool);

    fn start_quarter_timer(&mut self);
    fn stop_quarter_timer(&mut self);
    fn wait_quarter_bit(&mut self);

    fn start_eighth_timer(&mut self);
    fn stop_eighth_timer(&mut self);
    fn wait_eighth_bit(&mut self);

    /// Whether the edge detector saw any edge since the last clear.
    fn rx_edge(&mut self) -> bool;
    fn clear_rx_edge(&mut self);

    /// Mask the host's global interrupt. Returns `true` when interrupts were
    /// already masked before the call.
    fn disable_interrupts(&mut self) -> bool;
    fn enable_interrupts(&mut self);
}

/// Run `f` with the host's interrupts masked, restoring them afterwards
/// unless they were masked already.
pub fn with_interrupts_disabled<H, R, F>(hal: &mut H, f: F) -> R
where
    H: DirectModeHal + ?Sized,
    F: FnOnce(&mut H) -> R,
{
    let was_disabled = hal.disable_interrupts();
    let out = f(hal);
    if !was_disabled {
        hal.enable_interrupts();
    }
    out
}
