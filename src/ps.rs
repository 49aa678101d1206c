//! Power state control of the RPU.

use crate::{bus::BusDevice, config::Timeouts, error::HalResult, mem::RpuCore};

#[cfg(feature = "low-power")]
use crate::{error::HalError, regs::RpuPsStatus};
#[cfg(feature = "low-power")]
use embassy_time::{block_for, Instant};

/// The power state of the RPU, as tracked by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpuPsState {
    #[default]
    Asleep,
    Awake,
}

pub(crate) struct PsCtx {
    pub(crate) state: RpuPsState,
    /// Power management only kicks in, once the firmware is running.
    pub(crate) fw_booted: bool,
    #[cfg_attr(not(feature = "low-power"), allow(unused))]
    timeouts: Timeouts,
}
impl PsCtx {
    pub(crate) const fn new(timeouts: Timeouts) -> Self {
        Self {
            state: RpuPsState::Asleep,
            fw_booted: false,
            timeouts,
        }
    }
}

impl<D: BusDevice> RpuCore<D> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "low-power")] {
            /// Make sure the RPU is awake.
            ///
            /// Nothing happens before the firmware booted, or if the RPU is awake already.
            pub(crate) fn ps_wake(&mut self) -> HalResult<()> {
                if !self.ps.fw_booted || self.ps.state == RpuPsState::Awake {
                    return Ok(());
                }
                self.bal.rpu_ps_wake();
                block_for(self.ps.timeouts.ps_wake_settle);

                let start = Instant::now();
                loop {
                    let status = RpuPsStatus::from_bits(self.bal.rpu_ps_status());
                    if status.is_ready() {
                        break;
                    }
                    if start.elapsed() >= self.ps.timeouts.ps_wake_timeout {
                        error!("RPU is not ready for more than {}ms.", self.ps.timeouts.ps_wake_timeout.as_millis());
                        return Err(HalError::Timeout);
                    }
                    block_for(self.ps.timeouts.ps_wake_interval);
                }
                self.ps.state = RpuPsState::Awake;
                trace!("RPU is awake.");
                Ok(())
            }
            /// Put the RPU to sleep.
            pub(crate) fn ps_sleep(&mut self) {
                if !self.ps.fw_booted || self.ps.state == RpuPsState::Asleep {
                    return;
                }
                self.bal.rpu_ps_sleep();
                self.ps.state = RpuPsState::Asleep;
                trace!("RPU is asleep.");
            }
        } else {
            #[inline(always)]
            pub(crate) fn ps_wake(&mut self) -> HalResult<()> {
                self.ps.state = RpuPsState::Awake;
                Ok(())
            }
        }
    }
    /// Overwrite the tracked state and return the previous one.
    pub(crate) fn ps_state_force(&mut self, state: RpuPsState) -> RpuPsState {
        core::mem::replace(&mut self.ps.state, state)
    }
}

#[cfg(all(test, feature = "low-power"))]
mod tests {
    use super::*;
    use crate::{
        error::HalError,
        mock::{test_timeouts, ChipModel},
    };
    use embassy_time::Duration;

    #[test]
    fn no_wake_before_boot() {
        let chip = ChipModel::new();
        let mut rpu = chip.rpu_core();
        rpu.reg_read(0xa400_0000).unwrap();
        assert_eq!(chip.wake_calls(), 0);
        assert_eq!(rpu.ps.state, RpuPsState::Asleep);
    }
    #[test]
    fn wake_signals_once_and_polls_until_ready() {
        let chip = ChipModel::new();
        chip.set_ready_after_polls(3);
        let mut rpu = chip.rpu_core();
        rpu.ps.fw_booted = true;

        rpu.reg_read(0xa400_0000).unwrap();
        assert_eq!(chip.wake_calls(), 1);
        assert_eq!(chip.status_polls(), 3);
        assert_eq!(rpu.ps.state, RpuPsState::Awake);

        // Awake already, so no further signalling.
        rpu.reg_read(0xa400_0000).unwrap();
        assert_eq!(chip.wake_calls(), 1);
        assert_eq!(chip.status_polls(), 3);

        rpu.ps_sleep();
        assert_eq!(chip.sleep_calls(), 1);
        assert_eq!(rpu.ps.state, RpuPsState::Asleep);
        rpu.reg_read(0xa400_0000).unwrap();
        assert_eq!(chip.wake_calls(), 2);
    }
    #[test]
    fn wake_times_out() {
        let chip = ChipModel::new();
        chip.set_ready_after_polls(usize::MAX);
        let mut rpu = chip.rpu_core_with_timeouts(Timeouts {
            ps_wake_timeout: Duration::from_millis(5),
            ..test_timeouts()
        });
        rpu.ps.fw_booted = true;

        assert_eq!(rpu.reg_read(0xa400_0000), Err(HalError::Timeout));
        assert_eq!(chip.wake_calls(), 1);
        assert_eq!(rpu.ps.state, RpuPsState::Asleep);
        // The register itself was never read.
        assert_eq!(chip.word_reads(), 0);
    }
}
