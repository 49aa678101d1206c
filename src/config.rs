//! Configuration of the HAL.

use embassy_time::Duration;

use crate::{
    error::{HalError, HalResult},
    regs::{MAX_NUM_OF_RX_QUEUES, RPU_EVENT_COMMON_SIZE_MAX, RPU_PKTRAM_SIZE},
};

pub const RX_MAX_DATA_SIZE: usize = 1600;
pub const RX_BUF_HEADROOM: usize = 4;
pub const TX_MAX_DATA_SIZE: usize = 1600;
pub const TX_BUF_HEADROOM: usize = 52;
pub const MAX_TX_TOKENS: usize = 10;
pub const MAX_TX_AGGREGATION: usize = 6;
pub const RX_NUM_BUFS_PER_QUEUE: usize = 16;

/// Geometry of one RX buffer pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxBufPoolParams {
    /// Size of each buffer, including the headroom.
    pub buf_sz: usize,
    pub num_bufs: usize,
}
impl RxBufPoolParams {
    /// Bytes of packet RAM occupied by this pool.
    pub const fn pool_size(&self) -> usize {
        self.buf_sz * self.num_bufs
    }
}
impl Default for RxBufPoolParams {
    fn default() -> Self {
        Self {
            buf_sz: RX_MAX_DATA_SIZE + RX_BUF_HEADROOM,
            num_bufs: RX_NUM_BUFS_PER_QUEUE,
        }
    }
}

/// The bounds of every wait the HAL performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeouts {
    /// How long to wait for a free command buffer.
    pub rpu_ready_wait: Duration,
    /// How long the RPU may take to report itself awake and ready.
    pub ps_wake_timeout: Duration,
    /// Delay between two power status polls.
    pub ps_wake_interval: Duration,
    /// Delay after signalling a wake up, before polling the status.
    pub ps_wake_settle: Duration,
    /// Inactivity, after which the RPU is put to sleep.
    pub ps_idle_timeout: Duration,
    /// Attempts of a register poll.
    pub reg_poll_count: u32,
    /// Delay between two attempts of a register poll.
    pub reg_poll_interval: Duration,
    /// Attempts of the boot signature poll.
    pub boot_poll_count: u32,
    /// Delay between two attempts of the boot signature poll.
    pub boot_poll_interval: Duration,
}
impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rpu_ready_wait: Duration::from_secs(1),
            ps_wake_timeout: Duration::from_secs(1),
            ps_wake_interval: Duration::from_millis(1),
            ps_wake_settle: Duration::from_millis(1),
            ps_idle_timeout: Duration::from_millis(10),
            reg_poll_count: 50,
            reg_poll_interval: Duration::from_millis(10),
            boot_poll_count: 1000,
            boot_poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Parameters of a HAL instance.
///
/// These are fixed for the lifetime of the instance and shared by all its devices.
pub struct HalConfig {
    /// Control commands larger than this are split into fragments.
    pub max_cmd_size: usize,
    /// Events larger than this are reassembled over multiple interrupts.
    pub max_event_size: usize,
    pub rx_buf_headroom_sz: usize,
    pub tx_buf_headroom_sz: usize,
    /// Number of TX descriptors.
    pub max_tx_frms: usize,
    /// Largest TX frame, including the headroom.
    pub max_tx_frm_sz: usize,
    /// Stride of the TX token areas in packet RAM.
    pub max_ampdu_len_per_token: usize,
    pub rx_buf_pool: [RxBufPoolParams; MAX_NUM_OF_RX_QUEUES],
    pub timeouts: Timeouts,
}
impl HalConfig {
    /// Bytes of packet RAM occupied by all RX pools together.
    pub fn rx_pools_size(&self) -> usize {
        self.rx_buf_pool.iter().map(RxBufPoolParams::pool_size).sum()
    }
    /// Check that the parameters are usable.
    pub fn validate(&self) -> HalResult<()> {
        if self.max_cmd_size == 0 {
            error!("Maximum command size must not be zero.");
            return Err(HalError::InvalidParam);
        }
        if self.max_event_size < RPU_EVENT_COMMON_SIZE_MAX {
            error!(
                "Maximum event size {} is smaller than the event prefix.",
                self.max_event_size
            );
            return Err(HalError::InvalidParam);
        }
        if self
            .rx_buf_pool
            .iter()
            .any(|pool| pool.num_bufs != 0 && pool.buf_sz <= self.rx_buf_headroom_sz)
        {
            error!("RX buffers must be larger than their headroom.");
            return Err(HalError::InvalidParam);
        }
        if self.max_tx_frm_sz < self.tx_buf_headroom_sz {
            error!("TX frames must be at least as large as their headroom.");
            return Err(HalError::InvalidParam);
        }
        if self.rx_pools_size() > RPU_PKTRAM_SIZE as usize {
            error!(
                "RX pools need {} bytes, but only {} are available.",
                self.rx_pools_size(),
                RPU_PKTRAM_SIZE
            );
            return Err(HalError::InvalidParam);
        }
        Ok(())
    }
}
impl Default for HalConfig {
    fn default() -> Self {
        let rx_buf_pool = [RxBufPoolParams::default(); MAX_NUM_OF_RX_QUEUES];
        let rx_pools_size: usize = rx_buf_pool.iter().map(RxBufPoolParams::pool_size).sum();
        Self {
            max_cmd_size: 400,
            max_event_size: 1000,
            rx_buf_headroom_sz: RX_BUF_HEADROOM,
            tx_buf_headroom_sz: TX_BUF_HEADROOM,
            max_tx_frms: MAX_TX_TOKENS * MAX_TX_AGGREGATION,
            max_tx_frm_sz: TX_MAX_DATA_SIZE + TX_BUF_HEADROOM,
            max_ampdu_len_per_token: ((RPU_PKTRAM_SIZE as usize - rx_pools_size) / MAX_TX_TOKENS)
                & !3,
            rx_buf_pool,
            timeouts: Timeouts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = HalConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.max_ampdu_len_per_token % 4, 0);
        assert!(
            config.rx_pools_size() + config.max_ampdu_len_per_token * MAX_TX_TOKENS
                <= RPU_PKTRAM_SIZE as usize
        );
    }
    #[test]
    fn rejects_bad_sizes() {
        let config = HalConfig {
            max_cmd_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(HalError::InvalidParam));
        let config = HalConfig {
            max_event_size: RPU_EVENT_COMMON_SIZE_MAX - 1,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(HalError::InvalidParam));
        let config = HalConfig {
            rx_buf_pool: [RxBufPoolParams {
                buf_sz: 4096,
                num_bufs: 32,
            }; MAX_NUM_OF_RX_QUEUES],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(HalError::InvalidParam));
    }
}
