//! Host port queue manager.
//!
//! The RPU exposes its free lists and work lists as hardware queues. Each queue is a pair of
//! registers: writing the enqueue register appends a value, reading the dequeue register peeks at
//! the head (zero if empty) and writing the head value back to it pops it.

use crate::{bus::BusDevice, error::HalResult, mem::RpuCore, regs::MAX_NUM_OF_RX_QUEUES};

/// Register pair of one hardware queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostRpuHpq {
    pub enqueue_addr: u32,
    pub dequeue_addr: u32,
}
impl HostRpuHpq {
    pub const SIZE: usize = 8;

    fn from_bytes(bytes: &[u8]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            enqueue_addr: word(0),
            dequeue_addr: word(4),
        }
    }
    fn to_bytes(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.enqueue_addr.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.dequeue_addr.to_le_bytes());
    }
}

/// The queue table, which the firmware publishes at [RPU_MEM_HPQ_INFO](crate::regs::RPU_MEM_HPQ_INFO).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HpqmInfo {
    /// Events, which the host has to process.
    pub event_busy_queue: HostRpuHpq,
    /// Event buffers handed back to the RPU.
    pub event_avl_queue: HostRpuHpq,
    /// Commands, which the RPU has to process.
    pub cmd_busy_queue: HostRpuHpq,
    /// Free command buffers.
    pub cmd_avl_queue: HostRpuHpq,
    /// RX descriptors per pool.
    pub rx_buf_busy_queue: [HostRpuHpq; MAX_NUM_OF_RX_QUEUES],
}
impl HpqmInfo {
    pub const SIZE: usize = (4 + MAX_NUM_OF_RX_QUEUES) * HostRpuHpq::SIZE;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let hpq = |i: usize| HostRpuHpq::from_bytes(&bytes[i * HostRpuHpq::SIZE..]);
        Self {
            event_busy_queue: hpq(0),
            event_avl_queue: hpq(1),
            cmd_busy_queue: hpq(2),
            cmd_avl_queue: hpq(3),
            rx_buf_busy_queue: core::array::from_fn(|i| hpq(4 + i)),
        }
    }
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let queues = [
            self.event_busy_queue,
            self.event_avl_queue,
            self.cmd_busy_queue,
            self.cmd_avl_queue,
        ]
        .into_iter()
        .chain(self.rx_buf_busy_queue);
        for (hpq, chunk) in queues.zip(bytes.chunks_mut(HostRpuHpq::SIZE)) {
            hpq.to_bytes(chunk);
        }
        bytes
    }
}

/// What the host learns about the RPU, once the firmware is up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RpuInfo {
    pub hpqm_info: HpqmInfo,
    /// Base of the RX command descriptors.
    pub rx_cmd_base: u32,
    /// Base of the TX command descriptors.
    pub tx_cmd_base: u32,
}

impl<D: BusDevice> RpuCore<D> {
    #[doc(alias = "hal_rpu_hpq_enqueue")]
    pub fn hpq_enqueue(&mut self, hpq: &HostRpuHpq, value: u32) -> HalResult<()> {
        self.reg_write(hpq.enqueue_addr, value)
            .inspect_err(|_| error!("Enqueueing to {:x} failed.", hpq.enqueue_addr))
    }
    /// Pop the head of the queue, or return [None] if it's empty.
    #[doc(alias = "hal_rpu_hpq_dequeue")]
    pub fn hpq_dequeue(&mut self, hpq: &HostRpuHpq) -> HalResult<Option<u32>> {
        let value = self.reg_read(hpq.dequeue_addr)?;
        if value == 0 {
            return Ok(None);
        }
        self.reg_write(hpq.dequeue_addr, value)?;
        Ok(Some(value))
    }
    /// Check if the queue is empty, without popping.
    pub fn hpq_is_empty(&mut self, hpq: &HostRpuHpq) -> HalResult<bool> {
        Ok(self.reg_read(hpq.dequeue_addr)? == 0)
    }
}
