//! A simulated RPU for the unit tests.
//!
//! Memory is a flat array indexed by bus offset. Hardware queues are modelled after the real
//! register semantics, everything else is plain memory.

use alloc::{collections::VecDeque, rc::Rc, vec, vec::Vec};
use core::cell::RefCell;

use embassy_time::Duration;

use crate::{
    bal::{BalConfig, BalPriv},
    bus::{Bus, BusDevConfig, BusDevice, DmaDirection},
    config::{HalConfig, RxBufPoolParams, Timeouts},
    error::{HalError, HalResult},
    hpqm::{HostRpuHpq, HpqmInfo},
    mem::RpuCore,
    pal::{self, SOC_MMAP_ADDR_OFFSET_GRAM_PKD, SOC_MMAP_ADDR_OFFSET_PBUS, SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW},
    ps::PsCtx,
    regs::{
        RpuPsStatus, MAX_NUM_OF_RX_QUEUES, RPU_ADDR_GRAM_START, RPU_ADDR_PBUS_START,
        RPU_ADDR_PKTRAM_START, RPU_ADDR_SBUS_START, RPU_MEM_HPQ_INFO,
    },
};

const MEM_SIZE: usize = 0x10_0000;
/// Offset between host bus offsets and the addresses the RPU's DMA sees.
pub(crate) const DMA_OFFSET: u32 = 0x2000_0000;
/// Base of the simulated queue registers.
pub(crate) const HPQ_REG_BASE: u32 = 0xa400_4000;

pub(crate) fn test_timeouts() -> Timeouts {
    Timeouts {
        rpu_ready_wait: Duration::from_millis(20),
        ps_wake_timeout: Duration::from_millis(20),
        ps_wake_interval: Duration::from_micros(10),
        ps_wake_settle: Duration::from_micros(0),
        ps_idle_timeout: Duration::from_millis(5),
        reg_poll_count: 5,
        reg_poll_interval: Duration::from_micros(100),
        boot_poll_count: 5,
        boot_poll_interval: Duration::from_micros(100),
    }
}
pub(crate) fn test_config() -> HalConfig {
    HalConfig {
        max_cmd_size: 256,
        max_event_size: 256,
        rx_buf_headroom_sz: 4,
        tx_buf_headroom_sz: 8,
        max_tx_frms: 8,
        max_tx_frm_sz: 264,
        max_ampdu_len_per_token: 1024,
        rx_buf_pool: [RxBufPoolParams {
            buf_sz: 132,
            num_bufs: 4,
        }; MAX_NUM_OF_RX_QUEUES],
        timeouts: test_timeouts(),
    }
}

struct HwQueue {
    enqueue: u32,
    dequeue: u32,
    items: VecDeque<u32>,
}

struct ChipState {
    mem: Vec<u8>,
    queues: Vec<HwQueue>,
    word_writes: Vec<(u32, u32)>,
    word_reads: usize,
    transactions: usize,
    ready_after_polls: usize,
    polls_since_wake: usize,
    status_polls: usize,
    wake_calls: usize,
    sleep_calls: usize,
    dev_init_calls: usize,
    dev_deinit_calls: usize,
    dev_rem_calls: usize,
    fail_dev_init: bool,
    fail_dma: bool,
    pktram_base: Option<u32>,
    /// Registers, which always read back as zero after a write.
    self_clearing: Vec<u32>,
}

/// Shared handle to the simulated chip.
#[derive(Clone)]
pub(crate) struct ChipModel(Rc<RefCell<ChipState>>);

/// Map a bus offset back into the RPU view.
fn to_rpu_addr(offset: u32) -> u32 {
    if offset >= SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW {
        RPU_ADDR_PKTRAM_START + (offset - SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW)
    } else if offset >= SOC_MMAP_ADDR_OFFSET_GRAM_PKD {
        RPU_ADDR_GRAM_START + (offset - SOC_MMAP_ADDR_OFFSET_GRAM_PKD)
    } else if offset >= SOC_MMAP_ADDR_OFFSET_PBUS {
        RPU_ADDR_PBUS_START + (offset - SOC_MMAP_ADDR_OFFSET_PBUS)
    } else {
        RPU_ADDR_SBUS_START + offset
    }
}
fn to_offset(rpu_addr: u32) -> usize {
    pal::addr_offset_get(rpu_addr).unwrap() as usize
}

impl ChipModel {
    pub(crate) fn new() -> Self {
        Self(Rc::new(RefCell::new(ChipState {
            mem: vec![0; MEM_SIZE],
            queues: Vec::new(),
            word_writes: Vec::new(),
            word_reads: 0,
            transactions: 0,
            ready_after_polls: 1,
            polls_since_wake: 0,
            status_polls: 0,
            wake_calls: 0,
            sleep_calls: 0,
            dev_init_calls: 0,
            dev_deinit_calls: 0,
            dev_rem_calls: 0,
            fail_dev_init: false,
            fail_dma: false,
            pktram_base: None,
            self_clearing: Vec::new(),
        })))
    }
    /// An access layer on a freshly attached device.
    pub(crate) fn rpu_core(&self) -> RpuCore<MockDevice> {
        self.rpu_core_with_timeouts(test_timeouts())
    }
    pub(crate) fn rpu_core_with_timeouts(&self, timeouts: Timeouts) -> RpuCore<MockDevice> {
        let mut bal = BalPriv::<MockBus>::init(
            self,
            BalConfig {
                addr_pktram_base: SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW,
            },
        )
        .unwrap();
        RpuCore::new(bal.dev_add().unwrap(), PsCtx::new(timeouts))
    }

    /// Publish a queue table and create the queues it describes.
    pub(crate) fn install_hpqm(&self) -> HpqmInfo {
        let hpq = |i: u32| HostRpuHpq {
            enqueue_addr: HPQ_REG_BASE + i * 8,
            dequeue_addr: HPQ_REG_BASE + i * 8 + 4,
        };
        let info = HpqmInfo {
            event_busy_queue: hpq(0),
            event_avl_queue: hpq(1),
            cmd_busy_queue: hpq(2),
            cmd_avl_queue: hpq(3),
            rx_buf_busy_queue: core::array::from_fn(|i| hpq(4 + i as u32)),
        };
        self.write_rpu(RPU_MEM_HPQ_INFO, &info.to_bytes());
        let mut state = self.0.borrow_mut();
        for i in 0..HpqmInfo::SIZE as u32 / 8 {
            let hpq = hpq(i);
            state.queues.push(HwQueue {
                enqueue: to_offset(hpq.enqueue_addr) as u32,
                dequeue: to_offset(hpq.dequeue_addr) as u32,
                items: VecDeque::new(),
            });
        }
        info
    }
    fn with_queue<R>(&self, hpq: &HostRpuHpq, f: impl FnOnce(&mut VecDeque<u32>) -> R) -> R {
        let enqueue = to_offset(hpq.enqueue_addr) as u32;
        let mut state = self.0.borrow_mut();
        let queue = state
            .queues
            .iter_mut()
            .find(|queue| queue.enqueue == enqueue)
            .unwrap();
        f(&mut queue.items)
    }
    /// Push `value` as if the RPU did it.
    pub(crate) fn queue_push(&self, hpq: &HostRpuHpq, value: u32) {
        self.with_queue(hpq, |items| items.push_back(value));
    }
    pub(crate) fn queue_items(&self, hpq: &HostRpuHpq) -> Vec<u32> {
        self.with_queue(hpq, |items| items.iter().copied().collect())
    }
    /// Place an event at `addr` and announce it.
    pub(crate) fn post_event(&self, info: &HpqmInfo, addr: u32, data: &[u8]) {
        self.write_rpu(addr, data);
        self.queue_push(&info.event_busy_queue, addr);
    }

    pub(crate) fn write_rpu(&self, rpu_addr: u32, data: &[u8]) {
        let offset = to_offset(rpu_addr);
        self.0.borrow_mut().mem[offset..offset + data.len()].copy_from_slice(data);
    }
    pub(crate) fn write_rpu_word(&self, rpu_addr: u32, value: u32) {
        self.write_rpu(rpu_addr, &value.to_le_bytes());
    }
    pub(crate) fn read_rpu(&self, rpu_addr: u32, len: usize) -> Vec<u8> {
        let offset = to_offset(rpu_addr);
        self.0.borrow().mem[offset..offset + len].to_vec()
    }
    pub(crate) fn read_rpu_word(&self, rpu_addr: u32) -> u32 {
        let bytes = self.read_rpu(rpu_addr, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// All word writes since the last [ChipModel::clear_log], in the RPU view.
    pub(crate) fn word_writes(&self) -> Vec<(u32, u32)> {
        self.0
            .borrow()
            .word_writes
            .iter()
            .map(|&(offset, value)| (to_rpu_addr(offset), value))
            .collect()
    }
    pub(crate) fn writes_to(&self, rpu_addr: u32) -> Vec<u32> {
        self.word_writes()
            .into_iter()
            .filter(|&(addr, _)| addr == rpu_addr)
            .map(|(_, value)| value)
            .collect()
    }
    pub(crate) fn clear_log(&self) {
        let mut state = self.0.borrow_mut();
        state.word_writes.clear();
        state.word_reads = 0;
        state.transactions = 0;
        state.status_polls = 0;
        state.wake_calls = 0;
        state.sleep_calls = 0;
    }
    /// Number of bus calls of any kind.
    pub(crate) fn transactions(&self) -> usize {
        self.0.borrow().transactions
    }
    pub(crate) fn word_reads(&self) -> usize {
        self.0.borrow().word_reads
    }
    pub(crate) fn wake_calls(&self) -> usize {
        self.0.borrow().wake_calls
    }
    pub(crate) fn sleep_calls(&self) -> usize {
        self.0.borrow().sleep_calls
    }
    pub(crate) fn status_polls(&self) -> usize {
        self.0.borrow().status_polls
    }
    pub(crate) fn dev_init_calls(&self) -> usize {
        self.0.borrow().dev_init_calls
    }
    pub(crate) fn dev_deinit_calls(&self) -> usize {
        self.0.borrow().dev_deinit_calls
    }
    pub(crate) fn dev_rem_calls(&self) -> usize {
        self.0.borrow().dev_rem_calls
    }
    pub(crate) fn pktram_base(&self) -> Option<u32> {
        self.0.borrow().pktram_base
    }
    /// The status poll, which first reports the RPU as ready after a wake up.
    pub(crate) fn set_ready_after_polls(&self, polls: usize) {
        self.0.borrow_mut().ready_after_polls = polls;
    }
    pub(crate) fn set_fail_dev_init(&self, fail: bool) {
        self.0.borrow_mut().fail_dev_init = fail;
    }
    /// Let the bus refuse every DMA mapping.
    pub(crate) fn set_fail_dma(&self, fail: bool) {
        self.0.borrow_mut().fail_dma = fail;
    }
    pub(crate) fn set_self_clearing(&self, rpu_addr: u32) {
        let offset = to_offset(rpu_addr) as u32;
        self.0.borrow_mut().self_clearing.push(offset);
    }
}

pub(crate) struct MockBus {
    chip: ChipModel,
}
impl Bus for MockBus {
    type Config = ChipModel;
    type Device = MockDevice;

    fn init(config: &Self::Config) -> HalResult<Self> {
        Ok(Self {
            chip: config.clone(),
        })
    }
    fn dev_add(&mut self, dev_config: &BusDevConfig) -> HalResult<Self::Device> {
        self.chip.0.borrow_mut().pktram_base = Some(dev_config.addr_pktram_base);
        Ok(MockDevice {
            chip: self.chip.clone(),
        })
    }
    fn dev_rem(&mut self, _device: Self::Device) {
        self.chip.0.borrow_mut().dev_rem_calls += 1;
    }
}

pub(crate) struct MockDevice {
    chip: ChipModel,
}
impl MockDevice {
    fn state(&self) -> core::cell::RefMut<'_, ChipState> {
        let mut state = self.chip.0.borrow_mut();
        state.transactions += 1;
        state
    }
}
impl BusDevice for MockDevice {
    fn dev_init(&mut self) -> HalResult<()> {
        let mut state = self.state();
        state.dev_init_calls += 1;
        if state.fail_dev_init {
            Err(HalError::BusInitFailed)
        } else {
            Ok(())
        }
    }
    fn dev_deinit(&mut self) {
        self.state().dev_deinit_calls += 1;
    }
    fn read_word(&mut self, offset: u32) -> u32 {
        let mut state = self.state();
        state.word_reads += 1;
        if let Some(queue) = state.queues.iter().find(|queue| queue.dequeue == offset) {
            return queue.items.front().copied().unwrap_or(0);
        }
        let offset = offset as usize;
        let bytes = &state.mem[offset..offset + 4];
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn write_word(&mut self, offset: u32, value: u32) {
        let mut state = self.state();
        state.word_writes.push((offset, value));
        if let Some(queue) = state.queues.iter_mut().find(|queue| queue.enqueue == offset) {
            queue.items.push_back(value);
            return;
        }
        if let Some(queue) = state.queues.iter_mut().find(|queue| queue.dequeue == offset) {
            // Only the head may be written back.
            assert_eq!(queue.items.pop_front(), Some(value), "bad write back to {:x}", offset);
            return;
        }
        let value = if state.self_clearing.contains(&offset) {
            0
        } else {
            value
        };
        let offset = offset as usize;
        state.mem[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    fn read_block(&mut self, dst: &mut [u8], offset: u32) {
        let state = self.state();
        let offset = offset as usize;
        dst.copy_from_slice(&state.mem[offset..offset + dst.len()]);
    }
    fn write_block(&mut self, offset: u32, src: &[u8]) {
        let mut state = self.state();
        let offset = offset as usize;
        state.mem[offset..offset + src.len()].copy_from_slice(src);
    }
    fn dma_map(&mut self, virt_addr: u32, _len: usize, _dir: DmaDirection) -> Option<u32> {
        if self.state().fail_dma {
            return None;
        }
        Some(virt_addr + DMA_OFFSET)
    }
    fn dma_unmap(&mut self, phy_addr: u32, _len: usize, _dir: DmaDirection) -> Option<u32> {
        if self.state().fail_dma {
            return None;
        }
        phy_addr.checked_sub(DMA_OFFSET)
    }
    fn rpu_ps_sleep(&mut self) {
        self.state().sleep_calls += 1;
    }
    fn rpu_ps_wake(&mut self) {
        let mut state = self.state();
        state.wake_calls += 1;
        state.polls_since_wake = 0;
    }
    fn rpu_ps_status(&mut self) -> u32 {
        let mut state = self.state();
        state.status_polls += 1;
        state.polls_since_wake += 1;
        let ready = state.polls_since_wake >= state.ready_after_polls;
        RpuPsStatus::new()
            .with_awake(ready)
            .with_ready(ready)
            .into_bits()
    }
}
